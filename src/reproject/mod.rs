//! Reprojection of solar images to another time, following the rotation of the
//! solar surface.

mod error;

pub use error::ReprojectError;

use std::path::{Path, PathBuf};

use hifitime::{Duration, Epoch};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Zip};

use crate::{
    coord::rotate_hpc,
    error::SynopError,
    image::{read_template_header, write_image, GeometryPatch, SolarImage},
    time::format_utc_date,
    wcs::HpcWcs,
};

/// The result of reprojecting an image onto a new grid.
#[derive(Debug, Clone)]
pub struct Reprojection {
    pub data: Array2<f64>,

    /// `true` where `data` came from the input image; `false` where the
    /// input had nothing to offer.
    pub footprint: Array2<bool>,
}

/// Something that can remap an image's pixels onto a new helioprojective
/// grid, as seen at a different time.
pub trait Reproject {
    /// Reproject `input` onto the grid described by `out_wcs`, as it would
    /// appear at `out_time` to the same observer. The returned arrays must
    /// have the same shape as the input data.
    fn reproject(
        &self,
        input: &SolarImage,
        out_wcs: &HpcWcs,
        out_time: Epoch,
    ) -> Result<Reprojection, ReprojectError>;
}

/// Reprojects by following each point on the solar surface as it rotates
/// differentially, sampling the input with bilinear interpolation.
#[derive(Debug, Clone, Default)]
pub struct SolarSurfaceReprojector {
    pub draw_progress_bar: bool,
}

impl SolarSurfaceReprojector {
    pub fn new(draw_progress_bar: bool) -> SolarSurfaceReprojector {
        SolarSurfaceReprojector { draw_progress_bar }
    }
}

impl Reproject for SolarSurfaceReprojector {
    fn reproject(
        &self,
        input: &SolarImage,
        out_wcs: &HpcWcs,
        out_time: Epoch,
    ) -> Result<Reprojection, ReprojectError> {
        let meta = &input.meta;
        let observer = &meta.observer;
        if !(observer.distance.is_finite() && meta.rsun.is_finite() && meta.rsun > 0.0) {
            return Err(ReprojectError::failed(format!(
                "degenerate frame (observer distance {} m, solar radius {} m)",
                observer.distance, meta.rsun
            )));
        }
        if observer.distance <= meta.rsun {
            return Err(ReprojectError::failed(format!(
                "the observer ({} m) is inside the Sun ({} m)",
                observer.distance, meta.rsun
            )));
        }
        if !out_wcs.is_valid() || !meta.wcs.is_valid() {
            return Err(ReprojectError::failed("the WCS isn't invertible"));
        }
        let elapsed = (out_time - meta.date).to_seconds();
        if !elapsed.is_finite() {
            return Err(ReprojectError::failed("the elapsed time isn't finite"));
        }
        debug!("Rotating the solar surface by {elapsed} s");

        let (ny, nx) = input.data.dim();
        let progress = ProgressBar::with_draw_target(
            Some(ny as _),
            if self.draw_progress_bar {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:4}/{len:4} rows ({elapsed_precise}<{eta_precise})")
                .map_err(|e| ReprojectError::failed(e.to_string()))?
                .progress_chars("=> "),
        )
        .with_message("Reprojecting");
        progress.tick();

        let out_proj = out_wcs.projection();
        let in_proj = meta.wcs.projection();
        let mut data = Array2::from_elem((ny, nx), f64::NAN);
        let mut footprint = Array2::from_elem((ny, nx), false);
        for (y, (mut data_row, mut footprint_row)) in data
            .outer_iter_mut()
            .zip(footprint.outer_iter_mut())
            .enumerate()
        {
            for (x, (d, f)) in data_row.iter_mut().zip(footprint_row.iter_mut()).enumerate() {
                let sample = out_proj
                    .pixel_to_world(x as f64, y as f64)
                    .and_then(|(tx, ty)| {
                        rotate_hpc(tx, ty, observer, meta.rsun, out_time, meta.date)
                    })
                    .and_then(|(tx, ty)| in_proj.world_to_pixel(tx, ty))
                    .and_then(|(x, y)| bilinear_sample(input.data.view(), x, y));
                if let Some(v) = sample {
                    *d = v;
                    *f = true;
                }
            }
            progress.inc(1);
        }
        progress.finish();

        Ok(Reprojection { data, footprint })
    }
}

/// Sample `data` at the fractional 0-indexed pixel (x, y). Samples within half
/// a pixel of the edge use the edge values; anything further out is `None`.
pub(crate) fn bilinear_sample(data: ArrayView2<f64>, x: f64, y: f64) -> Option<f64> {
    let (ny, nx) = data.dim();
    if nx == 0 || ny == 0 {
        return None;
    }
    if !(-0.5..=nx as f64 - 0.5).contains(&x) || !(-0.5..=ny as f64 - 0.5).contains(&y) {
        return None;
    }

    let x = x.clamp(0.0, (nx - 1) as f64);
    let y = y.clamp(0.0, (ny - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let top = data[[y0, x0]] * (1.0 - xf) + data[[y0, x1]] * xf;
    let bottom = data[[y1, x0]] * (1.0 - xf) + data[[y1, x1]] * xf;
    Some(top * (1.0 - yf) + bottom * yf)
}

/// An image that has been rotated to a new time.
#[derive(Debug, Clone)]
pub struct DiffRotated {
    /// Reprojected pixels, with the gaps filled from the input.
    pub data: Array2<f64>,

    pub footprint: Array2<bool>,

    /// The grid of `data`.
    pub wcs: HpcWcs,

    /// The observation time of `data`.
    pub date: Epoch,
}

impl DiffRotated {
    pub fn geometry(&self) -> GeometryPatch {
        GeometryPatch::from_wcs(self.date, &self.wcs)
    }
}

/// The time to give an image so that its exposure midpoint lands on `target`.
pub fn shifted_date(date: Epoch, exposure: Duration, target: Epoch) -> Epoch {
    let reference = date + exposure / 2;
    date - (reference - target)
}

/// Differentially rotate `image` so that its exposure midpoint is `target`.
/// Pixels that can't be reprojected keep their input values.
pub fn diff_rotate(
    image: &SolarImage,
    target: Epoch,
    reprojector: &dyn Reproject,
) -> Result<DiffRotated, SynopError> {
    let exposure = image.exposure()?;
    let out_time = shifted_date(image.meta.date, exposure, target);
    info!(
        "Rotating {} from {} to {}",
        image.path.display(),
        format_utc_date(image.meta.date),
        format_utc_date(out_time)
    );

    let out_wcs = image.meta.wcs.sun_centred();
    let Reprojection {
        mut data,
        footprint,
    } = reprojector.reproject(image, &out_wcs, out_time)?;
    if data.dim() != image.data.dim() || footprint.dim() != image.data.dim() {
        return Err(ReprojectError::failed(format!(
            "expected a {:?} reprojection, but got data {:?} and footprint {:?}",
            image.data.dim(),
            data.dim(),
            footprint.dim()
        ))
        .into());
    }

    let mut num_backfilled = 0;
    Zip::from(&mut data)
        .and(&footprint)
        .and(&image.data)
        .for_each(|d, &valid, &original| {
            if !valid {
                *d = original;
                num_backfilled += 1;
            }
        });
    debug!(
        "{} of {} pixels were backfilled from the input",
        num_backfilled,
        data.len()
    );

    Ok(DiffRotated {
        data,
        footprint,
        wcs: out_wcs,
        date: out_time,
    })
}

/// Read `in_fits`, rotate it so that its exposure midpoint is `target`, and
/// write the result to `out_fits`. The header is `template` (or the input's
/// own header) with the geometry fields replaced.
pub fn solar_diff_rot_fits(
    in_fits: &Path,
    target: Epoch,
    out_fits: &Path,
    template: Option<&Path>,
    overwrite: bool,
    reprojector: &dyn Reproject,
) -> Result<PathBuf, SynopError> {
    info!("Reading {}", in_fits.display());
    let image = SolarImage::read(in_fits)?;
    let rotated = diff_rotate(&image, target, reprojector)?;

    let mut header = match template {
        Some(t) => {
            debug!("Using the header of {}", t.display());
            read_template_header(t)?
        }
        None => image.header.clone(),
    };
    rotated.geometry().apply(&mut header)?;

    write_image(out_fits, rotated.data.view(), &header, overwrite)?;
    info!("Wrote {}", out_fits.display());
    Ok(out_fits.to_path_buf())
}
