//! Rotating solar images about their reference pixel, e.g. to remove the solar
//! position angle so that image axes follow celestial north and east.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

use crate::{
    error::SynopError,
    image::{read_template_header, write_image, GeometryPatch, SolarImage},
};

#[derive(Error, Debug)]
pub enum RotateError {
    #[error("Can't rotate an empty image")]
    EmptyImage,

    #[error("The rotation centre ({x}, {y}) isn't inside the {nx}x{ny} image")]
    CentreOutsideImage { x: i64, y: i64, nx: usize, ny: usize },

    #[error("The rotation angle {0} isn't finite")]
    BadAngle(f64),

    #[error("Pixel ({x}, {y}) has no world coordinate")]
    NoWorldCoordinate { x: f64, y: f64 },
}

/// Rotate `data` by `angle` degrees about the 0-indexed pixel (`xc`, `yc`),
/// where x is the column and y is the row. A positive angle rotates the same
/// way as `scipy.ndimage.rotate`.
///
/// The image is zero-padded so that the centre pixel sits exactly in the
/// middle of the canvas, the whole canvas is rotated with nearest-neighbour
/// sampling, and the original extent is cropped back out. The centre pixel
/// therefore never moves, and every output value is either an input value or
/// 0.
pub fn rotate_image(
    data: ArrayView2<f64>,
    xc: usize,
    yc: usize,
    angle: f64,
) -> Result<Array2<f64>, RotateError> {
    let (ny, nx) = data.dim();
    if nx == 0 || ny == 0 {
        return Err(RotateError::EmptyImage);
    }
    if xc >= nx || yc >= ny {
        return Err(RotateError::CentreOutsideImage {
            x: xc as i64,
            y: yc as i64,
            nx,
            ny,
        });
    }
    if !angle.is_finite() {
        return Err(RotateError::BadAngle(angle));
    }

    // Pad so the canvas is (2n - 1) pixels on each side, centred on the
    // rotation centre.
    let pad_x = [nx - 1 - xc, xc];
    let pad_y = [ny - 1 - yc, yc];
    let mut canvas = Array2::zeros((ny + pad_y[0] + pad_y[1], nx + pad_x[0] + pad_x[1]));
    canvas
        .slice_mut(s![pad_y[0]..pad_y[0] + ny, pad_x[0]..pad_x[0] + nx])
        .assign(&data);

    let rotated = rotate_about_centre(canvas.view(), angle);
    Ok(rotated
        .slice(s![pad_y[0]..pad_y[0] + ny, pad_x[0]..pad_x[0] + nx])
        .to_owned())
}

/// Rotate an odd-sized canvas about its central pixel with nearest-neighbour
/// sampling. Anything sampled from outside the canvas is 0.
fn rotate_about_centre(canvas: ArrayView2<f64>, angle: f64) -> Array2<f64> {
    let (ny, nx) = canvas.dim();
    let cr = (ny - 1) as f64 / 2.0;
    let cc = (nx - 1) as f64 / 2.0;
    let (sin, cos) = sin_cos_degrees(angle);

    Array2::from_shape_fn((ny, nx), |(r, c)| {
        let dr = r as f64 - cr;
        let dc = c as f64 - cc;
        let in_r = (cos * dr + sin * dc + cr + 0.5).floor();
        let in_c = (-sin * dr + cos * dc + cc + 0.5).floor();
        if in_r < 0.0 || in_c < 0.0 || in_r >= ny as f64 || in_c >= nx as f64 {
            0.0
        } else {
            canvas[[in_r as usize, in_c as usize]]
        }
    })
}

/// sin and cos of an angle in degrees, exact for multiples of 90.
fn sin_cos_degrees(angle: f64) -> (f64, f64) {
    let a = angle.rem_euclid(360.0);
    if a == 0.0 {
        (0.0, 1.0)
    } else if a == 90.0 {
        (1.0, 0.0)
    } else if a == 180.0 {
        (0.0, -1.0)
    } else if a == 270.0 {
        (-1.0, 0.0)
    } else {
        a.to_radians().sin_cos()
    }
}

/// Remove the solar position angle from `in_fits`, writing a sky-aligned image
/// to `out_fits`. The header is `template` (or the input's own header) with
/// the geometry fields replaced and P_ANGLE set to the correction applied.
///
/// The image turns about the pixel containing the reference pixel. If CRPIX
/// is fractional, CRVAL is moved to the world coordinate of that pixel's
/// centre so the new CRPIX and CRVAL still agree.
pub fn sunpy_fits_to_j2000(
    in_fits: &Path,
    out_fits: &Path,
    template: Option<&Path>,
    overwrite: bool,
) -> Result<PathBuf, SynopError> {
    info!("Reading {}", in_fits.display());
    let image = SolarImage::read(in_fits)?;
    let p_angle = image.p_angle()?;

    let (ref_x, ref_y) = image.reference_pixel();
    let (ref_x, ref_y) = (ref_x.floor(), ref_y.floor());
    let (ny, nx) = image.data.dim();
    if ref_x < 0.0 || ref_y < 0.0 || ref_x >= nx as f64 || ref_y >= ny as f64 {
        return Err(RotateError::CentreOutsideImage {
            x: ref_x as i64,
            y: ref_y as i64,
            nx,
            ny,
        }
        .into());
    }
    debug!("Rotating by {} deg about pixel ({ref_x}, {ref_y})", -p_angle);
    let rotated = rotate_image(image.data.view(), ref_x as usize, ref_y as usize, -p_angle)?;

    let mut header = match template {
        Some(t) => {
            debug!("Using the header of {}", t.display());
            read_template_header(t)?
        }
        None => image.header.clone(),
    };
    let wcs = &image.meta.wcs;
    let reference_coordinate = if [ref_x + 1.0, ref_y + 1.0] == wcs.crpix {
        wcs.crval
    } else {
        let (tx, ty) = wcs
            .projection()
            .pixel_to_world(ref_x, ref_y)
            .ok_or(RotateError::NoWorldCoordinate { x: ref_x, y: ref_y })?;
        let crval = [tx / wcs.units[0].to_radians(), ty / wcs.units[1].to_radians()];
        debug!("CRVAL moves from {:?} to {crval:?}", wcs.crval);
        crval
    };
    GeometryPatch {
        date: image.meta.date,
        reference_coordinate,
        reference_pixel: [ref_x + 1.0, ref_y + 1.0],
        rotation_matrix: wcs.pc,
        p_angle: Some(p_angle),
    }
    .apply(&mut header)?;

    write_image(out_fits, rotated.view(), &header, overwrite)?;
    info!("Wrote {}", out_fits.display());
    Ok(out_fits.to_path_buf())
}
