//! Solar images: a 2D pixel grid plus the metadata needed to interpret it.

use std::path::{Path, PathBuf};

use hifitime::{Duration, Epoch};
use log::{debug, trace, warn};
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use crate::{
    coord::{Observer, RSUN_METRES},
    fits::{
        fits_create_image, fits_get_header, fits_get_image_2d, fits_open, fits_open_hdu,
        fits_write_cards, fits_write_image, FitsError, FitsHeader, HeaderError, HeaderValue,
    },
    time::{format_utc_date, parse_utc_date},
    wcs::{HpcWcs, WcsHeaderError},
};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("{file}: Required metadata {key} is missing")]
    MissingMetadata { key: &'static str, file: PathBuf },

    #[error("{file}: Metadata {key} has an unusable value '{value}'")]
    BadMetadata {
        key: &'static str,
        value: String,
        file: PathBuf,
    },

    #[error("{path} already exists and overwriting wasn't permitted")]
    FileExists { path: PathBuf },

    #[error("{file}: {err}")]
    Header { err: HeaderError, file: PathBuf },

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Everything about an image other than its pixels.
#[derive(Debug, Clone)]
pub struct MapMeta {
    /// DATE-OBS.
    pub date: Epoch,

    /// EXPTIME. Not all images carry it, so it's only required when used.
    pub exposure: Option<Duration>,

    pub wcs: HpcWcs,

    pub observer: Observer,

    /// The radius of the Sun used to interpret the image \[metres\].
    pub rsun: f64,

    /// P_ANGLE \[degrees\]. Only required when used.
    pub p_angle: Option<f64>,
}

/// A solar image read from a FITS file.
#[derive(Debug, Clone)]
pub struct SolarImage {
    /// Rows are y (NAXIS2), columns are x (NAXIS1).
    pub data: Array2<f64>,

    pub meta: MapMeta,

    /// The full primary header, as read.
    pub header: FitsHeader,

    /// Where this image came from.
    pub path: PathBuf,
}

impl SolarImage {
    /// Read the primary HDU of a FITS file.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<SolarImage, ImageError> {
        let file = file.as_ref();
        debug!("Reading solar image {}", file.display());
        let mut fptr = fits_open(file)?;
        let hdu = fits_open_hdu(&mut fptr, 0)?;
        let data = fits_get_image_2d(&mut fptr, &hdu)?;
        let header = fits_get_header(&mut fptr, &hdu)?;
        let meta = MapMeta::from_header(&header, file)?;
        debug!(
            "{}: {}x{} pixels, DATE-OBS {}",
            file.display(),
            data.ncols(),
            data.nrows(),
            format_utc_date(meta.date)
        );

        Ok(SolarImage {
            data,
            meta,
            header,
            path: file.to_path_buf(),
        })
    }

    /// EXPTIME, or an error if the header didn't have it.
    pub fn exposure(&self) -> Result<Duration, ImageError> {
        self.meta.exposure.ok_or_else(|| ImageError::MissingMetadata {
            key: "EXPTIME",
            file: self.path.clone(),
        })
    }

    /// P_ANGLE \[degrees\], or an error if the header didn't have it.
    pub fn p_angle(&self) -> Result<f64, ImageError> {
        self.meta.p_angle.ok_or_else(|| ImageError::MissingMetadata {
            key: "P_ANGLE",
            file: self.path.clone(),
        })
    }

    /// The reference pixel as 0-indexed (x, y) pixel coordinates.
    pub fn reference_pixel(&self) -> (f64, f64) {
        (self.meta.wcs.crpix[0] - 1.0, self.meta.wcs.crpix[1] - 1.0)
    }
}

impl MapMeta {
    pub(crate) fn from_header(header: &FitsHeader, file: &Path) -> Result<MapMeta, ImageError> {
        let header_err = |err| ImageError::Header {
            err,
            file: file.to_path_buf(),
        };
        let get_f64 = |key: &str| header.get_f64(key).map_err(header_err);

        let date_str = header
            .get_str("DATE-OBS")
            .or_else(|| header.get_str("DATE_OBS"))
            .ok_or_else(|| ImageError::MissingMetadata {
                key: "DATE-OBS",
                file: file.to_path_buf(),
            })?;
        let date = parse_utc_date(&date_str).map_err(|_| ImageError::BadMetadata {
            key: "DATE-OBS",
            value: date_str.clone(),
            file: file.to_path_buf(),
        })?;

        let exposure = match get_f64("EXPTIME")? {
            Some(e) if e >= 0.0 => Some(Duration::from_seconds(e)),
            Some(e) => {
                return Err(ImageError::BadMetadata {
                    key: "EXPTIME",
                    value: e.to_string(),
                    file: file.to_path_buf(),
                })
            }
            None => None,
        };

        let wcs = HpcWcs::from_header(header).map_err(|e| match e {
            WcsHeaderError::Missing(key) => ImageError::MissingMetadata {
                key,
                file: file.to_path_buf(),
            },
            WcsHeaderError::Header(err) => header_err(err),
            WcsHeaderError::BadUnit { key, value } => ImageError::BadMetadata {
                key,
                value,
                file: file.to_path_buf(),
            },
        })?;
        if !wcs.is_valid() {
            return Err(ImageError::BadMetadata {
                key: "PC/CDELT",
                value: format!("{:?} {:?}", wcs.pc, wcs.cdelt),
                file: file.to_path_buf(),
            });
        }

        let observer = {
            let lon = get_f64("HGLN_OBS")?;
            let lat = match get_f64("HGLT_OBS")? {
                Some(lat) => Some(lat),
                None => get_f64("CRLT_OBS")?,
            };
            let distance = get_f64("DSUN_OBS")?;
            match (lon, lat, distance) {
                (Some(lon), Some(lat), Some(distance)) if distance > 0.0 => Observer {
                    lon: lon.to_radians(),
                    lat: lat.to_radians(),
                    distance,
                },
                _ => {
                    warn!(
                        "{}: No usable observer location (HGLN_OBS, HGLT_OBS, DSUN_OBS); assuming an Earth observer",
                        file.display()
                    );
                    Observer::earth(date)
                }
            }
        };
        debug!(
            "Observer: lon {:.4} deg, lat {:.4} deg, distance {:.6e} m",
            observer.lon.to_degrees(),
            observer.lat.to_degrees(),
            observer.distance
        );

        let rsun = get_f64("RSUN_REF")?.unwrap_or(RSUN_METRES);
        let p_angle = get_f64("P_ANGLE")?;

        Ok(MapMeta {
            date,
            exposure,
            wcs,
            observer,
            rsun,
            p_angle,
        })
    }
}

/// The header fields that describe an image's geometry. These are the only
/// things written over a template header.
#[derive(Debug, Clone)]
pub struct GeometryPatch {
    pub date: Epoch,

    /// CRVAL1, CRVAL2
    pub reference_coordinate: [f64; 2],

    /// CRPIX1, CRPIX2 (1-indexed)
    pub reference_pixel: [f64; 2],

    /// PC1_1, PC1_2, PC2_1, PC2_2
    pub rotation_matrix: [[f64; 2]; 2],

    /// P_ANGLE \[degrees\]. Only written if set.
    pub p_angle: Option<f64>,
}

impl GeometryPatch {
    pub fn from_wcs(date: Epoch, wcs: &HpcWcs) -> GeometryPatch {
        GeometryPatch {
            date,
            reference_coordinate: wcs.crval,
            reference_pixel: wcs.crpix,
            rotation_matrix: wcs.pc,
            p_angle: None,
        }
    }

    /// Overwrite the geometry fields of `header`. Everything else is left
    /// alone.
    pub fn apply(&self, header: &mut FitsHeader) -> Result<(), HeaderError> {
        let date = format_utc_date(self.date);
        header.set("DATE-OBS", HeaderValue::Str(date.clone()))?;
        header.set("DATE", HeaderValue::Str(date))?;
        header.set("CRVAL1", HeaderValue::Float(self.reference_coordinate[0]))?;
        header.set("CRVAL2", HeaderValue::Float(self.reference_coordinate[1]))?;
        header.set("CRPIX1", HeaderValue::Float(self.reference_pixel[0]))?;
        header.set("CRPIX2", HeaderValue::Float(self.reference_pixel[1]))?;
        header.set("PC1_1", HeaderValue::Float(self.rotation_matrix[0][0]))?;
        header.set("PC1_2", HeaderValue::Float(self.rotation_matrix[0][1]))?;
        header.set("PC2_1", HeaderValue::Float(self.rotation_matrix[1][0]))?;
        header.set("PC2_2", HeaderValue::Float(self.rotation_matrix[1][1]))?;
        if let Some(p_angle) = self.p_angle {
            header.set("P_ANGLE", HeaderValue::Float(p_angle))?;
        }
        Ok(())
    }
}

/// Read the primary header of a template file.
pub fn read_template_header<P: AsRef<Path>>(file: P) -> Result<FitsHeader, ImageError> {
    let mut fptr = fits_open(file.as_ref())?;
    let hdu = fits_open_hdu(&mut fptr, 0)?;
    Ok(fits_get_header(&mut fptr, &hdu)?)
}

/// Write `data` as the primary image of a new FITS file, with every
/// non-structural card of `header`.
///
/// If `file` exists and `overwrite` is false, [`ImageError::FileExists`] is
/// returned and the existing file is not touched. The image is first written
/// next to `file` and then moved into place, so a failure never leaves a
/// partial file at `file`.
pub fn write_image<P: AsRef<Path>>(
    file: P,
    data: ArrayView2<f64>,
    header: &FitsHeader,
    overwrite: bool,
) -> Result<(), ImageError> {
    let file = file.as_ref();
    if file.exists() && !overwrite {
        return Err(ImageError::FileExists {
            path: file.to_path_buf(),
        });
    }

    let temp_file = {
        let mut name = std::ffi::OsString::from(".");
        name.push(file.file_name().unwrap_or_else(|| file.as_os_str()));
        name.push(".partial");
        file.with_file_name(name)
    };
    if temp_file.exists() {
        std::fs::remove_file(&temp_file)?;
    }

    let result = (|| -> Result<(), ImageError> {
        let mut fptr = fits_create_image(&temp_file, data.dim())?;
        let hdu = fits_open_hdu(&mut fptr, 0)?;
        let cards: Vec<_> = header.non_structural_cards().collect();
        trace!("Writing {} header cards", cards.len());
        fits_write_cards(&mut fptr, cards)?;
        let flat: Vec<f64> = data.iter().copied().collect();
        fits_write_image(&mut fptr, &hdu, &flat)?;
        Ok(())
    })();
    let result = result.and_then(|()| Ok(std::fs::rename(&temp_file, file)?));
    if let Err(e) = result {
        // The partial file goes; the original error is reported.
        let _ = std::fs::remove_file(&temp_file);
        return Err(e);
    }
    debug!("Wrote {}", file.display());
    Ok(())
}
