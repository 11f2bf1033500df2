//! The world coordinate system of a helioprojective image.
//!
//! Only the parts of FITS WCS that solar images use are supported: a linear
//! transform (CRPIX, PC, CDELT) followed by the gnomonic (TAN) projection,
//! centred on CRVAL.

use std::f64::consts::PI;

use mapproj::{
    img2proj::{ImgXY2ProjXY, WcsImgXY2ProjXY},
    zenithal::tan::Tan,
    CenteredProjection, ImgXY, LonLat, Projection,
};
use strum_macros::{EnumString, IntoStaticStr};

use crate::fits::{FitsHeader, HeaderError};

/// The angular units that CUNITn may specify.
#[derive(Debug, Clone, Copy, PartialEq, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum AngleUnit {
    #[strum(serialize = "deg")]
    Deg,

    #[strum(serialize = "arcmin")]
    Arcmin,

    #[strum(serialize = "arcsec")]
    Arcsec,
}

impl AngleUnit {
    /// Multiply a value in this unit by this to get radians.
    pub fn to_radians(self) -> f64 {
        match self {
            AngleUnit::Deg => PI / 180.0,
            AngleUnit::Arcmin => PI / (180.0 * 60.0),
            AngleUnit::Arcsec => PI / (180.0 * 3600.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HpcWcs {
    /// The 1-indexed reference pixel (CRPIX1, CRPIX2).
    pub crpix: [f64; 2],

    /// The reference coordinate (CRVAL1, CRVAL2) in `units`.
    pub crval: [f64; 2],

    /// The pixel scale (CDELT1, CDELT2) in `units` per pixel.
    pub cdelt: [f64; 2],

    /// The rotation matrix (PCi_j).
    pub pc: [[f64; 2]; 2],

    /// CUNIT1 and CUNIT2.
    pub units: [AngleUnit; 2],
}

/// Something went wrong getting a WCS out of a header. The key is always
/// reported so the caller can say what's missing.
#[derive(Debug)]
pub(crate) enum WcsHeaderError {
    Missing(&'static str),
    Header(HeaderError),
    BadUnit { key: &'static str, value: String },
}

impl From<HeaderError> for WcsHeaderError {
    fn from(e: HeaderError) -> Self {
        WcsHeaderError::Header(e)
    }
}

impl HpcWcs {
    pub(crate) fn from_header(header: &FitsHeader) -> Result<HpcWcs, WcsHeaderError> {
        let required = |key: &'static str| -> Result<f64, WcsHeaderError> {
            header.get_f64(key)?.ok_or(WcsHeaderError::Missing(key))
        };
        let unit = |key: &'static str| -> Result<AngleUnit, WcsHeaderError> {
            match header.get_str(key) {
                // The FITS standard says celestial axes are in degrees unless
                // stated otherwise.
                None => Ok(AngleUnit::Deg),
                Some(s) if s.is_empty() => Ok(AngleUnit::Deg),
                Some(s) => s.parse().map_err(|_| WcsHeaderError::BadUnit { key, value: s }),
            }
        };

        let crpix = [required("CRPIX1")?, required("CRPIX2")?];
        let crval = [required("CRVAL1")?, required("CRVAL2")?];
        let cdelt = [required("CDELT1")?, required("CDELT2")?];
        let units = [unit("CUNIT1")?, unit("CUNIT2")?];
        let pc = rotation_matrix_from_header(header, cdelt)?;

        Ok(HpcWcs {
            crpix,
            crval,
            cdelt,
            pc,
            units,
        })
    }

    /// A WCS with the same pixel grid as this one, but centred on the Sun and
    /// without any rotation.
    pub fn sun_centred(&self) -> HpcWcs {
        HpcWcs {
            crval: [0.0, 0.0],
            pc: [[1.0, 0.0], [0.0, 1.0]],
            ..self.clone()
        }
    }

    /// Is the linear part of this WCS invertible and finite?
    pub fn is_valid(&self) -> bool {
        let det = self.pc[0][0] * self.pc[1][1] - self.pc[0][1] * self.pc[1][0];
        det.is_finite()
            && det != 0.0
            && self.cdelt.iter().all(|c| c.is_finite() && *c != 0.0)
            && self.crpix.iter().chain(self.crval.iter()).all(|v| v.is_finite())
    }

    /// The pixel <-> helioprojective transform described by this WCS.
    pub fn projection(&self) -> HpcProjection {
        let [[a, b], [c, d]] = self.pc;
        let cdelt_rad = [
            self.cdelt[0] * self.units[0].to_radians(),
            self.cdelt[1] * self.units[1].to_radians(),
        ];
        // mapproj wants CDELT in degrees.
        let img2proj = WcsImgXY2ProjXY::from_pc(
            self.crpix[0],
            self.crpix[1],
            a,
            b,
            c,
            d,
            cdelt_rad[0].to_degrees(),
            cdelt_rad[1].to_degrees(),
        );

        let cd = [
            [a * cdelt_rad[0], b * cdelt_rad[0]],
            [c * cdelt_rad[1], d * cdelt_rad[1]],
        ];
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        let icd = [
            [cd[1][1] / det, -cd[0][1] / det],
            [-cd[1][0] / det, cd[0][0] / det],
        ];

        let mut tan = CenteredProjection::new(Tan::new());
        tan.set_proj_center_from_lonlat(&LonLat::new(
            self.crval[0] * self.units[0].to_radians(),
            self.crval[1] * self.units[1].to_radians(),
        ));

        HpcProjection {
            img2proj,
            icd,
            crpix: self.crpix,
            tan,
        }
    }
}

/// The TAN projection of an [`HpcWcs`], ready to convert coordinates.
pub struct HpcProjection {
    img2proj: WcsImgXY2ProjXY,
    /// The inverse of the CD matrix \[pixels per radian\]. mapproj's own
    /// inverse transposes the off-diagonal terms, so it isn't used.
    icd: [[f64; 2]; 2],
    crpix: [f64; 2],
    tan: CenteredProjection<Tan>,
}

impl HpcProjection {
    /// Convert a 0-indexed pixel coordinate (x is the column, y is the row)
    /// to helioprojective (Tx, Ty) \[radians\].
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let proj_xy = self.img2proj.img2proj(&ImgXY::new(x + 1.0, y + 1.0));
        self.tan
            .unproj_lonlat(&proj_xy)
            .map(|lonlat| (wrap_angle(lonlat.lon()), lonlat.lat()))
    }

    /// Convert helioprojective (Tx, Ty) \[radians\] to a 0-indexed pixel
    /// coordinate. `None` if the coordinate is on the far side of the
    /// projection.
    pub fn world_to_pixel(&self, tx: f64, ty: f64) -> Option<(f64, f64)> {
        let proj_xy = self.tan.proj_lonlat(&LonLat::new(tx, ty))?;
        let [[a, b], [c, d]] = self.icd;
        let (px, py) = (proj_xy.x(), proj_xy.y());
        Some((
            a * px + b * py + self.crpix[0] - 1.0,
            c * px + d * py + self.crpix[1] - 1.0,
        ))
    }
}

/// Work out the rotation matrix in the same order of preference as sunpy:
/// PCi_j, then CROTA2, then CDi_j, then the identity.
fn rotation_matrix_from_header(
    header: &FitsHeader,
    cdelt: [f64; 2],
) -> Result<[[f64; 2]; 2], HeaderError> {
    let pc = [
        header.get_f64("PC1_1")?,
        header.get_f64("PC1_2")?,
        header.get_f64("PC2_1")?,
        header.get_f64("PC2_2")?,
    ];
    if pc.iter().any(Option::is_some) {
        return Ok([
            [pc[0].unwrap_or(1.0), pc[1].unwrap_or(0.0)],
            [pc[2].unwrap_or(0.0), pc[3].unwrap_or(1.0)],
        ]);
    }

    if let Some(crota2) = header.get_f64("CROTA2")? {
        let lam = cdelt[1] / cdelt[0];
        let (s, c) = crota2.to_radians().sin_cos();
        return Ok([[c, -lam * s], [s / lam, c]]);
    }

    let cd = [
        header.get_f64("CD1_1")?,
        header.get_f64("CD1_2")?,
        header.get_f64("CD2_1")?,
        header.get_f64("CD2_2")?,
    ];
    if cd.iter().any(Option::is_some) {
        return Ok([
            [cd[0].unwrap_or(cdelt[0]) / cdelt[0], cd[1].unwrap_or(0.0) / cdelt[0]],
            [cd[2].unwrap_or(0.0) / cdelt[1], cd[3].unwrap_or(cdelt[1]) / cdelt[1]],
        ]);
    }

    Ok([[1.0, 0.0], [0.0, 1.0]])
}

/// Wrap an angle into (-pi, pi].
pub(crate) fn wrap_angle(a: f64) -> f64 {
    let wrapped = (a + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::fits::Card;

    fn arcsec(a: f64) -> f64 {
        a * AngleUnit::Arcsec.to_radians()
    }

    fn test_wcs() -> HpcWcs {
        let (s, c) = 10.0_f64.to_radians().sin_cos();
        HpcWcs {
            crpix: [64.5, 60.0],
            crval: [120.0, -250.0],
            cdelt: [4.0, 4.0],
            pc: [[c, -s], [s, c]],
            units: [AngleUnit::Arcsec, AngleUnit::Arcsec],
        }
    }

    #[test]
    fn test_reference_pixel_maps_to_reference_coordinate() {
        let proj = test_wcs().projection();
        let (tx, ty) = proj.pixel_to_world(63.5, 59.0).unwrap();
        assert_abs_diff_eq!(tx, arcsec(120.0), epsilon = 1e-12);
        assert_abs_diff_eq!(ty, arcsec(-250.0), epsilon = 1e-12);
    }

    #[test]
    fn test_pixel_world_round_trip() {
        // The rotated PC matrix makes sure the inverse isn't transposed.
        let proj = test_wcs().projection();
        for (x, y) in [(0.0, 0.0), (127.0, 0.0), (13.25, 99.5), (-40.0, 300.0)] {
            let (tx, ty) = proj.pixel_to_world(x, y).unwrap();
            let (x2, y2) = proj.world_to_pixel(tx, ty).unwrap();
            assert_abs_diff_eq!(x, x2, epsilon = 1e-8);
            assert_abs_diff_eq!(y, y2, epsilon = 1e-8);
        }

        // A pixel along the first rotated axis.
        let (tx, ty) = proj.pixel_to_world(73.5, 59.0).unwrap();
        let (s, c) = 10.0_f64.to_radians().sin_cos();
        assert_abs_diff_eq!(tx, arcsec(120.0 + 40.0 * c), epsilon = arcsec(1e-3));
        assert_abs_diff_eq!(ty, arcsec(-250.0 + 40.0 * s), epsilon = arcsec(1e-3));
    }

    #[test]
    fn test_far_side_has_no_pixel() {
        let proj = test_wcs().projection();
        assert!(proj.world_to_pixel(PI, 0.0).is_none());
        assert!(proj.world_to_pixel(arcsec(120.0), arcsec(-250.0)).is_some());
    }

    #[test]
    fn test_sun_centred_is_nearly_linear() {
        let proj = test_wcs().sun_centred().projection();
        // 100 pixels west of the reference pixel is very nearly 400 arcsec.
        let (tx, ty) = proj.pixel_to_world(163.5, 59.0).unwrap();
        assert_abs_diff_eq!(tx, arcsec(400.0), epsilon = arcsec(1e-3));
        assert_abs_diff_eq!(ty, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_wcs_from_header() {
        let header = FitsHeader::from_cards(
            [
                "CRPIX1  =                256.5",
                "CRPIX2  =                256.5",
                "CRVAL1  =                  0.0",
                "CRVAL2  =                  0.0",
                "CDELT1  =                  2.5",
                "CDELT2  =                  5.0",
                "CUNIT1  = 'arcsec  '",
                "CUNIT2  = 'ARCSEC  '",
                "CROTA2  =                 30.0",
            ]
            .into_iter()
            .map(Card::from_record)
            .collect(),
        );
        let wcs = HpcWcs::from_header(&header).unwrap();
        assert_eq!(wcs.units, [AngleUnit::Arcsec, AngleUnit::Arcsec]);
        let (s, c) = 30.0_f64.to_radians().sin_cos();
        assert_abs_diff_eq!(wcs.pc[0][0], c);
        assert_abs_diff_eq!(wcs.pc[0][1], -2.0 * s);
        assert_abs_diff_eq!(wcs.pc[1][0], s / 2.0);
        assert_abs_diff_eq!(wcs.pc[1][1], c);

        let header = FitsHeader::from_cards(vec![Card::from_record("CRPIX1  =                256.5")]);
        assert!(matches!(
            HpcWcs::from_header(&header),
            Err(WcsHeaderError::Missing("CRPIX2"))
        ));
    }

    #[test]
    fn test_wrap_angle() {
        assert_abs_diff_eq!(wrap_angle(3.0 * PI), PI);
        assert_abs_diff_eq!(wrap_angle(-PI), PI);
        assert_abs_diff_eq!(wrap_angle(0.5), 0.5);
        assert_abs_diff_eq!(wrap_angle(2.0 * PI + 0.5), 0.5, epsilon = 1e-12);
    }
}
