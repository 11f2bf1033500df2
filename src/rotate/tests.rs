use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use tempfile::tempdir;

use super::*;
use crate::{
    fits::{Card, FitsHeader},
    image::ImageError,
};

fn ramp(ny: usize, nx: usize) -> Array2<f64> {
    Array2::from_shape_fn((ny, nx), |(r, c)| (r * nx + c + 1) as f64)
}

#[test]
fn test_axis_aligned_rotations_are_exact() {
    let data = ramp(5, 5);
    assert_eq!(rotate_image(data.view(), 2, 2, 0.0).unwrap(), data);
    assert_eq!(rotate_image(data.view(), 2, 2, 360.0).unwrap(), data);

    let r90 = rotate_image(data.view(), 2, 2, 90.0).unwrap();
    // Input (row, col) = (dc, -dr) relative to the centre.
    for ((r, c), &v) in r90.indexed_iter() {
        let in_r = c;
        let in_c = 4 - r;
        assert_eq!(v, data[[in_r, in_c]], "({r}, {c})");
    }

    let r180 = rotate_image(data.view(), 2, 2, 180.0).unwrap();
    let mut flipped = data.clone();
    flipped.invert_axis(Axis(0));
    flipped.invert_axis(Axis(1));
    assert_eq!(r180, flipped);

    // 90 four times is nothing, as is 90 then 270 or -90.
    let r270 = rotate_image(data.view(), 2, 2, 270.0).unwrap();
    assert_eq!(rotate_image(r90.view(), 2, 2, 270.0).unwrap(), data);
    assert_eq!(rotate_image(r90.view(), 2, 2, -90.0).unwrap(), data);
    assert_eq!(rotate_image(r270.view(), 2, 2, 90.0).unwrap(), data);
    assert_eq!(rotate_image(r180.view(), 2, 2, 180.0).unwrap(), data);
}

#[test]
fn test_off_centre_axis_aligned_rotation() {
    // Rotating about a corner pixel moves everything else out of the frame
    // (or in from the zero padding).
    let data = ramp(4, 6);
    let rotated = rotate_image(data.view(), 0, 0, 180.0).unwrap();
    assert_eq!(rotated[[0, 0]], data[[0, 0]]);
    assert_eq!(rotated.sum(), data[[0, 0]]);

    // A pixel to the right of the centre ends up below or above it at 90
    // degrees.
    let rotated = rotate_image(data.view(), 2, 1, 90.0).unwrap();
    assert_eq!(rotated[[1, 2]], data[[1, 2]]);
    let moved = rotated
        .indexed_iter()
        .find(|(_, &v)| v == data[[1, 3]])
        .map(|(i, _)| i)
        .unwrap();
    assert!(moved == (0, 2) || moved == (2, 2), "{moved:?}");
}

#[test]
fn test_rotation_keeps_reference_pixel() {
    let data = ramp(37, 23);
    for (xc, yc) in [(11, 18), (0, 0), (22, 36), (5, 30)] {
        for angle in [-15.0, 7.3, 45.0, 90.0, 123.4, 200.0, -271.0] {
            let rotated = rotate_image(data.view(), xc, yc, angle).unwrap();
            assert_eq!(rotated.dim(), data.dim());
            assert_eq!(rotated[[yc, xc]], data[[yc, xc]], "{angle} ({xc}, {yc})");
        }
    }
}

#[test]
fn test_rotation_only_moves_values() {
    let data = ramp(20, 20);
    let rotated = rotate_image(data.view(), 9, 9, 33.0).unwrap();
    for &v in rotated.iter() {
        assert!(v == 0.0 || data.iter().any(|&d| d == v), "{v}");
    }
}

#[test]
fn test_rotate_there_and_back() {
    let n = 31;
    let c = 15;
    // Values change by 1 per pixel in each direction.
    let data = Array2::from_shape_fn((n, n), |(r, col)| (r + col) as f64);
    for angle in [15.0, 33.3, 60.0, -75.0] {
        let there = rotate_image(data.view(), c, c, angle).unwrap();
        let back = rotate_image(there.view(), c, c, -angle).unwrap();
        for ((r, col), &v) in back.indexed_iter() {
            let dr = r as f64 - c as f64;
            let dc = col as f64 - c as f64;
            if dr.hypot(dc) <= 12.0 {
                // Each nearest-neighbour step is at most 1/sqrt(2) pixels off.
                assert!((v - data[[r, col]]).abs() <= 2.0 + 1e-9, "{angle} ({r}, {col})");
            }
        }
        assert_eq!(back[[c, c]], data[[c, c]]);
    }
}

#[test]
fn test_bad_rotations() {
    let data = ramp(4, 4);
    assert!(matches!(
        rotate_image(data.view(), 4, 0, 10.0),
        Err(RotateError::CentreOutsideImage { .. })
    ));
    assert!(matches!(
        rotate_image(data.view(), 0, 0, f64::NAN),
        Err(RotateError::BadAngle(_))
    ));
    let empty = Array2::<f64>::zeros((0, 3));
    assert!(matches!(
        rotate_image(empty.view(), 0, 0, 10.0),
        Err(RotateError::EmptyImage)
    ));
}

fn position_angle_header(p_angle: Option<f64>) -> FitsHeader {
    position_angle_header_at(p_angle, 51.0)
}

fn position_angle_header_at(p_angle: Option<f64>, crpix: f64) -> FitsHeader {
    let mut records = vec![
        "DATE-OBS= '2024-12-15T20:00:00.000'".to_string(),
        "TELESCOP= 'EOVSA   '".to_string(),
        format!("CRPIX1  = {:>20}", format!("{crpix:?}")),
        format!("CRPIX2  = {:>20}", format!("{crpix:?}")),
        "CRVAL1  =                 12.0".to_string(),
        "CRVAL2  =                -34.0".to_string(),
        "CDELT1  =                 20.0".to_string(),
        "CDELT2  =                 20.0".to_string(),
        "CUNIT1  = 'arcsec  '".to_string(),
        "CUNIT2  = 'arcsec  '".to_string(),
        "PC1_1   =                  1.0".to_string(),
        "PC2_2   =                  1.0".to_string(),
    ];
    if let Some(p) = p_angle {
        records.push(format!("P_ANGLE = {:>20}", format!("{p:?}")));
    }
    FitsHeader::from_cards(records.iter().map(|r| Card::from_record(r)).collect())
}

#[test]
fn test_sunpy_fits_to_j2000() {
    let dir = tempdir().unwrap();
    let in_fits = dir.path().join("helio.fits");
    let out_fits = dir.path().join("j2000.fits");
    let data = ramp(100, 100);
    write_image(&in_fits, data.view(), &position_angle_header(Some(15.0)), false).unwrap();

    sunpy_fits_to_j2000(&in_fits, &out_fits, None, false).unwrap();

    let out = SolarImage::read(&out_fits).unwrap();
    assert_eq!(out.header.get_f64("P_ANGLE").unwrap(), Some(15.0));
    assert_eq!(out.data[[50, 50]], data[[50, 50]]);
    assert_eq!(out.data, rotate_image(data.view(), 50, 50, -15.0).unwrap());
    assert_eq!(out.meta.wcs.crpix, [51.0, 51.0]);
    assert_eq!(out.meta.wcs.crval, [12.0, -34.0]);
    assert_abs_diff_eq!(out.meta.wcs.pc[0][1], 0.0);
    assert_eq!(
        out.header.get_str("DATE-OBS").as_deref(),
        Some("2024-12-15T20:00:00.000")
    );
    assert_eq!(
        out.header.get_str("DATE").as_deref(),
        Some("2024-12-15T20:00:00.000")
    );
    assert!(out
        .header
        .cards()
        .contains(&Card::from_record("TELESCOP= 'EOVSA   '")));

    // An existing output is left alone.
    let before = std::fs::read(&out_fits).unwrap();
    let result = sunpy_fits_to_j2000(&in_fits, &out_fits, None, false);
    assert!(matches!(
        result,
        Err(SynopError::Image(ImageError::FileExists { .. }))
    ));
    assert_eq!(std::fs::read(&out_fits).unwrap(), before);
    sunpy_fits_to_j2000(&in_fits, &out_fits, None, true).unwrap();
}

#[test]
fn test_sunpy_fits_to_j2000_fractional_crpix() {
    let dir = tempdir().unwrap();
    let in_fits = dir.path().join("helio.fits");
    let out_fits = dir.path().join("j2000.fits");
    let data = ramp(100, 100);
    write_image(
        &in_fits,
        data.view(),
        &position_angle_header_at(Some(15.0), 50.5),
        false,
    )
    .unwrap();

    sunpy_fits_to_j2000(&in_fits, &out_fits, None, false).unwrap();

    // The image turns about 0-indexed pixel 49, half a pixel (10 arcsec)
    // before the old reference pixel on each axis.
    let out = SolarImage::read(&out_fits).unwrap();
    assert_eq!(out.data, rotate_image(data.view(), 49, 49, -15.0).unwrap());
    assert_eq!(out.meta.wcs.crpix, [50.0, 50.0]);
    assert_abs_diff_eq!(out.meta.wcs.crval[0], 2.0, epsilon = 1e-4);
    assert_abs_diff_eq!(out.meta.wcs.crval[1], -44.0, epsilon = 1e-4);
}

#[test]
fn test_sunpy_fits_to_j2000_needs_p_angle() {
    let dir = tempdir().unwrap();
    let in_fits = dir.path().join("helio.fits");
    let out_fits = dir.path().join("j2000.fits");
    write_image(&in_fits, ramp(10, 10).view(), &position_angle_header(None), false).unwrap();

    let result = sunpy_fits_to_j2000(&in_fits, &out_fits, None, false);
    assert!(matches!(
        result,
        Err(SynopError::Image(ImageError::MissingMetadata { key: "P_ANGLE", .. }))
    ));
    assert!(!out_fits.exists());
}
