//! Data-preparation utilities for EOVSA synoptic solar imaging: differential
//! rotation of solar images to a common time, removal of the solar position
//! angle, and running wsclean.

pub mod coord;
mod error;
pub mod fits;
pub mod image;
pub mod ms;
pub mod reproject;
pub mod rotate;
pub mod time;
pub mod wcs;
pub mod wsclean;

pub use error::SynopError;
pub use image::{ImageError, SolarImage};
pub use reproject::{
    diff_rotate, solar_diff_rot_fits, Reproject, ReprojectError, SolarSurfaceReprojector,
};
pub use rotate::{rotate_image, sunpy_fits_to_j2000, RotateError};
pub use wsclean::{PixelScale, Wsclean, WscleanConfig, WscleanError};
