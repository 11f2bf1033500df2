//! Solar coordinate frames.
//!
//! Helioprojective coordinates (Tx, Ty) are the angles seen by an observer.
//! Heliocentric-Cartesian coordinates are metres from Sun centre, with z
//! pointing at the observer and y towards solar north. Heliographic
//! Stonyhurst coordinates are (longitude, latitude) on the solar sphere, with
//! longitude 0 facing the Earth.

use std::f64::consts::PI;

use hifitime::Epoch;
use practical_astronomy_rust::macros as pa;

use crate::wcs::wrap_angle;

/// The nominal solar radius \[metres\] (IAU 2015 B3).
pub const RSUN_METRES: f64 = 6.957e8;

/// The astronomical unit \[metres\].
pub const AU_METRES: f64 = 1.495978707e11;

/// Howard et al. (1990) sidereal differential rotation coefficients
/// \[µrad s^-1\].
const HOWARD_A: f64 = 2.894;
const HOWARD_B: f64 = -0.428;
const HOWARD_C: f64 = -0.370;

/// The position of an observer in Heliographic Stonyhurst coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    /// \[radians\]
    pub lon: f64,

    /// \[radians\]
    pub lat: f64,

    /// Distance from Sun centre \[metres\].
    pub distance: f64,
}

impl Observer {
    /// An observer at the centre of the Earth, according to the low-precision
    /// solar ephemeris.
    pub fn earth(epoch: Epoch) -> Observer {
        let eph = SunEphemeris::new(epoch);
        Observer {
            lon: 0.0,
            lat: eph.b0,
            distance: eph.distance_au * AU_METRES,
        }
    }

    /// Unit vectors of the heliocentric-Cartesian axes, expressed in
    /// Stonyhurst Cartesian coordinates.
    fn hcc_axes(&self) -> [[f64; 3]; 3] {
        let (sin_b, cos_b) = self.lat.sin_cos();
        let (sin_l, cos_l) = self.lon.sin_cos();
        let x = [-sin_l, cos_l, 0.0];
        let y = [-sin_b * cos_l, -sin_b * sin_l, cos_b];
        let z = [cos_b * cos_l, cos_b * sin_l, sin_b];
        [x, y, z]
    }
}

/// A point on (or above) the Sun in Heliographic Stonyhurst coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heliographic {
    /// \[radians\]
    pub lon: f64,

    /// \[radians\]
    pub lat: f64,

    /// \[metres\]
    pub radius: f64,
}

/// Find where the line of sight (Tx, Ty) \[radians\] from the observer first
/// meets a sphere of radius `rsun` \[metres\]. Returns heliocentric-Cartesian
/// (x, y, z) \[metres\], or `None` if the line of sight misses the Sun.
pub fn hpc_to_hcc(tx: f64, ty: f64, observer: &Observer, rsun: f64) -> Option<[f64; 3]> {
    let d0 = observer.distance;
    let (sin_tx, cos_tx) = tx.sin_cos();
    let (sin_ty, cos_ty) = ty.sin_cos();
    let b = d0 * cos_ty * cos_tx;
    let discriminant = b * b - d0 * d0 + rsun * rsun;
    if discriminant < 0.0 {
        return None;
    }
    let d = b - discriminant.sqrt();
    Some([d * cos_ty * sin_tx, d * sin_ty, d0 - d * cos_ty * cos_tx])
}

/// The inverse of [`hpc_to_hcc`]; (Tx, Ty) \[radians\].
pub fn hcc_to_hpc(hcc: [f64; 3], observer: &Observer) -> (f64, f64) {
    let [x, y, z] = hcc;
    let dz = observer.distance - z;
    let d = (x * x + y * y + dz * dz).sqrt();
    (x.atan2(dz), (y / d).asin())
}

/// Can the observer see this point on the sphere of radius `rsun`?
pub fn is_visible(hcc: [f64; 3], observer: &Observer, rsun: f64) -> bool {
    hcc[2] * observer.distance >= rsun * rsun
}

pub fn hcc_to_hgs(hcc: [f64; 3], observer: &Observer) -> Heliographic {
    let axes = observer.hcc_axes();
    let v: [f64; 3] =
        std::array::from_fn(|i| hcc[0] * axes[0][i] + hcc[1] * axes[1][i] + hcc[2] * axes[2][i]);
    let radius = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    Heliographic {
        lon: v[1].atan2(v[0]),
        lat: (v[2] / radius).clamp(-1.0, 1.0).asin(),
        radius,
    }
}

pub fn hgs_to_hcc(hgs: Heliographic, observer: &Observer) -> [f64; 3] {
    let (sin_lat, cos_lat) = hgs.lat.sin_cos();
    let (sin_lon, cos_lon) = hgs.lon.sin_cos();
    let v = [
        hgs.radius * cos_lat * cos_lon,
        hgs.radius * cos_lat * sin_lon,
        hgs.radius * sin_lat,
    ];
    observer
        .hcc_axes()
        .map(|axis| axis[0] * v[0] + axis[1] * v[1] + axis[2] * v[2])
}

/// The Howard et al. (1990) sidereal rotation rate at a latitude
/// \[radians s^-1\].
pub fn howard_rate(lat: f64) -> f64 {
    let sin2 = lat.sin().powi(2);
    (HOWARD_A + HOWARD_B * sin2 + HOWARD_C * sin2 * sin2) * 1e-6
}

/// How far (in Stonyhurst longitude \[radians\]) a feature at `lat` moves
/// between `from` and `to`. This is the sidereal rotation minus the Earth's
/// orbital motion over the same interval.
pub fn stonyhurst_rotation(lat: f64, from: Epoch, to: Epoch) -> f64 {
    let dt = (to - from).to_seconds();
    // The ephemeris only gives the Earth's motion modulo a full orbit, so
    // correct a mean-motion estimate with it.
    let mean_motion = dt * 2.0 * PI / (365.256_363 * 86400.0);
    let apparent_change =
        SunEphemeris::new(to).apparent_longitude - SunEphemeris::new(from).apparent_longitude;
    let earth_motion = mean_motion + wrap_angle(apparent_change - mean_motion);
    howard_rate(lat) * dt - earth_motion
}

/// Move a helioprojective coordinate seen at `from` to where the same solar
/// surface feature appears at `to`, for a fixed observer. `None` if the
/// coordinate is off the disk or the feature rotates out of view.
pub fn rotate_hpc(
    tx: f64,
    ty: f64,
    observer: &Observer,
    rsun: f64,
    from: Epoch,
    to: Epoch,
) -> Option<(f64, f64)> {
    let hcc = hpc_to_hcc(tx, ty, observer, rsun)?;
    let mut hgs = hcc_to_hgs(hcc, observer);
    hgs.lon = wrap_angle(hgs.lon + stonyhurst_rotation(hgs.lat, from, to));
    let hcc = hgs_to_hcc(hgs, observer);
    if !is_visible(hcc, observer, rsun) {
        return None;
    }
    Some(hcc_to_hpc(hcc, observer))
}

/// Low-precision solar coordinates. The longitude and distance come from
/// Duffett-Smith's Practical Astronomy routines and are good to about 0.01
/// degrees, which is plenty for working out where an Earth observer is. B0
/// follows Meeus (Astronomical Algorithms, chapter 29).
#[derive(Debug, Clone, Copy)]
pub struct SunEphemeris {
    /// The Sun's apparent ecliptic longitude \[radians\].
    pub apparent_longitude: f64,

    /// The Sun-Earth distance \[AU\].
    pub distance_au: f64,

    /// The heliographic latitude of the centre of the disk \[radians\].
    pub b0: f64,
}

/// The constant of annual aberration \[degrees\].
const ABERRATION_DEG: f64 = 20.496 / 3600.0;

impl SunEphemeris {
    pub fn new(epoch: Epoch) -> SunEphemeris {
        let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
        let (year, month) = (year as u32, month as u32);
        let (hour, minute) = (hour as f64, minute as f64);
        let second = second as f64 + nanos as f64 / 1e9;
        let day = day as f64;

        let true_longitude = pa::sun_long(hour, minute, second, 0, 0, day, month, year);
        let distance_au = pa::sun_dist(hour, minute, second, 0, 0, day, month, year);
        let fractional_day = day + pa::hms_dh(hour, minute, second) / 24.0;
        let apparent_longitude =
            (true_longitude + pa::nutat_long(fractional_day, month, year) - ABERRATION_DEG)
                .to_radians();

        // The longitude of the ascending node of the solar equator on the
        // ecliptic, and the equator's inclination.
        let jde = epoch.to_jde_tt_days();
        let k = (73.6667 + 1.3958333 * (jde - 2_396_758.0) / 36525.0).to_radians();
        let inclination = 7.25_f64.to_radians();
        let b0 = ((apparent_longitude - k).sin() * inclination.sin()).asin();

        SunEphemeris {
            apparent_longitude: apparent_longitude.rem_euclid(2.0 * PI),
            distance_au,
            b0,
        }
    }
}
