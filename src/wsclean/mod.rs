//! Building and running wsclean command lines.

mod error;
#[cfg(test)]
mod tests;

pub use error::WscleanError;

use std::{fmt::Display, path::PathBuf, process::Command, str::FromStr};

use itertools::Itertools;
use log::info;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use vec1::Vec1;

/// The units wsclean understands for `-scale`.
#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum ScaleUnit {
    /// Milliarcseconds. Listed before `Asec` so it is matched first.
    #[strum(serialize = "masec")]
    Masec,

    /// Arcseconds
    #[strum(serialize = "asec")]
    Asec,

    /// Arcminutes
    #[strum(serialize = "amin")]
    Amin,

    /// Degrees
    #[strum(serialize = "deg")]
    Deg,
}

/// An image pixel scale, e.g. "2.5asec".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub value: f64,
    pub unit: ScaleUnit,
}

impl FromStr for PixelScale {
    type Err = WscleanError;

    fn from_str(s: &str) -> Result<PixelScale, WscleanError> {
        let s = s.trim();
        for unit in ScaleUnit::iter() {
            let unit_str: &'static str = unit.into();
            let len = s.len();
            if len < unit_str.len() || !s.is_char_boundary(len - unit_str.len()) {
                continue;
            }
            let (number, suffix) = s.split_at(len - unit_str.len());
            if !suffix.eq_ignore_ascii_case(unit_str) {
                continue;
            }
            let value: f64 = number
                .trim()
                .parse()
                .map_err(|_| WscleanError::BadScaleNumber {
                    input: s.to_string(),
                    unit: unit_str,
                })?;
            return Ok(PixelScale { value, unit });
        }

        Err(WscleanError::BadScale(s.to_string()))
    }
}

impl Display for PixelScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit: &'static str = self.unit.into();
        write!(f, "{}{unit}", self.value)
    }
}

/// Every setting the wrapper knows about. Anything not listed here can't be
/// passed to wsclean.
#[derive(Debug, Clone, PartialEq)]
pub struct WscleanConfig {
    /// Image width and height \[pixels\].
    pub size: [u32; 2],

    pub scale: PixelScale,

    /// The Briggs robust parameter.
    pub weight_briggs: f64,

    /// The number of clean iterations. 0 means don't clean.
    pub niter: u32,

    /// The major-cycle gain.
    pub mgain: f64,

    /// The data column to image. When unset, wsclean picks CORRECTED_DATA if
    /// the measurement set has it and DATA otherwise.
    pub data_column: Option<String>,

    /// The prefix of wsclean's output files.
    pub name: String,

    pub multiscale: bool,

    pub local_rms: bool,

    pub no_update_model: bool,

    pub no_negative: bool,

    pub quiet: bool,

    pub auto_mask: Option<f64>,

    pub auto_threshold: Option<f64>,

    pub intervals_out: Option<u32>,

    /// Spectral windows to image.
    pub spws: Option<Vec1<u32>>,

    /// Polarisation(s) to image, e.g. "xx" or "I".
    pub pol: Option<String>,
}

impl Default for WscleanConfig {
    fn default() -> Self {
        WscleanConfig {
            size: [1024, 1024],
            scale: PixelScale {
                value: 2.5,
                unit: ScaleUnit::Asec,
            },
            weight_briggs: 0.0,
            niter: 0,
            mgain: 1.0,
            data_column: None,
            name: "wsclean".to_string(),
            multiscale: false,
            local_rms: false,
            no_update_model: false,
            no_negative: false,
            quiet: false,
            auto_mask: None,
            auto_threshold: None,
            intervals_out: None,
            spws: None,
            pol: None,
        }
    }
}

impl WscleanConfig {
    /// Check that every setting makes sense.
    pub fn validate(&self) -> Result<(), WscleanError> {
        fn invalid<T: std::fmt::Debug>(
            setting: &'static str,
            value: T,
            reason: &'static str,
        ) -> Result<(), WscleanError> {
            Err(WscleanError::InvalidSetting {
                setting,
                value: format!("{value:?}"),
                reason,
            })
        }

        if self.size.contains(&0) {
            return invalid("size", self.size, "must be positive");
        }
        if !(self.scale.value.is_finite() && self.scale.value > 0.0) {
            return invalid("scale", self.scale.value, "must be positive");
        }
        if !(-2.0..=2.0).contains(&self.weight_briggs) {
            return invalid("weight_briggs", self.weight_briggs, "must be between -2 and 2");
        }
        if !(self.mgain > 0.0 && self.mgain <= 1.0) {
            return invalid("mgain", self.mgain, "must be in (0, 1]");
        }
        if let Some(auto_mask) = self.auto_mask {
            if !(auto_mask.is_finite() && auto_mask > 0.0) {
                return invalid("auto_mask", auto_mask, "must be positive");
            }
        }
        if let Some(auto_threshold) = self.auto_threshold {
            if !(auto_threshold.is_finite() && auto_threshold > 0.0) {
                return invalid("auto_threshold", auto_threshold, "must be positive");
            }
        }
        if self.intervals_out == Some(0) {
            return invalid("intervals_out", 0, "must be positive");
        }
        if self.name.trim().is_empty() {
            return invalid("name", &self.name, "must not be empty");
        }
        for (setting, value) in [("data_column", &self.data_column), ("pol", &self.pol)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return invalid(setting, value, "must not be empty");
                }
            }
        }

        Ok(())
    }

    /// The wsclean arguments for imaging `vis`, excluding the executable.
    pub fn build_args(&self, vis: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-size".into(),
            self.size[0].to_string(),
            self.size[1].to_string(),
            "-scale".into(),
            self.scale.to_string(),
            "-weight".into(),
            "briggs".into(),
            format!("{:?}", self.weight_briggs),
        ];

        if let Some(data_column) = &self.data_column {
            args.extend(["-data-column".into(), data_column.clone()]);
        }

        if self.niter > 0 {
            args.extend(["-niter".into(), self.niter.to_string()]);
        }
        if self.multiscale {
            args.push("-multiscale".into());
        }
        if self.mgain != 1.0 {
            args.extend(["-mgain".into(), format!("{:?}", self.mgain)]);
        }
        if let Some(pol) = &self.pol {
            args.extend(["-pol".into(), pol.clone()]);
        }
        if let Some(auto_mask) = self.auto_mask {
            args.extend(["-auto-mask".into(), format!("{auto_mask:?}")]);
        }
        if let Some(auto_threshold) = self.auto_threshold {
            args.extend(["-auto-threshold".into(), format!("{auto_threshold:?}")]);
        }
        if self.local_rms {
            args.push("-local-rms".into());
        }
        if self.no_update_model {
            args.push("-no-update-model-required".into());
        }
        if self.no_negative {
            args.push("-no-negative".into());
        }
        if let Some(intervals_out) = self.intervals_out {
            args.extend(["-intervals-out".into(), intervals_out.to_string()]);
        }
        if self.quiet {
            args.push("-quiet".into());
        }
        if let Some(spws) = &self.spws {
            args.extend(["-spws".into(), spws.iter().join(",")]);
        }

        args.extend(["-name".into(), self.name.clone(), vis.to_string()]);
        args
    }
}

/// A wsclean invocation on a measurement set.
#[derive(Debug, Clone)]
pub struct Wsclean {
    pub vis: PathBuf,

    pub config: WscleanConfig,

    /// The program to run; "wsclean" unless told otherwise.
    pub executable: String,
}

impl Wsclean {
    pub fn new<P: Into<PathBuf>>(vis: P) -> Wsclean {
        Wsclean {
            vis: vis.into(),
            config: WscleanConfig::default(),
            executable: "wsclean".to_string(),
        }
    }

    pub fn with_config(self, config: WscleanConfig) -> Wsclean {
        Wsclean { config, ..self }
    }

    pub fn args(&self) -> Vec<String> {
        self.config.build_args(&self.vis.display().to_string())
    }

    /// The full command line, as it would be typed into a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.clone())
            .chain(self.args())
            .join(" ")
    }

    /// Run wsclean and return its exit code. Nothing is run if `dry_run` is
    /// set; the command is only logged.
    pub fn run(&self, dry_run: bool) -> Result<i32, WscleanError> {
        self.config.validate()?;
        let command_line = self.command_line();
        if dry_run {
            info!("Would run: {command_line}");
            return Ok(0);
        }

        info!("Running: {command_line}");
        let status = Command::new(&self.executable)
            .args(self.args())
            .status()
            .map_err(|err| WscleanError::Spawn {
                executable: self.executable.clone(),
                err,
            })?;
        status.code().ok_or_else(|| WscleanError::Killed {
            executable: self.executable.clone(),
        })
    }
}
