use std::path::PathBuf;

use clap::{AppSettings, ArgGroup, Args, ErrorKind, Parser, Subcommand};
use log::{debug, info};
use vec1::Vec1;

use eovsa_synop::{
    ms::{ms_midpoint, ms_time_range, ms_timestamps},
    solar_diff_rot_fits, sunpy_fits_to_j2000,
    time::{format_utc_date, parse_utc_date},
    wsclean::{PixelScale, Wsclean, WscleanConfig, WscleanError},
    SolarSurfaceReprojector, SynopError,
};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
#[clap(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences), global = true)]
    verbosity: u8,

    /// Disable progress bars.
    #[clap(long, global = true)]
    no_progress_bars: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Differentially rotate a solar image so that its exposure midpoint is at
    /// a new time.
    DiffRot {
        /// The solar image to rotate.
        input: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,

        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Rotate a solar image by its negative position angle, so that its axes
    /// line up with celestial north and east.
    ToJ2000 {
        /// The solar image to rotate.
        input: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Image a measurement set with wsclean.
    Wsclean(WscleanArgs),

    /// Print the time range and the number of timestamps of a measurement set.
    MsTimes {
        /// The measurement set.
        ms: PathBuf,
    },
}

/// Exactly one of these says when to rotate to.
#[derive(Args)]
#[clap(group(ArgGroup::new("target").required(true).args(&["time", "ms"])))]
struct TargetArgs {
    /// The time to rotate to, e.g. 2024-12-15T20:00:00.
    #[clap(short, long)]
    time: Option<String>,

    /// Rotate to the middle of this measurement set's observation.
    #[clap(long)]
    ms: Option<PathBuf>,
}

#[derive(Args)]
struct OutputArgs {
    /// Where to write the new image.
    #[clap(short, long)]
    output: PathBuf,

    /// Use this file's header for the output instead of the input's.
    #[clap(long)]
    template: Option<PathBuf>,

    /// Replace the output file if it already exists.
    #[clap(long)]
    overwrite: bool,
}

#[derive(Args)]
struct WscleanArgs {
    /// The measurement set to image.
    vis: PathBuf,

    /// Image width and height [pixels]. A single value makes a square image.
    #[clap(long, multiple_values(true), max_values(2))]
    size: Option<Vec<u32>>,

    /// Pixel scale, e.g. 2.5asec. Units can be masec, asec, amin or deg.
    #[clap(long)]
    scale: Option<PixelScale>,

    /// The Briggs robust parameter.
    #[clap(long, allow_hyphen_values(true))]
    briggs: Option<f64>,

    /// The number of clean iterations.
    #[clap(long)]
    niter: Option<u32>,

    /// The major-cycle gain.
    #[clap(long)]
    mgain: Option<f64>,

    /// The data column to image.
    #[clap(long)]
    data_column: Option<String>,

    /// The prefix of wsclean's output files.
    #[clap(long)]
    name: Option<String>,

    #[clap(long)]
    multiscale: bool,

    #[clap(long)]
    auto_mask: Option<f64>,

    #[clap(long)]
    auto_threshold: Option<f64>,

    #[clap(long)]
    local_rms: bool,

    /// Don't write model data back to the measurement set.
    #[clap(long)]
    no_update_model: bool,

    #[clap(long)]
    intervals_out: Option<u32>,

    /// Spectral windows to image, e.g. 4,5,6.
    #[clap(long, use_value_delimiter(true), multiple_values(true))]
    spws: Option<Vec<u32>>,

    /// Polarisation(s) to image, e.g. xx.
    #[clap(long)]
    pol: Option<String>,

    #[clap(long)]
    no_negative: bool,

    #[clap(long)]
    quiet: bool,

    /// Print the wsclean command without running it.
    #[clap(long)]
    dry_run: bool,

    /// The wsclean executable to use.
    #[clap(long, default_value = "wsclean")]
    executable: String,
}

impl WscleanArgs {
    fn into_wsclean(self) -> Result<(Wsclean, bool), WscleanError> {
        let default = WscleanConfig::default();
        let size = match self.size.as_deref() {
            None => default.size,
            Some([s]) => [*s, *s],
            Some([w, h]) => [*w, *h],
            Some(other) => {
                return Err(WscleanError::InvalidSetting {
                    setting: "size",
                    value: format!("{other:?}"),
                    reason: "expected one or two values",
                })
            }
        };
        let spws = match self.spws {
            None => None,
            Some(spws) => Some(Vec1::try_from_vec(spws).map_err(|_| {
                WscleanError::InvalidSetting {
                    setting: "spws",
                    value: "[]".to_string(),
                    reason: "must not be empty",
                }
            })?),
        };
        let config = WscleanConfig {
            size,
            scale: self.scale.unwrap_or(default.scale),
            weight_briggs: self.briggs.unwrap_or(default.weight_briggs),
            niter: self.niter.unwrap_or(default.niter),
            mgain: self.mgain.unwrap_or(default.mgain),
            data_column: self.data_column,
            name: self.name.unwrap_or(default.name),
            multiscale: self.multiscale,
            local_rms: self.local_rms,
            no_update_model: self.no_update_model,
            no_negative: self.no_negative,
            quiet: self.quiet,
            auto_mask: self.auto_mask,
            auto_threshold: self.auto_threshold,
            intervals_out: self.intervals_out,
            spws,
            pol: self.pol,
        };
        let wsclean = Wsclean {
            executable: self.executable,
            ..Wsclean::new(self.vis).with_config(config)
        };
        Ok((wsclean, self.dry_run))
    }
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32, SynopError> {
    match cli.command {
        Command::DiffRot {
            input,
            output,
            target,
        } => {
            let target = match (target.time, target.ms) {
                (Some(time), None) => parse_utc_date(&time)?,
                (None, Some(ms)) => {
                    let midpoint = ms_midpoint(&ms)?;
                    info!(
                        "Using the middle of {}: {}",
                        ms.display(),
                        format_utc_date(midpoint)
                    );
                    midpoint
                }
                _ => clap::Error::raw(
                    ErrorKind::ArgumentConflict,
                    "Exactly one of --time and --ms is required\n",
                )
                .exit(),
            };
            debug!("Target time: {}", format_utc_date(target));
            let reprojector = SolarSurfaceReprojector::new(!cli.no_progress_bars);
            solar_diff_rot_fits(
                &input,
                target,
                &output.output,
                output.template.as_deref(),
                output.overwrite,
                &reprojector,
            )?;
            Ok(0)
        }

        Command::ToJ2000 { input, output } => {
            sunpy_fits_to_j2000(
                &input,
                &output.output,
                output.template.as_deref(),
                output.overwrite,
            )?;
            Ok(0)
        }

        Command::Wsclean(args) => {
            let (wsclean, dry_run) = args.into_wsclean()?;
            Ok(wsclean.run(dry_run)?)
        }

        Command::MsTimes { ms } => {
            let (begin, end) = ms_time_range(&ms)?;
            let timestamps = ms_timestamps(&ms)?;
            println!("Begin: {}", format_utc_date(begin));
            println!("End:   {}", format_utc_date(end));
            println!("Number of timestamps: {}", timestamps.len());
            Ok(0)
        }
    }
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();
}
