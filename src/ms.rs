//! Time queries on CASA measurement sets.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use hifitime::{Epoch, TimeUnits};
use log::{debug, trace};
use marlu::rubbl_casatables;
use rubbl_casatables::{Table, TableOpenMode};
use thiserror::Error;
use vec1::Vec1;

#[derive(Error, Debug)]
pub enum MsError {
    #[error("Supplied file path {0} does not exist or is not readable!")]
    BadFile(PathBuf),

    #[error("The {table} table of {ms} contains no rows!")]
    TableEmpty { table: &'static str, ms: PathBuf },

    #[error("The TIME_RANGE of {ms} has {len} elements; expected 2")]
    BadTimeRange { ms: PathBuf, len: usize },

    #[error("No times for field 0 were in {0}")]
    NoTimesteps(PathBuf),

    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),
}

/// Open a measurement set table read only. If `table` is `None`, then open the
/// base table.
fn read_table(ms: &Path, table: Option<&str>) -> Result<Table, MsError> {
    if !ms.exists() {
        return Err(MsError::BadFile(ms.to_path_buf()));
    }
    let t = Table::open(
        format!("{}/{}", ms.display(), table.unwrap_or("")),
        TableOpenMode::Read,
    )?;
    Ok(t)
}

/// casacore stores times as UTC seconds since the MJD epoch.
pub fn casacore_time_to_epoch(utc_time: f64) -> Epoch {
    let e = Epoch::from_utc_seconds(utc_time - hifitime::J1900_OFFSET * hifitime::SECONDS_PER_DAY);
    // The values can be slightly off of their intended values; round them to
    // the nearest hundredth of a second.
    e.round(10.milliseconds())
}

/// The start and end of the first observation in a measurement set.
pub fn ms_time_range(ms: &Path) -> Result<(Epoch, Epoch), MsError> {
    let mut observation_table = read_table(ms, Some("OBSERVATION"))?;
    if observation_table.n_rows() == 0 {
        return Err(MsError::TableEmpty {
            table: "OBSERVATION",
            ms: ms.to_path_buf(),
        });
    }
    let time_range: Vec<f64> = observation_table.get_cell_as_vec("TIME_RANGE", 0)?;
    match time_range.as_slice() {
        [begin, end] => {
            let (begin, end) = (casacore_time_to_epoch(*begin), casacore_time_to_epoch(*end));
            debug!("{}: observation 0 runs from {begin} to {end}", ms.display());
            Ok((begin, end))
        }
        _ => Err(MsError::BadTimeRange {
            ms: ms.to_path_buf(),
            len: time_range.len(),
        }),
    }
}

/// The middle of the first observation in a measurement set.
pub fn ms_midpoint(ms: &Path) -> Result<Epoch, MsError> {
    let (begin, end) = ms_time_range(ms)?;
    Ok(begin + (end - begin) / 2)
}

/// The unique times of field 0 in a measurement set, in the order they first
/// appear.
pub fn ms_timestamps(ms: &Path) -> Result<Vec1<Epoch>, MsError> {
    let mut main_table = read_table(ms, None)?;
    if main_table.n_rows() == 0 {
        return Err(MsError::TableEmpty {
            table: "main",
            ms: ms.to_path_buf(),
        });
    }

    let utc_times: Vec<f64> = main_table.get_col_as_vec("TIME")?;
    let field_ids: Vec<i32> = main_table.get_col_as_vec("FIELD_ID")?;
    let mut utc_time_set: BTreeSet<u64> = BTreeSet::new();
    let mut timestamps = vec![];
    for (utc_time, _) in utc_times
        .into_iter()
        .zip(field_ids)
        .filter(|(_, field_id)| *field_id == 0)
    {
        if utc_time_set.insert(utc_time.to_bits()) {
            timestamps.push(casacore_time_to_epoch(utc_time));
        }
    }
    trace!("{} unique timestamps in {}", timestamps.len(), ms.display());

    Vec1::try_from_vec(timestamps).map_err(|_| MsError::NoTimesteps(ms.to_path_buf()))
}
