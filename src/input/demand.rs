//! Code for reading the demand series from `demand.csv`.
use super::{input_err_msg, read_csv};
use crate::demand::DemandSeries;
use crate::units::{PowerUnit, Time};
use anyhow::{Context, Result, ensure};
use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;
use log::warn;
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";

/// The format of timestamps in the demand file
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Represents a row of the demand file
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct DemandRow {
    /// When the time step starts (optional)
    #[serde(default)]
    timestamp: Option<String>,
    /// Demand during the time step
    demand: f64,
}

/// Read the demand series from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `unit` - The unit demand is given in
/// * `time_step` - The length of each time step. If `None`, it is inferred from the timestamps.
pub fn read_demand(model_dir: &Path, unit: PowerUnit, time_step: Option<Time>) -> Result<DemandSeries> {
    let file_path = model_dir.join(DEMAND_FILE_NAME);
    let iter = read_csv::<DemandRow>(&file_path)?;
    read_demand_from_iter(iter, unit, time_step).with_context(|| input_err_msg(&file_path))
}

fn read_demand_from_iter<I>(iter: I, unit: PowerUnit, time_step: Option<Time>) -> Result<DemandSeries>
where
    I: Iterator<Item = DemandRow>,
{
    let rows = iter.collect_vec();
    let time_step = match time_step {
        Some(time_step) => time_step,
        None => infer_time_step(&rows)?,
    };
    let values = rows.iter().map(|row| row.demand).collect_vec();

    DemandSeries::new(&values, unit, time_step)
}

/// Infer the length of a time step from evenly spaced timestamps.
///
/// Falls back to one hour (with a warning) if there are too few timestamps.
fn infer_time_step(rows: &[DemandRow]) -> Result<Time> {
    let timestamps: Option<Vec<&str>> = rows.iter().map(|row| row.timestamp.as_deref()).collect();
    let Some(timestamps) = timestamps.filter(|timestamps| timestamps.len() > 1) else {
        warn!("Could not infer time step from demand data. Defaulting to 1 hour.");
        return Ok(Time(1.0));
    };

    let times: Vec<NaiveDateTime> = timestamps
        .iter()
        .map(|s| {
            NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
                .with_context(|| format!("Invalid timestamp: {s}"))
        })
        .try_collect()?;
    let deltas = times
        .iter()
        .tuple_windows()
        .map(|(a, b)| *b - *a)
        .collect_vec();
    ensure!(
        deltas.iter().all_equal(),
        "Timestamps must be evenly spaced"
    );
    ensure!(deltas[0] > TimeDelta::zero(), "Timestamps must be increasing");

    Ok(Time(deltas[0].num_seconds() as f64 / 3600.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::units::Power;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn row(timestamp: Option<&str>, demand: f64) -> DemandRow {
        DemandRow {
            timestamp: timestamp.map(String::from),
            demand,
        }
    }

    #[test]
    fn test_infer_time_step() {
        let rows = [
            row(Some("2024-01-01 00:00:00"), 1.0),
            row(Some("2024-01-01 00:30:00"), 1.0),
            row(Some("2024-01-01 01:00:00"), 1.0),
        ];
        assert_eq!(infer_time_step(&rows).unwrap(), Time(0.5));

        // No timestamps
        assert_eq!(infer_time_step(&[row(None, 1.0)]).unwrap(), Time(1.0));
    }

    #[test]
    fn test_infer_time_step_uneven() {
        let rows = [
            row(Some("2024-01-01 00:00:00"), 1.0),
            row(Some("2024-01-01 01:00:00"), 1.0),
            row(Some("2024-01-01 03:00:00"), 1.0),
        ];
        assert_error!(infer_time_step(&rows), "Timestamps must be evenly spaced");

        let rows = [
            row(Some("2024-01-01 01:00:00"), 1.0),
            row(Some("2024-01-01 00:00:00"), 1.0),
        ];
        assert_error!(infer_time_step(&rows), "Timestamps must be increasing");
    }

    #[test]
    fn test_read_demand() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(DEMAND_FILE_NAME)).unwrap();
            writeln!(
                file,
                "timestamp,demand\n2024-01-01 00:00:00,1.5\n2024-01-02 00:00:00,2"
            )
            .unwrap();
        }

        let demand = read_demand(dir.path(), PowerUnit::Gigawatt, None).unwrap();
        assert_eq!(demand.values(), [Power(1500.0), Power(2000.0)]);
        assert_eq!(demand.time_step(), Time(24.0));

        // An explicit time step takes precedence
        let demand = read_demand(dir.path(), PowerUnit::Megawatt, Some(Time(2.0))).unwrap();
        assert_eq!(demand.time_step(), Time(2.0));
    }

    #[test]
    fn test_read_demand_without_timestamps() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(DEMAND_FILE_NAME)).unwrap();
            writeln!(file, "demand\n1\n2\n3").unwrap();
        }

        let demand = read_demand(dir.path(), PowerUnit::Megawatt, None).unwrap();
        assert_eq!(demand.len(), 3);
        assert_eq!(demand.time_step(), Time(1.0));
    }
}
