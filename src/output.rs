//! The module responsible for writing output data to disk.
use crate::solution::{DispatchOutcome, DispatchSolution};
use crate::units::{Power, UnitType};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "dispatch_results";

/// The output file name for the dispatch schedule
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for the run summary
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// Get the default output directory for the model at the specified path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// # Arguments
///
/// * `output_dir` - The folder to create
/// * `allow_overwrite` - Whether an existing, non-empty folder may be overwritten
///
/// # Returns
///
/// `true` if an existing, non-empty folder will be overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to overwrite it."
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// Represents the single row of the summary CSV file
#[derive(Serialize, Debug, PartialEq)]
struct SummaryRow {
    feasible: bool,
    objective: f64,
    time_step: f64,
    n_steps: usize,
    curtailed_energy: f64,
    unserved_energy: f64,
}

impl SummaryRow {
    fn new(outcome: &DispatchOutcome) -> Self {
        let (time_step, n_steps, curtailed_energy, unserved_energy) = match &outcome.solution {
            Some(solution) => {
                let dt = solution.time_step;
                let energy = |series: &[Power]| {
                    series.iter().map(|&power| (power.abs() * dt).value()).sum::<f64>()
                };
                (
                    dt.value(),
                    solution.n_steps(),
                    energy(&solution.curtailment),
                    energy(&solution.load_loss),
                )
            }
            None => (0.0, 0, 0.0, 0.0),
        };

        Self {
            feasible: outcome.feasible(),
            objective: outcome.objective,
            time_step,
            n_steps,
            curtailed_energy,
            unserved_energy,
        }
    }
}

/// Write the dispatch schedule as one row per time step and one column per series
fn write_dispatch(file_path: &Path, solution: &DispatchSolution) -> Result<()> {
    let columns = solution.iter_columns().collect_vec();
    let mut writer = csv::Writer::from_path(file_path)?;

    writer.write_record(
        std::iter::once("step").chain(columns.iter().map(|(name, _)| name.as_str())),
    )?;
    for step in 0..solution.n_steps() {
        writer.write_record(
            std::iter::once(step.to_string())
                .chain(columns.iter().map(|(_, values)| values[step].to_string())),
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the outcome of a dispatch run to the output folder.
///
/// The summary is always written; the schedule only if the run was feasible.
pub fn write_outcome(output_path: &Path, outcome: &DispatchOutcome) -> Result<()> {
    let file_path = output_path.join(SUMMARY_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)?;
    writer.serialize(SummaryRow::new(outcome))?;
    writer.flush()?;

    if let Some(solution) = &outcome.solution {
        let file_path = output_path.join(DISPATCH_FILE_NAME);
        write_dispatch(&file_path, solution)
            .with_context(|| format!("Failed to write {}", file_path.display()))?;
    }

    Ok(())
}
