//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{input_err_msg, read_toml};
use crate::options::DispatchOptions;
use crate::units::{PowerUnit, QuantityInput, Time, UnitSettings, UnitType, validate};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// Represents the contents of the entire model file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// The unit in which values in `demand.csv` are given
    #[serde(default)]
    pub demand_unit: PowerUnit,
    /// The length of each time step (hours if a bare number).
    ///
    /// If omitted, it is inferred from the timestamps in `demand.csv`.
    #[serde(default)]
    pub time_step: Option<QuantityInput>,
    /// Options for the dispatch run
    #[serde(default)]
    pub dispatch: DispatchOptions,
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// The length of each time step, if given explicitly
    pub fn time_step(&self) -> Result<Option<Time>> {
        let Some(input) = &self.time_step else {
            return Ok(None);
        };

        let time_step: Time =
            validate(input, &UnitSettings::default()).context("Invalid value for time_step")?;
        ensure!(
            time_step.is_finite() && time_step > Time(0.0),
            "time_step must be a finite number greater than zero"
        );

        Ok(Some(time_step))
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        self.time_step()?;
        self.dispatch.validate()?;

        Ok(())
    }
}
