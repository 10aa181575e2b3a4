//! Code for dispatch models read from a model directory.
use crate::demand::DemandSeries;
use crate::dispatch::DispatchRun;
use crate::resource::Resource;
use crate::solution::DispatchOutcome;
use anyhow::Result;
use log::info;

pub mod parameters;
use parameters::ModelParameters;

/// Model definition
pub struct Model {
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Resources to dispatch, in file order
    pub resources: Vec<Resource>,
    /// The demand to be met
    pub demand: DemandSeries,
}

impl Model {
    /// Dispatch the model's resources against its demand using the configured options
    pub fn run(&self) -> Result<DispatchOutcome> {
        info!(
            "Dispatching {} resources against {} MWh of demand over {} time steps",
            self.resources.len(),
            self.demand.total_energy(),
            self.demand.len()
        );
        DispatchRun::new(&self.resources, &self.demand)
            .with_options(self.parameters.dispatch.clone())
            .run()
    }
}
