//! Defines [`DispatchOptions`], which configures a dispatch run. These are read from the
//! `[dispatch]` table of `model.toml` or constructed directly by library users.
use crate::resource::Resource;
use crate::units::{Dimensionless, MoneyPerEnergy, Power, UnitType};
use anyhow::{Result, ensure};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_lower_bound, Power, 0.0);
define_unit_param_default!(default_oversupply, Dimensionless, 0.0);
define_unit_param_default!(default_undersupply, Dimensionless, 0.0);
define_unit_param_default!(default_penalty, MoneyPerEnergy, 1e-4);
define_param_default!(default_curtailment, bool, true);

/// The minimum cost assigned to load loss when it is derived from the resources' costs
const MIN_LOAD_LOSS_COST: MoneyPerEnergy = MoneyPerEnergy(1.0);

/// How many times the highest real variable cost load loss costs by default
const LOAD_LOSS_COST_FACTOR: f64 = 10.0;

/// The strategy used to dispatch resources
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStrategy {
    /// Formulate and solve a linear program
    #[default]
    #[string = "optimal"]
    Optimal,
    /// Commit resources greedily in merit order
    #[string = "heuristic"]
    Heuristic,
}

/// The linear-programming engine used by the optimal strategy
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    /// The HiGHS solver
    #[default]
    #[string = "highs"]
    Highs,
}

/// Options controlling a dispatch run
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DispatchOptions {
    /// Whether to use the optimal or the heuristic solver
    #[serde(default)]
    pub strategy: DispatchStrategy,
    /// The linear-programming engine (optimal strategy only)
    #[serde(default)]
    pub solver: SolverBackend,
    /// Minimum output of every non-storage resource (optimal strategy only)
    #[serde(default = "default_lower_bound")]
    pub lower_bound: Power,
    /// Allowed oversupply as a fraction of demand
    #[serde(default = "default_oversupply")]
    pub oversupply: Dimensionless,
    /// Allowed undersupply as a fraction of demand
    #[serde(default = "default_undersupply")]
    pub undersupply: Dimensionless,
    /// Whether excess generation may be curtailed
    #[serde(default = "default_curtailment")]
    pub curtailment: bool,
    /// Whether demand may go unmet
    #[serde(default)]
    pub allow_blackout: bool,
    /// Cost applied to storage throughput, to stop storage charging and discharging at once
    #[serde(default = "default_penalty")]
    pub penalty: MoneyPerEnergy,
    /// Cost of unmet demand.
    ///
    /// Defaults to ten times the highest variable cost of any resource (and at least 1).
    #[serde(default)]
    pub load_loss_cost: Option<MoneyPerEnergy>,
    /// Time limit for the LP solver in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,
    /// Whether to report solver progress at info level rather than debug
    #[serde(default)]
    pub solver_verbose: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            strategy: DispatchStrategy::default(),
            solver: SolverBackend::default(),
            lower_bound: default_lower_bound(),
            oversupply: default_oversupply(),
            undersupply: default_undersupply(),
            curtailment: default_curtailment(),
            allow_blackout: false,
            penalty: default_penalty(),
            load_loss_cost: None,
            time_limit: None,
            solver_verbose: false,
        }
    }
}

/// Check that the `oversupply` and `undersupply` parameters are valid
fn check_tolerances(oversupply: Dimensionless, undersupply: Dimensionless) -> Result<()> {
    ensure!(
        oversupply.is_finite() && oversupply >= Dimensionless(0.0),
        "oversupply must be a finite, non-negative number"
    );
    ensure!(
        undersupply.is_finite()
            && undersupply >= Dimensionless(0.0)
            && undersupply <= Dimensionless(1.0),
        "undersupply must be between 0 and 1"
    );

    Ok(())
}

/// Check that the `penalty` parameter is valid
fn check_penalty(value: MoneyPerEnergy) -> Result<()> {
    ensure!(
        value.is_finite() && value >= MoneyPerEnergy(0.0),
        "penalty must be a finite, non-negative number"
    );

    Ok(())
}

/// Check that the `lower_bound` parameter is valid
fn check_lower_bound(value: Power) -> Result<()> {
    ensure!(
        value.is_finite() && value >= Power(0.0),
        "lower_bound must be a finite, non-negative number"
    );

    Ok(())
}

/// Check that the `time_limit` parameter is valid
fn check_time_limit(value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value > 0.0,
            "time_limit must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that the load-loss cost is higher than the variable cost of every real resource
pub fn check_load_loss_cost(value: MoneyPerEnergy, resources: &[Resource]) -> Result<()> {
    ensure!(
        value.is_finite(),
        "load_loss_cost must be a finite number"
    );
    for resource in resources {
        ensure!(
            value > resource.max_variable_cost(),
            "load_loss_cost ({value}) must exceed the variable cost of resource {} ({})",
            resource.id,
            resource.max_variable_cost()
        );
    }

    Ok(())
}

impl DispatchOptions {
    /// Options for the heuristic strategy, otherwise defaults
    pub fn heuristic() -> Self {
        Self {
            strategy: DispatchStrategy::Heuristic,
            ..Self::default()
        }
    }

    /// Validate the options independently of any resources
    pub fn validate(&self) -> Result<()> {
        check_tolerances(self.oversupply, self.undersupply)?;
        check_penalty(self.penalty)?;
        check_lower_bound(self.lower_bound)?;
        check_time_limit(self.time_limit)?;

        Ok(())
    }

    /// The cost of unmet demand for the given resources.
    ///
    /// Uses `load_loss_cost` if given, otherwise ten times the highest variable cost of any
    /// resource (and at least 1).
    pub fn load_loss_cost(&self, resources: &[Resource]) -> MoneyPerEnergy {
        self.load_loss_cost.unwrap_or_else(|| {
            resources
                .iter()
                .map(Resource::max_variable_cost)
                .fold(MIN_LOAD_LOSS_COST, |acc, cost| {
                    acc.max(cost * Dimensionless(LOAD_LOSS_COST_FACTOR))
                })
        })
    }
}
