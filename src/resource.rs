//! Resources are the generation and storage assets which are dispatched to meet demand. The data
//! structures in this module describe their physical limits and costs.
//!
//! Capabilities are represented by composition: a resource optionally carries a [`Ramping`] record
//! (limits on how fast its output may change) and/or a [`Storage`] record (an energy reservoir).
//! Solvers branch on the presence of these records rather than on the resource's category.
use crate::id::ResourceID;
use crate::units::{
    Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, PerTime, Power, Time, UnitType,
};
use anyhow::{Result, ensure};
use serde_string_enum::DeserializeLabeledStringEnum;

pub mod state;

/// The role a resource plays in the power system
#[derive(PartialEq, Eq, Default, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
pub enum ResourceCategory {
    /// Generates power
    #[default]
    #[string = "production"]
    Production,
    /// Stores energy and returns it later
    #[string = "storage"]
    Storage,
    /// Absorbs excess generation (synthetic, added by the engine)
    #[string = "curtailment"]
    Curtailment,
    /// Absorbs unmet demand (synthetic, added by the engine)
    #[string = "load_loss"]
    LoadLoss,
}

/// A cost per unit energy, either constant or varying with time step
#[derive(Debug, Clone, PartialEq)]
pub enum VariableCost {
    /// The same cost for every time step
    Scalar(MoneyPerEnergy),
    /// One cost per time step
    Series(Vec<MoneyPerEnergy>),
}

impl Default for VariableCost {
    fn default() -> Self {
        Self::Scalar(MoneyPerEnergy(0.0))
    }
}

impl From<f64> for VariableCost {
    fn from(value: f64) -> Self {
        Self::Scalar(MoneyPerEnergy(value))
    }
}

impl From<Vec<f64>> for VariableCost {
    fn from(values: Vec<f64>) -> Self {
        Self::Series(values.into_iter().map(MoneyPerEnergy).collect())
    }
}

impl VariableCost {
    /// The cost at the given time step.
    ///
    /// # Panics
    ///
    /// If the cost is a series which is shorter than `step`.
    pub fn at(&self, step: usize) -> MoneyPerEnergy {
        match self {
            Self::Scalar(cost) => *cost,
            Self::Series(costs) => costs[step],
        }
    }

    /// The number of time steps covered, if this is a series
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Series(costs) => Some(costs.len()),
        }
    }

    /// The mean cost over all time steps
    pub fn mean(&self) -> MoneyPerEnergy {
        match self {
            Self::Scalar(cost) => *cost,
            Self::Series(costs) if costs.is_empty() => MoneyPerEnergy(0.0),
            Self::Series(costs) => {
                costs.iter().copied().sum::<MoneyPerEnergy>() / Dimensionless(costs.len() as f64)
            }
        }
    }

    /// The highest cost over all time steps
    pub fn max(&self) -> MoneyPerEnergy {
        match self {
            Self::Scalar(cost) => *cost,
            Self::Series(costs) => costs
                .iter()
                .copied()
                .reduce(MoneyPerEnergy::max)
                .unwrap_or_default(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = MoneyPerEnergy> + '_ {
        let (scalar, series) = match self {
            Self::Scalar(cost) => (Some(*cost), &[][..]),
            Self::Series(costs) => (None, costs.as_slice()),
        };
        scalar.into_iter().chain(series.iter().copied())
    }
}

/// Limits on how quickly a resource's output may change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramping {
    /// Maximum increase in output per unit time, as a fraction of capacity
    pub ramp_up: PerTime,
    /// Maximum decrease in output per unit time, as a fraction of capacity
    pub ramp_down: PerTime,
}

/// The energy reservoir of a storage resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Storage {
    /// How long the resource can discharge at full power
    pub duration: Time,
    /// Round-trip efficiency, in (0, 1]
    pub efficiency: Dimensionless,
    /// Stored energy at the start of a run
    pub initial_state_of_charge: Energy,
}

/// A generation or storage asset
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// A unique identifier for the resource (e.g. "natural_gas")
    pub id: ResourceID,
    /// The role of the resource
    pub category: ResourceCategory,
    /// Whether the resource's output can be controlled.
    ///
    /// Descriptive only: neither solver reads it, so a non-dispatchable resource is dispatched
    /// like any other, anywhere between zero and its capacity.
    pub dispatchable: bool,
    /// Whether the resource is powered by a renewable source (descriptive only)
    pub renewable: bool,
    /// Maximum power output
    pub capacity: Power,
    /// Fuel cost per unit energy produced
    pub fuel_cost: VariableCost,
    /// Variable operating and maintenance cost per unit energy produced
    pub om_cost_variable: VariableCost,
    /// Fixed operating and maintenance cost per unit capacity (not used for dispatch)
    pub om_cost_fixed: MoneyPerPower,
    /// Overnight capital cost per unit capacity (not used for dispatch)
    pub capital_cost: MoneyPerPower,
    /// Ramp limits, if the resource has any
    pub ramping: Option<Ramping>,
    /// The resource's energy reservoir, if it is a storage resource
    pub storage: Option<Storage>,
}

impl Resource {
    /// Create a new dispatchable production resource with zero costs
    pub fn new(id: &str, capacity: Power) -> Self {
        Self {
            id: id.into(),
            category: ResourceCategory::Production,
            dispatchable: true,
            renewable: false,
            capacity,
            fuel_cost: VariableCost::default(),
            om_cost_variable: VariableCost::default(),
            om_cost_fixed: MoneyPerPower(0.0),
            capital_cost: MoneyPerPower(0.0),
            ramping: None,
            storage: None,
        }
    }

    /// Set the fuel cost
    pub fn with_fuel_cost(mut self, cost: impl Into<VariableCost>) -> Self {
        self.fuel_cost = cost.into();
        self
    }

    /// Set the variable operating and maintenance cost
    pub fn with_om_cost_variable(mut self, cost: impl Into<VariableCost>) -> Self {
        self.om_cost_variable = cost.into();
        self
    }

    /// Set the fixed operating and maintenance cost
    pub fn with_om_cost_fixed(mut self, cost: MoneyPerPower) -> Self {
        self.om_cost_fixed = cost;
        self
    }

    /// Set the capital cost
    pub fn with_capital_cost(mut self, cost: MoneyPerPower) -> Self {
        self.capital_cost = cost;
        self
    }

    /// Limit how quickly the resource's output may change
    pub fn with_ramping(mut self, ramp_up: PerTime, ramp_down: PerTime) -> Self {
        self.ramping = Some(Ramping { ramp_up, ramp_down });
        self
    }

    /// Turn the resource into a storage resource
    pub fn with_storage(
        mut self,
        duration: Time,
        efficiency: Dimensionless,
        initial_state_of_charge: Energy,
    ) -> Self {
        self.category = ResourceCategory::Storage;
        self.storage = Some(Storage {
            duration,
            efficiency,
            initial_state_of_charge,
        });
        self
    }

    /// Mark the resource as renewable and non-dispatchable
    pub fn renewable(mut self) -> Self {
        self.renewable = true;
        self.dispatchable = false;
        self
    }

    /// Total variable cost (fuel plus variable O&M) at the given time step
    pub fn variable_cost(&self, step: usize) -> MoneyPerEnergy {
        self.fuel_cost.at(step) + self.om_cost_variable.at(step)
    }

    /// Mean total variable cost over all time steps
    pub fn mean_variable_cost(&self) -> MoneyPerEnergy {
        self.fuel_cost.mean() + self.om_cost_variable.mean()
    }

    /// Highest total variable cost over all time steps
    pub fn max_variable_cost(&self) -> MoneyPerEnergy {
        self.fuel_cost.max() + self.om_cost_variable.max()
    }

    /// Maximum increase in output per unit time, as a fraction of capacity
    pub fn ramp_up(&self) -> Option<PerTime> {
        self.ramping.map(|r| r.ramp_up)
    }

    /// Maximum decrease in output per unit time, as a fraction of capacity
    pub fn ramp_down(&self) -> Option<PerTime> {
        self.ramping.map(|r| r.ramp_down)
    }

    /// Energy capacity of the storage reservoir
    pub fn storage_capacity(&self) -> Option<Energy> {
        self.storage.map(|s| self.capacity * s.duration)
    }

    /// Stored energy at the start of a run (zero for non-storage resources)
    pub fn initial_state_of_charge(&self) -> Energy {
        self.storage
            .map_or(Energy(0.0), |s| s.initial_state_of_charge)
    }

    /// Round-trip efficiency (1 for non-storage resources)
    pub fn efficiency(&self) -> Dimensionless {
        self.storage.map_or(Dimensionless(1.0), |s| s.efficiency)
    }

    /// Whether the resource has a storage reservoir
    pub fn is_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Check that the resource is physically consistent.
    ///
    /// # Arguments
    ///
    /// * `n_steps` - The number of time steps in the run, against which cost series are checked
    pub fn validate(&self, n_steps: usize) -> Result<()> {
        ensure!(
            !matches!(
                self.category,
                ResourceCategory::Curtailment | ResourceCategory::LoadLoss
            ),
            "Resource {}: category {:?} is reserved for the dispatch engine",
            self.id,
            self.category
        );
        ensure!(
            self.capacity.is_finite() && self.capacity >= Power(0.0),
            "Resource {}: capacity must be a finite, non-negative number",
            self.id
        );

        for (name, cost) in [
            ("fuel_cost", &self.fuel_cost),
            ("om_cost_variable", &self.om_cost_variable),
        ] {
            ensure!(
                cost.iter().all(|c| c.is_finite()),
                "Resource {}: {name} must be finite",
                self.id
            );
            if let Some(len) = cost.len() {
                ensure!(
                    len == n_steps,
                    "Resource {}: {name} has {len} values but there are {n_steps} time steps",
                    self.id
                );
            }
        }

        if let Some(ramping) = self.ramping {
            ensure!(
                ramping.ramp_up.is_finite() && ramping.ramp_up >= PerTime(0.0),
                "Resource {}: ramp_up must be a finite, non-negative number",
                self.id
            );
            ensure!(
                ramping.ramp_down.is_finite() && ramping.ramp_down >= PerTime(0.0),
                "Resource {}: ramp_down must be a finite, non-negative number",
                self.id
            );
        }

        ensure!(
            (self.category == ResourceCategory::Storage) == self.storage.is_some(),
            "Resource {}: only storage resources may (and must) have a storage reservoir",
            self.id
        );
        if let Some(storage) = self.storage {
            ensure!(
                self.ramping.is_none(),
                "Resource {}: storage resources cannot be ramp-limited",
                self.id
            );
            ensure!(
                storage.duration.is_finite() && storage.duration >= Time(0.0),
                "Resource {}: storage duration must be a finite, non-negative number",
                self.id
            );
            ensure!(
                storage.efficiency > Dimensionless(0.0) && storage.efficiency <= Dimensionless(1.0),
                "Resource {}: efficiency must be in the range (0, 1]",
                self.id
            );

            let storage_capacity = self.capacity * storage.duration;
            ensure!(
                storage.initial_state_of_charge >= Energy(0.0)
                    && storage.initial_state_of_charge <= storage_capacity,
                "Resource {}: initial state of charge ({}) must be between 0 and the storage \
                capacity ({storage_capacity})",
                self.id,
                storage.initial_state_of_charge
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, battery, gas_plant};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_variable_cost() {
        let resource = Resource::new("gas", Power(100.0))
            .with_fuel_cost(vec![10.0, 20.0, 30.0])
            .with_om_cost_variable(5.0);
        assert_eq!(resource.variable_cost(1), MoneyPerEnergy(25.0));
        assert_approx_eq!(f64, resource.mean_variable_cost().value(), 25.0);
        assert_eq!(resource.max_variable_cost(), MoneyPerEnergy(35.0));
    }

    #[rstest]
    fn test_storage_capacity(battery: Resource, gas_plant: Resource) {
        assert_eq!(battery.storage_capacity(), Some(Energy(40.0)));
        assert_eq!(battery.efficiency(), Dimensionless(0.81));
        assert_eq!(gas_plant.storage_capacity(), None);
        assert_eq!(gas_plant.efficiency(), Dimensionless(1.0));
        assert_eq!(gas_plant.initial_state_of_charge(), Energy(0.0));
    }

    #[rstest]
    fn test_validate_ok(battery: Resource, gas_plant: Resource) {
        assert!(battery.validate(24).is_ok());
        assert!(gas_plant.validate(24).is_ok());
    }

    #[test]
    fn test_validate_bad_capacity() {
        let resource = Resource::new("gas", Power(-1.0));
        assert_error!(
            resource.validate(1),
            "Resource gas: capacity must be a finite, non-negative number"
        );
    }

    #[test]
    fn test_validate_bad_series_length() {
        let resource = Resource::new("gas", Power(1.0)).with_fuel_cost(vec![1.0, 2.0]);
        assert_error!(
            resource.validate(3),
            "Resource gas: fuel_cost has 2 values but there are 3 time steps"
        );
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.5)]
    fn test_validate_bad_efficiency(#[case] efficiency: f64) {
        let resource = Resource::new("battery", Power(1.0)).with_storage(
            Time(4.0),
            Dimensionless(efficiency),
            Energy(0.0),
        );
        assert_error!(
            resource.validate(1),
            "Resource battery: efficiency must be in the range (0, 1]"
        );
    }

    #[test]
    fn test_validate_initial_state_of_charge_too_high() {
        let resource = Resource::new("battery", Power(1.0)).with_storage(
            Time(4.0),
            Dimensionless(1.0),
            Energy(5.0),
        );
        assert!(resource.validate(1).is_err());
    }

    #[rstest]
    fn test_validate_storage_with_ramping(battery: Resource) {
        let resource = battery.with_ramping(PerTime(0.1), PerTime(0.1));
        assert_error!(
            resource.validate(1),
            "Resource battery: storage resources cannot be ramp-limited"
        );
    }

    #[rstest]
    fn test_validate_reserved_category(mut gas_plant: Resource) {
        gas_plant.category = ResourceCategory::Curtailment;
        assert!(gas_plant.validate(1).is_err());
    }

    #[rstest]
    fn test_validate_negative_ramp(gas_plant: Resource) {
        let resource = gas_plant.with_ramping(PerTime(-0.1), PerTime(0.1));
        assert_error!(
            resource.validate(1),
            "Resource gas: ramp_up must be a finite, non-negative number"
        );
    }
}
