//! The results of a dispatch run, in the same form for both solution strategies.
use crate::id::ResourceID;
use crate::resource::Resource;
use crate::units::{Energy, MoneyPerEnergy, Power, Time, UnitType};
use indexmap::IndexMap;

/// The objective value reported for runs without a feasible solution
pub const INFEASIBLE_OBJECTIVE: f64 = 1e20;

/// Values smaller than this in magnitude are treated as solver noise and set to zero
const NOISE_TOLERANCE: f64 = 1e-9;

/// Raw per-resource, per-step values as produced by a solver, before aggregation.
///
/// Resources are indexed by their position in the resource list. Charging, curtailment and load
/// loss are all non-negative magnitudes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDispatch {
    /// Power output of each resource at each step
    pub power: Vec<Vec<Power>>,
    /// Charging power of each storage resource at each step (`None` for other resources)
    pub charge: Vec<Option<Vec<Power>>>,
    /// State of charge of each storage resource at the end of each step
    pub state_of_charge: Vec<Option<Vec<Energy>>>,
    /// Excess generation discarded at each step
    pub curtailment: Vec<Power>,
    /// Demand left unmet at each step
    pub load_loss: Vec<Power>,
    /// Marginal price of energy at each step, if known
    pub marginal_prices: Option<Vec<MoneyPerEnergy>>,
}

impl RawDispatch {
    /// Create an all-zero raw dispatch for the given resources
    pub fn new(resources: &[Resource], n_steps: usize) -> Self {
        Self {
            power: vec![vec![Power(0.0); n_steps]; resources.len()],
            charge: storage_series(resources, n_steps),
            state_of_charge: storage_series(resources, n_steps),
            curtailment: vec![Power(0.0); n_steps],
            load_loss: vec![Power(0.0); n_steps],
            marginal_prices: None,
        }
    }

    /// Set the charging power of a storage resource
    ///
    /// # Panics
    ///
    /// If the resource is not a storage resource.
    pub fn set_charge(&mut self, resource: usize, step: usize, value: Power) {
        self.charge[resource]
            .as_mut()
            .expect("Charge set for non-storage resource")[step] = value;
    }

    /// Set the state of charge of a storage resource
    ///
    /// # Panics
    ///
    /// If the resource is not a storage resource.
    pub fn set_state_of_charge(&mut self, resource: usize, step: usize, value: Energy) {
        self.state_of_charge[resource]
            .as_mut()
            .expect("State of charge set for non-storage resource")[step] = value;
    }
}

/// An all-zero series for each storage resource and `None` for the others
fn storage_series<T: Clone + Default>(resources: &[Resource], n_steps: usize) -> Vec<Option<Vec<T>>> {
    resources
        .iter()
        .map(|resource| resource.is_storage().then(|| vec![T::default(); n_steps]))
        .collect()
}

/// Charging and state-of-charge profiles of a storage resource
#[derive(Debug, Clone, PartialEq)]
pub struct StorageProfile {
    /// Power absorbed at each step (non-negative)
    pub charge: Vec<Power>,
    /// Stored energy at the end of each step
    pub state_of_charge: Vec<Energy>,
}

/// Per-resource, per-step dispatch of a feasible run
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSolution {
    /// Length of each time step
    pub time_step: Time,
    /// Net power of each resource at each step, in resource order.
    ///
    /// Positive values are generation or discharge; negative values are storage charging.
    pub dispatch: IndexMap<ResourceID, Vec<Power>>,
    /// Profiles of the storage resources, in resource order
    pub storage: IndexMap<ResourceID, StorageProfile>,
    /// Excess generation discarded at each step (non-positive)
    pub curtailment: Vec<Power>,
    /// Demand left unmet at each step (non-negative)
    pub load_loss: Vec<Power>,
    /// Marginal price of energy at each step (optimal strategy only)
    pub marginal_prices: Option<Vec<MoneyPerEnergy>>,
}

/// Snap values within [`NOISE_TOLERANCE`] of zero to zero
fn denoise<U: UnitType>(value: U) -> U {
    if value.value().abs() < NOISE_TOLERANCE {
        U::new(0.0)
    } else {
        value
    }
}

impl DispatchSolution {
    /// Build a solution from raw solver output.
    ///
    /// Net storage dispatch is discharge minus charge. Values within solver tolerance of zero are
    /// set to zero and states of charge are clamped to the storage capacity.
    pub fn aggregate(resources: &[Resource], time_step: Time, raw: RawDispatch) -> Self {
        let RawDispatch {
            power,
            charge,
            state_of_charge,
            curtailment,
            load_loss,
            marginal_prices,
        } = raw;

        let mut dispatch = IndexMap::new();
        let mut storage = IndexMap::new();
        for (((resource, power), charge), state_of_charge) in
            resources.iter().zip(power).zip(charge).zip(state_of_charge)
        {
            let net = match &charge {
                Some(charge) => power.iter().zip(charge).map(|(&p, &c)| p - c).collect(),
                None => power,
            };
            dispatch.insert(
                resource.id.clone(),
                net.into_iter().map(denoise).collect::<Vec<_>>(),
            );

            if let (Some(charge), Some(state_of_charge)) = (charge, state_of_charge) {
                let capacity = resource.storage_capacity().unwrap_or_default();
                storage.insert(
                    resource.id.clone(),
                    StorageProfile {
                        charge: charge
                            .into_iter()
                            .map(|c| denoise(c).max(Power(0.0)))
                            .collect(),
                        state_of_charge: state_of_charge
                            .into_iter()
                            .map(|s| denoise(s).max(Energy(0.0)).min(capacity))
                            .collect(),
                    },
                );
            }
        }

        Self {
            time_step,
            dispatch,
            storage,
            curtailment: curtailment
                .into_iter()
                .map(|c| Power(0.0) - denoise(c).max(Power(0.0)))
                .collect(),
            load_loss: load_loss
                .into_iter()
                .map(|l| denoise(l).max(Power(0.0)))
                .collect(),
            marginal_prices,
        }
    }

    /// The number of time steps
    pub fn n_steps(&self) -> usize {
        self.curtailment.len()
    }

    /// Net dispatch of the given resource
    pub fn dispatch_of(&self, id: &str) -> Option<&[Power]> {
        self.dispatch.get(id).map(Vec::as_slice)
    }

    /// Net power from all resources at the given step
    pub fn total_dispatch(&self, step: usize) -> Power {
        self.dispatch.values().map(|series| series[step]).sum()
    }

    /// Net supply at the given step: resources plus curtailment (negative) plus load loss.
    ///
    /// Equal to demand when no tolerance band is in use.
    pub fn net_supply(&self, step: usize) -> Power {
        self.total_dispatch(step) + self.curtailment[step] + self.load_loss[step]
    }

    /// Iterate over the named columns of the solution in a stable order.
    ///
    /// There is one column per resource, followed by `<id>_charge` and `<id>_state_of_charge`
    /// columns for each storage resource, then `curtailment`, `load_loss` and (if present)
    /// `marginal_price`.
    pub fn iter_columns(&self) -> impl Iterator<Item = (String, Vec<f64>)> + '_ {
        let values = |series: &[Power]| series.iter().map(UnitType::value).collect::<Vec<_>>();

        let resources = self
            .dispatch
            .iter()
            .map(move |(id, series)| (id.to_string(), values(series)));
        let storage = self.storage.iter().flat_map(move |(id, profile)| {
            [
                (format!("{id}_charge"), values(&profile.charge)),
                (
                    format!("{id}_state_of_charge"),
                    profile.state_of_charge.iter().map(UnitType::value).collect(),
                ),
            ]
        });
        let sinks = [
            ("curtailment".to_string(), values(&self.curtailment)),
            ("load_loss".to_string(), values(&self.load_loss)),
        ];
        let prices = self.marginal_prices.iter().map(|prices| {
            (
                "marginal_price".to_string(),
                prices.iter().map(UnitType::value).collect(),
            )
        });

        resources.chain(storage).chain(sinks).chain(prices)
    }
}

/// The outcome of a dispatch run: an objective value and, if the run was feasible, a solution
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Total cost of the dispatch, or [`INFEASIBLE_OBJECTIVE`]
    pub objective: f64,
    /// The dispatch, if the run was feasible
    pub solution: Option<DispatchSolution>,
}

impl DispatchOutcome {
    /// The outcome of an infeasible run
    pub fn infeasible() -> Self {
        Self {
            objective: INFEASIBLE_OBJECTIVE,
            solution: None,
        }
    }

    /// Aggregate raw solver output into a feasible outcome
    pub fn aggregate(
        objective: f64,
        resources: &[Resource],
        time_step: Time,
        raw: RawDispatch,
    ) -> Self {
        Self {
            objective,
            solution: Some(DispatchSolution::aggregate(resources, time_step, raw)),
        }
    }

    /// Whether a feasible solution was found
    pub fn feasible(&self) -> bool {
        self.solution.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, gas_plant};
    use rstest::rstest;

    #[rstest]
    fn test_aggregate(gas_plant: Resource, battery: Resource) {
        let resources = [gas_plant, battery];
        let mut raw = RawDispatch::new(&resources, 2);
        raw.power[0] = vec![Power(10.0), Power(1e-12)];
        raw.power[1] = vec![Power(0.0), Power(4.0)];
        raw.set_charge(1, 0, Power(3.0));
        raw.set_state_of_charge(1, 0, Energy(22.7));
        raw.set_state_of_charge(1, 1, Energy(40.0 + 1e-12));
        raw.curtailment[1] = Power(2.0);
        raw.load_loss[0] = Power(-1e-12);

        let solution = DispatchSolution::aggregate(&resources, Time(1.0), raw);
        assert_eq!(solution.n_steps(), 2);
        assert_eq!(solution.dispatch_of("gas").unwrap(), [Power(10.0), Power(0.0)]);
        assert_eq!(
            solution.dispatch_of("battery").unwrap(),
            [Power(-3.0), Power(4.0)]
        );
        assert_eq!(
            solution.storage["battery"].state_of_charge,
            [Energy(22.7), Energy(40.0)]
        );
        assert_eq!(solution.curtailment, [Power(0.0), Power(-2.0)]);
        assert_eq!(solution.load_loss, [Power(0.0), Power(0.0)]);
        assert_eq!(solution.net_supply(0), Power(7.0));
        assert_eq!(solution.net_supply(1), Power(2.0));
    }

    #[rstest]
    fn test_iter_columns(gas_plant: Resource, battery: Resource) {
        let resources = [gas_plant, battery];
        let raw = RawDispatch::new(&resources, 3);
        let solution = DispatchSolution::aggregate(&resources, Time(1.0), raw);
        let names: Vec<_> = solution.iter_columns().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            [
                "gas",
                "battery",
                "battery_charge",
                "battery_state_of_charge",
                "curtailment",
                "load_loss"
            ]
        );
        assert!(solution.iter_columns().all(|(_, values)| values.len() == 3));
    }

    #[test]
    fn test_infeasible() {
        let outcome = DispatchOutcome::infeasible();
        assert!(!outcome.feasible());
        assert_eq!(outcome.objective, INFEASIBLE_OBJECTIVE);
    }
}
