//! Code for formulating the dispatch problem as a linear program.
//!
//! Every resource gets a power output variable for each time step. Storage resources additionally
//! get a charging variable and a state-of-charge variable. When enabled, synthetic curtailment and
//! load-loss variables absorb imbalance between supply and demand.
//!
//! Power variables are in MW. Their objective coefficients are therefore cost per unit energy
//! multiplied by the length of the time step.
use crate::demand::DemandSeries;
use crate::options::DispatchOptions;
use crate::resource::Resource;
use crate::solution::{DispatchOutcome, RawDispatch};
use crate::solver::{LpSolver, SolverOutcome};
use crate::units::{Energy, MoneyPerEnergy, Power, Time, UnitType};
use highs::RowProblem as Problem;
use indexmap::IndexMap;
use itertools::iproduct;
use log::debug;
use std::ops::RangeBounds;

pub mod constraints;
use constraints::{BalanceKeys, add_constraints};

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
type Variable = highs::Col;

/// What a variable represents. Resources are referred to by their position in the resource list.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
pub enum VariableKey {
    /// Power output of a resource
    Power {
        /// Index of the resource
        resource: usize,
        /// Time step
        step: usize,
    },
    /// Charging power of a storage resource
    Charge {
        /// Index of the resource
        resource: usize,
        /// Time step
        step: usize,
    },
    /// State of charge of a storage resource at the end of a time step
    StateOfCharge {
        /// Index of the resource
        resource: usize,
        /// Time step
        step: usize,
    },
    /// Excess generation discarded
    Curtailment {
        /// Time step
        step: usize,
    },
    /// Demand left unmet
    LoadLoss {
        /// Time step
        step: usize,
    },
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered (see [`IndexMap`]) in the same order as the problem's columns, so the
/// solution's column values can be zipped with the keys.
#[derive(Default)]
pub struct VariableMap {
    variables: IndexMap<VariableKey, Variable>,
    costs: Vec<f64>,
}

impl VariableMap {
    /// Add a new column to the problem and record it under `key`
    fn add<B: RangeBounds<f64>>(
        &mut self,
        problem: &mut Problem,
        key: VariableKey,
        cost: f64,
        bounds: B,
    ) {
        let var = problem.add_column(cost, bounds);
        let existing = self.variables.insert(key, var).is_some();
        assert!(!existing, "Duplicate variable: {key:?}");
        self.costs.push(cost);
    }

    /// Get the [`Variable`] corresponding to the given key.
    ///
    /// # Panics
    ///
    /// If no such variable was added.
    pub fn get(&self, key: VariableKey) -> Variable {
        *self
            .variables
            .get(&key)
            .expect("No variable found for given key")
    }

    /// Get the [`Variable`] corresponding to the given key, if there is one
    pub fn try_get(&self, key: VariableKey) -> Option<Variable> {
        self.variables.get(&key).copied()
    }

    /// The number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate over the keys in column order
    pub fn keys(&self) -> impl Iterator<Item = &VariableKey> {
        self.variables.keys()
    }

    /// The objective value of the given column values
    pub fn objective(&self, columns: &[f64]) -> f64 {
        self.costs.iter().zip(columns).map(|(cost, value)| cost * value).sum()
    }
}

/// A formulated dispatch problem, ready to be solved.
///
/// The problem is consumed when solved, so a formulation is never reused between runs.
pub struct DispatchProblem {
    problem: Problem,
    variables: VariableMap,
    balance_keys: BalanceKeys,
    time_step: Time,
    n_steps: usize,
}

impl DispatchProblem {
    /// The problem's variables
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// The number of columns in the problem
    pub fn num_cols(&self) -> usize {
        self.problem.num_cols()
    }

    /// The number of rows in the problem
    pub fn num_rows(&self) -> usize {
        self.problem.num_rows()
    }

    /// Solve the problem and convert the result into raw per-resource values.
    ///
    /// # Returns
    ///
    /// The objective value and raw dispatch, or `None` if the solver did not find an optimal
    /// solution.
    pub fn solve(self, solver: &dyn LpSolver, resources: &[Resource]) -> Option<(f64, RawDispatch)> {
        let Self {
            problem,
            variables,
            balance_keys,
            time_step,
            n_steps,
        } = self;

        let solution = match solver.solve(problem) {
            SolverOutcome::Optimal(solution) => solution,
            SolverOutcome::Infeasible => {
                debug!("Dispatch problem is infeasible");
                return None;
            }
            SolverOutcome::Failed(reason) => {
                debug!("Solver failed: {reason}");
                return None;
            }
        };

        if solution.columns.len() != variables.len() {
            debug!(
                "Solver returned {} column values for {} variables",
                solution.columns.len(),
                variables.len()
            );
            return None;
        }
        if !solution.dual_rows.is_empty() && solution.dual_rows.len() < balance_keys.rows_end() {
            debug!(
                "Solver returned {} row duals but the balance rows end at {}",
                solution.dual_rows.len(),
                balance_keys.rows_end()
            );
            return None;
        }

        let mut raw = RawDispatch::new(resources, n_steps);
        for (key, &value) in variables.keys().zip(solution.columns.iter()) {
            match *key {
                VariableKey::Power { resource, step } => raw.power[resource][step] = Power(value),
                VariableKey::Charge { resource, step } => {
                    raw.set_charge(resource, step, Power(value));
                }
                VariableKey::StateOfCharge { resource, step } => {
                    raw.set_state_of_charge(resource, step, Energy(value));
                }
                VariableKey::Curtailment { step } => raw.curtailment[step] = Power(value),
                VariableKey::LoadLoss { step } => raw.load_loss[step] = Power(value),
            }
        }

        // The dual of a balance row is the cost of one more MW for the whole time step
        if !solution.dual_rows.is_empty() {
            let mut prices = vec![MoneyPerEnergy(0.0); n_steps];
            for (&step, dual) in balance_keys.zip_duals(&solution.dual_rows) {
                prices[step] = MoneyPerEnergy(dual / time_step.value());
            }
            raw.marginal_prices = Some(prices);
        }

        Some((variables.objective(&solution.columns), raw))
    }

    /// Solve the problem and aggregate the result into a [`DispatchOutcome`]
    pub fn solve_outcome(self, solver: &dyn LpSolver, resources: &[Resource]) -> DispatchOutcome {
        let time_step = self.time_step;
        match self.solve(solver, resources) {
            Some((objective, raw)) => DispatchOutcome::aggregate(objective, resources, time_step, raw),
            None => DispatchOutcome::infeasible(),
        }
    }
}

/// Formulate the dispatch problem.
///
/// # Arguments
///
/// * `resources` - The resources to dispatch
/// * `demand` - The demand series
/// * `options` - Options for the run
/// * `load_loss_cost` - Cost of unmet demand
pub fn formulate(
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
    load_loss_cost: MoneyPerEnergy,
) -> DispatchProblem {
    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, resources, demand, options, load_loss_cost);
    let balance_keys = add_constraints(&mut problem, &variables, resources, demand, options);

    DispatchProblem {
        problem,
        variables,
        balance_keys,
        time_step: demand.time_step(),
        n_steps: demand.len(),
    }
}

/// Add variables to the optimisation problem.
///
/// # Returns
///
/// A [`VariableMap`] with the problem's variables as values.
fn add_variables(
    problem: &mut Problem,
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
    load_loss_cost: MoneyPerEnergy,
) -> VariableMap {
    let dt = demand.time_step().value();
    let penalty = options.penalty.value() * dt;
    let mut variables = VariableMap::default();

    for (step, (resource_idx, resource)) in iproduct!(0..demand.len(), resources.iter().enumerate())
    {
        let cost = resource.variable_cost(step).value() * dt;
        let power = VariableKey::Power {
            resource: resource_idx,
            step,
        };

        if let Some(storage_capacity) = resource.storage_capacity() {
            variables.add(problem, power, cost + penalty, 0.0..);
            variables.add(
                problem,
                VariableKey::Charge {
                    resource: resource_idx,
                    step,
                },
                penalty,
                0.0..,
            );
            variables.add(
                problem,
                VariableKey::StateOfCharge {
                    resource: resource_idx,
                    step,
                },
                0.0,
                0.0..=storage_capacity.value(),
            );
        } else {
            variables.add(problem, power, cost, options.lower_bound.value()..);
        }
    }

    for step in 0..demand.len() {
        if options.curtailment {
            variables.add(problem, VariableKey::Curtailment { step }, penalty, 0.0..);
        }
        if options.allow_blackout {
            let cost = load_loss_cost.value() * dt;
            variables.add(problem, VariableKey::LoadLoss { step }, cost, 0.0..);
        }
    }

    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, gas_plant};
    use crate::units::{PerTime, PowerUnit};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_formulate_counts(gas_plant: Resource, battery: Resource) {
        let resources = [gas_plant.with_ramping(PerTime(0.5), PerTime(0.5)), battery];
        let demand = DemandSeries::hourly(&[10.0, 20.0, 30.0]).unwrap();
        let options = DispatchOptions {
            allow_blackout: true,
            ..DispatchOptions::default()
        };
        let problem = formulate(&resources, &demand, &options, MoneyPerEnergy(1000.0));

        // Gas: 1 per step; battery: 3 per step; curtailment and load loss: 1 each per step
        assert_eq!(problem.num_cols(), 3 * (1 + 3 + 2));
        assert_eq!(problem.variables().len(), problem.num_cols());

        // Balance (3) + capacity (3 gas + 6 battery) + ramp (2) + storage (3)
        assert_eq!(problem.num_rows(), 3 + 9 + 2 + 3);
    }

    #[rstest]
    fn test_formulate_optional_sinks(gas_plant: Resource) {
        let resources = [gas_plant];
        let demand = DemandSeries::hourly(&[10.0, 20.0]).unwrap();
        let options = DispatchOptions {
            curtailment: false,
            ..DispatchOptions::default()
        };
        let problem = formulate(&resources, &demand, &options, MoneyPerEnergy(1000.0));
        assert_eq!(problem.num_cols(), 2);
        assert!(
            problem
                .variables()
                .try_get(VariableKey::Curtailment { step: 0 })
                .is_none()
        );
        assert!(
            problem
                .variables()
                .try_get(VariableKey::LoadLoss { step: 0 })
                .is_none()
        );
    }

    #[rstest]
    fn test_objective_coefficients(gas_plant: Resource) {
        let resources = [gas_plant];
        let demand = DemandSeries::new(&[10.0], PowerUnit::Megawatt, Time(0.5)).unwrap();
        let options = DispatchOptions {
            penalty: MoneyPerEnergy(0.0),
            ..DispatchOptions::default()
        };
        let problem = formulate(&resources, &demand, &options, MoneyPerEnergy(1000.0));

        // 10 MW for half an hour at 30 per MWh
        assert_approx_eq!(f64, problem.variables().objective(&[10.0, 0.0]), 150.0);
    }
}
