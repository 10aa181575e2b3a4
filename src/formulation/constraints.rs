//! Code for adding constraints to the dispatch optimisation problem.
use super::{VariableKey, VariableMap};
use crate::demand::DemandSeries;
use crate::options::DispatchOptions;
use crate::resource::Resource;
use crate::units::{Power, UnitType};
use highs::RowProblem as Problem;
use itertools::iproduct;

/// Corresponding variables for a constraint along with the row offset in the solution
pub struct KeysWithOffset<T> {
    offset: usize,
    keys: Vec<T>,
}

impl<T> KeysWithOffset<T> {
    /// The index one past the last row these keys refer to
    pub fn rows_end(&self) -> usize {
        self.offset + self.keys.len()
    }

    /// Zip the keys with the corresponding dual values in the solution, accounting for the offset
    pub fn zip_duals<'a>(&'a self, duals: &'a [f64]) -> impl Iterator<Item = (&'a T, f64)> {
        assert!(
            self.rows_end() <= duals.len(),
            "Bad constraint keys: dual rows out of range"
        );

        self.keys.iter().zip(duals[self.offset..].iter().copied())
    }
}

/// Indicates the time step covered by each balance constraint
pub type BalanceKeys = KeysWithOffset<usize>;

/// Add all constraints to the problem.
///
/// Note: the ordering of constraints is important, as the dual values of the balance constraints
/// are later retrieved to calculate marginal prices.
///
/// # Returns
///
/// Keys for the balance constraints
pub fn add_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> BalanceKeys {
    let balance_keys = add_balance_constraints(problem, variables, resources, demand, options);
    add_capacity_constraints(problem, variables, resources, demand.len());
    add_ramp_constraints(problem, variables, resources, demand);
    add_storage_constraints(problem, variables, resources, demand);

    balance_keys
}

/// Add supply-demand balance constraints.
///
/// For every time step, net supply (generation minus storage charging minus curtailment plus
/// unmet demand) must lie within the tolerance band around demand.
fn add_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> BalanceKeys {
    // Row offset in problem. This line **must** come before we add more constraints.
    let offset = problem.num_rows();

    let mut keys = Vec::new();
    let mut terms = Vec::new();
    for (step, value) in demand.iter() {
        for resource in 0..resources.len() {
            terms.push((variables.get(VariableKey::Power { resource, step }), 1.0));
            if let Some(var) = variables.try_get(VariableKey::Charge { resource, step }) {
                terms.push((var, -1.0));
            }
        }
        if let Some(var) = variables.try_get(VariableKey::Curtailment { step }) {
            terms.push((var, -1.0));
        }
        if let Some(var) = variables.try_get(VariableKey::LoadLoss { step }) {
            terms.push((var, 1.0));
        }

        let magnitude = value.abs();
        let lower = value - magnitude * options.undersupply;
        let upper = value + magnitude * options.oversupply;
        problem.add_row(lower.value()..=upper.value(), terms.drain(0..));
        keys.push(step);
    }

    BalanceKeys { offset, keys }
}

/// Add capacity constraints.
///
/// Power output (and charging, for storage resources) cannot exceed capacity.
fn add_capacity_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    resources: &[Resource],
    n_steps: usize,
) {
    for (step, (resource, info)) in iproduct!(0..n_steps, resources.iter().enumerate()) {
        let capacity = info.capacity.value();
        let var = variables.get(VariableKey::Power { resource, step });
        problem.add_row(..=capacity, [(var, 1.0)]);

        if let Some(var) = variables.try_get(VariableKey::Charge { resource, step }) {
            problem.add_row(..=capacity, [(var, 1.0)]);
        }
    }
}

/// Add ramp constraints for ramp-limited resources.
///
/// Between consecutive time steps, output may rise by at most `ramp_up × capacity × Δt` and fall
/// by at most `ramp_down × capacity × Δt`.
fn add_ramp_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    resources: &[Resource],
    demand: &DemandSeries,
) {
    let dt = demand.time_step();
    for (resource, info) in resources.iter().enumerate() {
        let Some(ramping) = info.ramping else {
            continue;
        };
        let max_up: Power = (ramping.ramp_up * dt) * info.capacity;
        let max_down: Power = (ramping.ramp_down * dt) * info.capacity;

        for step in 1..demand.len() {
            let current = variables.get(VariableKey::Power { resource, step });
            let previous = variables.get(VariableKey::Power {
                resource,
                step: step - 1,
            });
            problem.add_row(
                -max_down.value()..=max_up.value(),
                [(current, 1.0), (previous, -1.0)],
            );
        }
    }
}

/// Add state-of-charge dynamics for storage resources.
///
/// The state of charge at the end of a step equals the previous state of charge, plus
/// `sqrt(η)` of the energy charged, minus the energy discharged divided by `sqrt(η)`. The state of
/// charge before the first step is the resource's initial state of charge.
fn add_storage_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    resources: &[Resource],
    demand: &DemandSeries,
) {
    let dt = demand.time_step().value();
    for (resource, info) in resources.iter().enumerate() {
        if !info.is_storage() {
            continue;
        }
        let leg_efficiency = info.efficiency().sqrt().value();
        let initial = info.initial_state_of_charge().value();

        for step in 0..demand.len() {
            let mut terms = vec![
                (
                    variables.get(VariableKey::StateOfCharge { resource, step }),
                    1.0,
                ),
                (
                    variables.get(VariableKey::Charge { resource, step }),
                    -dt * leg_efficiency,
                ),
                (
                    variables.get(VariableKey::Power { resource, step }),
                    dt / leg_efficiency,
                ),
            ];

            let rhs = if step == 0 {
                initial
            } else {
                let previous = VariableKey::StateOfCharge {
                    resource,
                    step: step - 1,
                };
                terms.push((variables.get(previous), -1.0));
                0.0
            };
            problem.add_row(rhs..=rhs, terms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_duals() {
        let keys = BalanceKeys {
            offset: 1,
            keys: vec![0, 1],
        };
        let duals = [9.0, 1.0, 2.0, 3.0];
        let zipped: Vec<_> = keys.zip_duals(&duals).collect();
        assert_eq!(zipped, [(&0, 1.0), (&1, 2.0)]);
    }

    #[test]
    #[should_panic(expected = "Bad constraint keys: dual rows out of range")]
    fn test_zip_duals_out_of_range() {
        let keys = BalanceKeys {
            offset: 3,
            keys: vec![0, 1],
        };
        let _ = keys.zip_duals(&[1.0, 2.0, 3.0]).count();
    }
}
