//! Merit-order dispatch.
//!
//! Resources are sorted once by mean variable cost (cheapest first, ties broken by higher
//! efficiency). For each time step in turn, the generators are asked in that order to cover
//! whatever demand remains. Storage goes last: it discharges into any shortfall the generators
//! leave, or charges from any surplus they produce (e.g. from units which cannot ramp down).
//! Imbalance within the tolerance band is accepted as is. Imbalance outside it goes to load loss
//! (if blackouts are allowed) or curtailment (if enabled); otherwise the run is infeasible.
use crate::demand::DemandSeries;
use crate::options::DispatchOptions;
use crate::resource::Resource;
use crate::resource::state::ResourceState;
use crate::solution::{DispatchOutcome, RawDispatch};
use crate::units::{MoneyPerEnergy, Power, UnitType};
use itertools::Itertools;
use log::debug;

/// Imbalance smaller than this (relative to demand, or absolute for small demand) is ignored
const BALANCE_TOLERANCE: f64 = 1e-9;

/// The order in which resources are dispatched, as indices into `resources`.
///
/// Generators come first, cheapest first, followed by storage resources in the same order.
/// Resources with equal cost are ordered by descending efficiency and then by their position in
/// the list.
pub fn merit_order(resources: &[Resource]) -> Vec<usize> {
    (0..resources.len())
        .sorted_by(|&a, &b| {
            let (a, b) = (&resources[a], &resources[b]);
            a.is_storage()
                .cmp(&b.is_storage())
                .then_with(|| a.mean_variable_cost().total_cmp(&b.mean_variable_cost()))
                .then_with(|| b.efficiency().0.total_cmp(&a.efficiency().0))
        })
        .collect()
}

/// Dispatch resources in merit order.
///
/// # Arguments
///
/// * `resources` - The resources to dispatch (never modified)
/// * `demand` - The demand series
/// * `options` - Options for the run
/// * `load_loss_cost` - Cost of unmet demand
///
/// # Returns
///
/// The outcome of the run, which is infeasible if some step's imbalance cannot be absorbed.
pub fn dispatch(
    resources: &[Resource],
    demand: &DemandSeries,
    options: &DispatchOptions,
    load_loss_cost: MoneyPerEnergy,
) -> DispatchOutcome {
    let dt = demand.time_step();
    let order = merit_order(resources);
    let mut states: Vec<_> = resources.iter().map(ResourceState::new).collect();
    let mut raw = RawDispatch::new(resources, demand.len());

    for (step, value) in demand.iter() {
        // Storage discharges while `remaining` is positive and charges while it is negative. It
        // never overshoots, so no storage resource both discharges and charges in one step.
        let mut remaining = value;
        for &idx in &order {
            remaining = remaining - states[idx].power_output(remaining, dt);
        }

        // Imbalance outside the tolerance band
        let tolerance = Power(BALANCE_TOLERANCE * value.abs().value().max(1.0));
        let shortfall = remaining - value.abs() * options.undersupply;
        let excess = -remaining - value.abs() * options.oversupply;
        if shortfall > tolerance {
            if !options.allow_blackout {
                debug!("Merit-order dispatch infeasible at time step {step}: {shortfall} MW unmet");
                return DispatchOutcome::infeasible();
            }
            raw.load_loss[step] = shortfall;
        } else if excess > tolerance {
            if !options.curtailment {
                debug!("Merit-order dispatch infeasible at time step {step}: {excess} MW excess");
                return DispatchOutcome::infeasible();
            }
            raw.curtailment[step] = excess;
        }
    }

    let mut objective = 0.0;
    for (idx, state) in states.iter().enumerate() {
        for (step, &power) in state.power_history().iter().enumerate() {
            raw.power[idx][step] = power.max(Power(0.0));
            objective += (resources[idx].variable_cost(step) * (power.max(Power(0.0)) * dt)).value();
        }
        if state.resource().is_storage() {
            for (step, &power) in state.power_history().iter().enumerate() {
                raw.set_charge(idx, step, (-power).max(Power(0.0)));
            }
            for (step, &level) in state.storage_history().iter().enumerate() {
                raw.set_state_of_charge(idx, step, level);
            }
        }
    }
    objective += raw
        .load_loss
        .iter()
        .map(|&loss| (load_loss_cost * (loss * dt)).value())
        .sum::<f64>();

    DispatchOutcome::aggregate(objective, resources, dt, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, gas_plant};
    use crate::units::{Dimensionless, Energy, PerTime, Time};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_merit_order(gas_plant: Resource, battery: Resource) {
        let cheap = Resource::new("cheap", Power(10.0)).with_fuel_cost(5.0);
        let lossy = Resource::new("lossy", Power(10.0)).with_storage(
            Time(1.0),
            Dimensionless(0.5),
            Energy(0.0),
        );
        let resources = [gas_plant, battery, cheap, lossy];

        // Generators by cost, then storage; the more efficient battery goes before lossy
        assert_eq!(merit_order(&resources), [2, 0, 1, 3]);
    }

    #[rstest]
    fn test_dispatch_simple(gas_plant: Resource) {
        let cheap = Resource::new("cheap", Power(10.0)).with_fuel_cost(5.0);
        let resources = [gas_plant, cheap];
        let demand = DemandSeries::hourly(&[5.0, 50.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );

        let solution = outcome.solution.unwrap();
        assert_eq!(solution.dispatch_of("cheap").unwrap(), [Power(5.0), Power(10.0)]);
        assert_eq!(solution.dispatch_of("gas").unwrap(), [Power(0.0), Power(40.0)]);
        assert_approx_eq!(f64, outcome.objective, 5.0 * 15.0 + 30.0 * 40.0);
    }

    #[rstest]
    fn test_dispatch_infeasible(gas_plant: Resource) {
        let resources = [gas_plant];
        let demand = DemandSeries::hourly(&[50.0, 150.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );
        assert!(!outcome.feasible());
    }

    #[rstest]
    fn test_dispatch_within_tolerance(gas_plant: Resource) {
        let resources = [gas_plant];
        let demand = DemandSeries::hourly(&[105.0]).unwrap();
        let options = DispatchOptions {
            undersupply: Dimensionless(0.1),
            ..DispatchOptions::heuristic()
        };
        let outcome = dispatch(&resources, &demand, &options, MoneyPerEnergy(1000.0));
        let solution = outcome.solution.unwrap();
        assert_eq!(solution.dispatch_of("gas").unwrap(), [Power(100.0)]);
        assert_eq!(solution.load_loss, [Power(0.0)]);
    }

    #[rstest]
    fn test_dispatch_blackout(gas_plant: Resource) {
        let resources = [gas_plant];
        let demand = DemandSeries::hourly(&[120.0]).unwrap();
        let options = DispatchOptions {
            allow_blackout: true,
            ..DispatchOptions::heuristic()
        };
        let outcome = dispatch(&resources, &demand, &options, MoneyPerEnergy(1000.0));
        let solution = outcome.solution.unwrap();
        assert_approx_eq!(f64, solution.load_loss[0].value(), 20.0, epsilon = 1e-6);
        assert_approx_eq!(
            f64,
            outcome.objective,
            30.0 * 100.0 + 1000.0 * 20.0,
            epsilon = 1e-3
        );
    }

    #[rstest]
    fn test_dispatch_storage_charges_from_surplus(battery: Resource) {
        let must_run = Resource::new("nuclear", Power(10.0))
            .with_fuel_cost(1.0)
            .with_ramping(PerTime(0.0), PerTime(0.0));
        let resources = [must_run, battery.with_om_cost_variable(5.0)];
        let demand = DemandSeries::hourly(&[10.0, 4.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );
        let solution = outcome.solution.unwrap();

        // Nuclear cannot ramp down, so the battery absorbs the surplus
        assert_eq!(solution.dispatch_of("nuclear").unwrap(), [Power(10.0), Power(10.0)]);
        assert_eq!(solution.dispatch_of("battery").unwrap(), [Power(0.0), Power(-6.0)]);
        assert_eq!(solution.storage["battery"].charge, [Power(0.0), Power(6.0)]);
        assert_approx_eq!(
            f64,
            solution.storage["battery"].state_of_charge[1].value(),
            20.0 + 6.0 * 0.9,
            epsilon = 1e-9
        );
        assert_eq!(solution.curtailment, [Power(0.0), Power(0.0)]);
        assert_approx_eq!(f64, outcome.objective, 20.0);
    }

    #[test]
    fn test_dispatch_free_storage_absorbs_must_run_surplus() {
        let battery = Resource::new("battery", Power(10.0)).with_storage(
            Time(4.0),
            Dimensionless(1.0),
            Energy(0.0),
        );
        let must_run = Resource::new("nuclear", Power(10.0))
            .with_fuel_cost(1.0)
            .with_ramping(PerTime(0.0), PerTime(0.0));
        let peaker = Resource::new("gas", Power(100.0)).with_fuel_cost(50.0);
        let resources = [battery, must_run, peaker];
        let demand = DemandSeries::hourly(&[10.0, 4.0, 4.0, 16.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );
        let solution = outcome.solution.unwrap();

        // Storage costs nothing to run but still waits for the generators' surplus
        assert_eq!(solution.dispatch_of("nuclear").unwrap(), [Power(10.0); 4]);
        assert_eq!(
            solution.dispatch_of("battery").unwrap(),
            [Power(0.0), Power(-6.0), Power(-6.0), Power(0.0)]
        );
        assert_eq!(
            solution.storage["battery"].state_of_charge,
            [Energy(0.0), Energy(6.0), Energy(12.0), Energy(12.0)]
        );
        assert_eq!(solution.curtailment, [Power(0.0); 4]);
        assert_eq!(
            solution.dispatch_of("gas").unwrap(),
            [Power(0.0), Power(0.0), Power(0.0), Power(6.0)]
        );
        assert_approx_eq!(f64, outcome.objective, 1.0 * 40.0 + 50.0 * 6.0);
    }

    #[test]
    fn test_dispatch_storage_covers_generator_shortfall() {
        let battery = Resource::new("battery", Power(10.0)).with_storage(
            Time(4.0),
            Dimensionless(1.0),
            Energy(20.0),
        );
        let thermal = Resource::new("thermal", Power(10.0))
            .with_fuel_cost(20.0)
            .with_ramping(PerTime(0.1), PerTime(0.1));
        let resources = [battery, thermal];
        let demand = DemandSeries::hourly(&[5.0, 10.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );
        let solution = outcome.solution.unwrap();

        // Thermal can only ramp up by 1 MW, so the battery makes up the rest
        assert_eq!(solution.dispatch_of("thermal").unwrap(), [Power(5.0), Power(6.0)]);
        assert_eq!(
            solution.dispatch_of("battery").unwrap(),
            [Power(0.0), Power(4.0)]
        );
        assert_eq!(
            solution.storage["battery"].state_of_charge,
            [Energy(20.0), Energy(16.0)]
        );
    }

    #[test]
    fn test_dispatch_non_dispatchable_resource_is_curtailable() {
        let wind = Resource::new("wind", Power(40.0)).renewable();
        assert!(!wind.dispatchable);
        let resources = [wind];
        let demand = DemandSeries::hourly(&[10.0, 40.0]).unwrap();
        let outcome = dispatch(
            &resources,
            &demand,
            &DispatchOptions::heuristic(),
            MoneyPerEnergy(1000.0),
        );
        let solution = outcome.solution.unwrap();

        // Output follows demand rather than being fixed at capacity
        assert_eq!(solution.dispatch_of("wind").unwrap(), [Power(10.0), Power(40.0)]);
        assert_eq!(solution.curtailment, [Power(0.0); 2]);
    }
}
