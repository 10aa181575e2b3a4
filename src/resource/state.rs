//! The running state of a resource during a heuristic dispatch run.
//!
//! A [`ResourceState`] borrows its [`Resource`] immutably and keeps the mutable parts (power level,
//! state of charge and history) to itself, so the caller's resources are never modified and
//! independent runs never share state.
use super::Resource;
use crate::units::{Dimensionless, Energy, Power, Time};

/// Mutable per-run state for a single [`Resource`]
#[derive(Debug, Clone)]
pub struct ResourceState<'a> {
    resource: &'a Resource,
    /// Output at the previous time step, if there was one
    power_level: Option<Power>,
    state_of_charge: Energy,
    power_history: Vec<Power>,
    storage_history: Vec<Energy>,
}

impl<'a> ResourceState<'a> {
    /// Create a fresh state for the given resource
    pub fn new(resource: &'a Resource) -> Self {
        Self {
            resource,
            power_level: None,
            state_of_charge: resource.initial_state_of_charge(),
            power_history: Vec::new(),
            storage_history: Vec::new(),
        }
    }

    /// Clear the history and restore the initial power level and state of charge
    pub fn reset(&mut self) {
        self.power_level = None;
        self.state_of_charge = self.resource.initial_state_of_charge();
        self.power_history.clear();
        self.storage_history.clear();
    }

    /// The resource this state belongs to
    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    /// The output committed at the most recent time step
    pub fn power_level(&self) -> Option<Power> {
        self.power_level
    }

    /// Currently stored energy
    pub fn state_of_charge(&self) -> Energy {
        self.state_of_charge
    }

    /// Output committed at each time step so far (negative when charging)
    pub fn power_history(&self) -> &[Power] {
        &self.power_history
    }

    /// State of charge at the end of each time step so far (storage resources only)
    pub fn storage_history(&self) -> &[Energy] {
        &self.storage_history
    }

    /// Commit the resource's output for the next time step.
    ///
    /// # Arguments
    ///
    /// * `demand` - The demand left to meet. A negative value is a surplus, which storage resources
    ///   will try to absorb.
    /// * `time_step` - The length of the time step
    ///
    /// # Returns
    ///
    /// The power delivered (positive) or absorbed (negative).
    pub fn power_output(&mut self, demand: Power, time_step: Time) -> Power {
        let output = match self.resource.storage {
            Some(_) if demand >= Power(0.0) => self.discharge(demand, time_step),
            Some(_) => self.charge(-demand, time_step),
            None => {
                let (lower, upper) = self.output_limits(time_step);
                demand.max(lower).min(upper)
            }
        };

        self.power_level = Some(output);
        self.power_history.push(output);
        if self.resource.is_storage() {
            self.storage_history.push(self.state_of_charge);
        }

        output
    }

    /// The range of achievable output for the next time step
    fn output_limits(&self, time_step: Time) -> (Power, Power) {
        let capacity = self.resource.capacity;
        match (self.resource.ramping, self.power_level) {
            (Some(ramping), Some(level)) => {
                let max_up = (ramping.ramp_up * time_step) * capacity;
                let max_down = (ramping.ramp_down * time_step) * capacity;
                (
                    (level - max_down).max(Power(0.0)).min(capacity),
                    (level + max_up).min(capacity).max(Power(0.0)),
                )
            }
            _ => (Power(0.0), capacity),
        }
    }

    /// Discharge up to `demand`, limited by capacity and stored energy
    fn discharge(&mut self, demand: Power, time_step: Time) -> Power {
        let leg_efficiency = self.leg_efficiency();
        let available = self.state_of_charge * leg_efficiency / time_step;
        let delivered = demand.min(self.resource.capacity).min(available);

        let drawn = delivered * time_step / leg_efficiency;
        self.state_of_charge = (self.state_of_charge - drawn).max(Energy(0.0));

        delivered
    }

    /// Charge with up to `surplus`, limited by capacity and free space in the reservoir
    fn charge(&mut self, surplus: Power, time_step: Time) -> Power {
        let storage_capacity = self.resource.storage_capacity().unwrap_or_default();
        let leg_efficiency = self.leg_efficiency();
        let headroom = (storage_capacity - self.state_of_charge) / leg_efficiency / time_step;
        let absorbed = surplus
            .min(self.resource.capacity)
            .min(headroom)
            .max(Power(0.0));

        let stored = absorbed * time_step * leg_efficiency;
        self.state_of_charge = (self.state_of_charge + stored).min(storage_capacity);

        -absorbed
    }

    /// Efficiency of a single charge or discharge leg
    fn leg_efficiency(&self) -> Dimensionless {
        self.resource.efficiency().sqrt()
    }
}
