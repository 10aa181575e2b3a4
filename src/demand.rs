//! Code for working with the demand series which resources are dispatched against.
use crate::units::{Energy, Power, PowerUnit, Time, UnitType};
use anyhow::{Result, ensure};

/// A series of power demands, one per uniform time step
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    values: Vec<Power>,
    time_step: Time,
    unit: PowerUnit,
}

impl DemandSeries {
    /// Create a new demand series.
    ///
    /// # Arguments
    ///
    /// * `values` - Demand at each time step, expressed in `unit`
    /// * `unit` - The unit of `values`
    /// * `time_step` - The length of each time step
    pub fn new(values: &[f64], unit: PowerUnit, time_step: Time) -> Result<Self> {
        ensure!(!values.is_empty(), "Demand series cannot be empty");
        ensure!(
            values.iter().all(|v| v.is_finite()),
            "Demand values must be finite"
        );
        ensure!(
            time_step.is_finite() && time_step > Time(0.0),
            "Time step must be a finite, positive number"
        );

        Ok(Self {
            values: values.iter().map(|&v| unit.to_power(v)).collect(),
            time_step,
            unit,
        })
    }

    /// Create a demand series in megawatts with hourly time steps
    pub fn hourly(values: &[f64]) -> Result<Self> {
        Self::new(values, PowerUnit::Megawatt, Time(1.0))
    }

    /// Demand at each time step
    pub fn values(&self) -> &[Power] {
        &self.values
    }

    /// Length of each time step
    pub fn time_step(&self) -> Time {
        self.time_step
    }

    /// The unit demand was originally given in
    pub fn unit(&self) -> PowerUnit {
        self.unit
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty (never true for a validated series)
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the time steps and their demand
    pub fn iter(&self) -> impl Iterator<Item = (usize, Power)> + '_ {
        self.values.iter().copied().enumerate()
    }

    /// Total energy demanded over the whole series
    pub fn total_energy(&self) -> Energy {
        self.values.iter().map(|&d| d * self.time_step).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_demand_series_new() {
        let demand = DemandSeries::new(&[1.0, 2.0], PowerUnit::Gigawatt, Time(0.5)).unwrap();
        assert_eq!(demand.values(), [Power(1000.0), Power(2000.0)]);
        assert_eq!(demand.unit(), PowerUnit::Gigawatt);
        assert_eq!(demand.len(), 2);
        assert_approx_eq!(f64, demand.total_energy().value(), 1500.0);
    }

    #[test]
    fn test_demand_series_invalid() {
        assert_error!(DemandSeries::hourly(&[]), "Demand series cannot be empty");
        assert_error!(
            DemandSeries::hourly(&[f64::NAN]),
            "Demand values must be finite"
        );
        assert_error!(
            DemandSeries::new(&[1.0], PowerUnit::Megawatt, Time(0.0)),
            "Time step must be a finite, positive number"
        );
    }
}
