//! Code for reading resources from `resources.toml`.
use super::{input_err_msg, read_toml};
use crate::resource::{Ramping, Resource, ResourceCategory, Storage, VariableCost};
use crate::units::{
    Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, PerTime, Power, PowerUnit,
    QuantityInput, Time, TimeUnit, UnitSettings, UnitType, validate,
};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;

const RESOURCES_FILE_NAME: &str = "resources.toml";

/// The ramp rate assumed for a ramp-limited resource which only gives one direction
const DEFAULT_RAMP_RATE: PerTime = PerTime(1.0);

/// The contents of `resources.toml`
#[derive(Debug, Deserialize)]
struct ResourcesFile {
    resources: Vec<ResourceRaw>,
}

/// A cost which is either a single quantity or one quantity per time step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum CostInput {
    Scalar(QuantityInput),
    Series(Vec<QuantityInput>),
}

/// A resource as it appears in the input file, before unit conversion
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceRaw {
    id: String,
    #[serde(default)]
    category: ResourceCategory,
    #[serde(default = "default_dispatchable")]
    dispatchable: bool,
    #[serde(default)]
    renewable: bool,
    capacity: QuantityInput,
    fuel_cost: Option<CostInput>,
    om_cost_variable: Option<CostInput>,
    om_cost_fixed: Option<QuantityInput>,
    capital_cost: Option<QuantityInput>,
    ramp_up: Option<QuantityInput>,
    ramp_down: Option<QuantityInput>,
    storage_duration: Option<QuantityInput>,
    efficiency: Option<f64>,
    initial_state_of_charge: Option<QuantityInput>,
    #[serde(default)]
    power_unit: PowerUnit,
    #[serde(default)]
    time_unit: TimeUnit,
}

fn default_dispatchable() -> bool {
    true
}

/// Read resources from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `n_steps` - The number of time steps in the demand series
///
/// # Returns
///
/// The resources, in file order, each of which has been validated.
pub fn read_resources(model_dir: &Path, n_steps: usize) -> Result<Vec<Resource>> {
    let file_path = model_dir.join(RESOURCES_FILE_NAME);
    let file: ResourcesFile = read_toml(&file_path)?;
    read_resources_from_iter(file.resources.into_iter(), n_steps)
        .with_context(|| input_err_msg(&file_path))
}

fn read_resources_from_iter<I>(iter: I, n_steps: usize) -> Result<Vec<Resource>>
where
    I: Iterator<Item = ResourceRaw>,
{
    iter.map(|raw| {
        let id = raw.id.clone();
        let resource = raw
            .into_resource()
            .with_context(|| format!("Invalid resource {id}"))?;
        resource.validate(n_steps)?;
        Ok(resource)
    })
    .try_collect()
}

/// Convert a quantity with the given units, naming the field on error
fn quantity<U: UnitType>(input: &QuantityInput, units: &UnitSettings, field: &str) -> Result<U> {
    validate(input, units).with_context(|| format!("Invalid value for {field}"))
}

fn optional_quantity<U: UnitType>(
    input: Option<&QuantityInput>,
    units: &UnitSettings,
    field: &str,
) -> Result<Option<U>> {
    input.map(|input| quantity(input, units, field)).transpose()
}

fn cost(input: Option<&CostInput>, units: &UnitSettings, field: &str) -> Result<VariableCost> {
    Ok(match input {
        None => VariableCost::default(),
        Some(CostInput::Scalar(value)) => VariableCost::Scalar(quantity(value, units, field)?),
        Some(CostInput::Series(values)) => VariableCost::Series(
            values
                .iter()
                .map(|value| quantity::<MoneyPerEnergy>(value, units, field))
                .try_collect()?,
        ),
    })
}

impl ResourceRaw {
    fn into_resource(self) -> Result<Resource> {
        let units = UnitSettings {
            power: self.power_unit,
            time: self.time_unit,
        };

        let capacity: Power = quantity(&self.capacity, &units, "capacity")?;
        let ramp_up = optional_quantity(self.ramp_up.as_ref(), &units, "ramp_up")?;
        let ramp_down = optional_quantity(self.ramp_down.as_ref(), &units, "ramp_down")?;
        let ramping = match (ramp_up, ramp_down) {
            (None, None) => None,
            (ramp_up, ramp_down) => Some(Ramping {
                ramp_up: ramp_up.unwrap_or(DEFAULT_RAMP_RATE),
                ramp_down: ramp_down.unwrap_or(DEFAULT_RAMP_RATE),
            }),
        };

        let storage = match self.storage_duration.as_ref() {
            Some(duration) => {
                let duration: Time = quantity(duration, &units, "storage_duration")?;
                let initial_state_of_charge = optional_quantity(
                    self.initial_state_of_charge.as_ref(),
                    &units,
                    "initial_state_of_charge",
                )?
                .unwrap_or(Energy(0.0));
                Some(Storage {
                    duration,
                    efficiency: Dimensionless(self.efficiency.unwrap_or(1.0)),
                    initial_state_of_charge,
                })
            }
            None => {
                ensure!(
                    self.efficiency.is_none() && self.initial_state_of_charge.is_none(),
                    "efficiency and initial_state_of_charge require storage_duration"
                );
                None
            }
        };

        // A storage record implies the storage category
        let category = if storage.is_some() {
            ResourceCategory::Storage
        } else {
            self.category
        };

        Ok(Resource {
            id: self.id.into(),
            category,
            dispatchable: self.dispatchable,
            renewable: self.renewable,
            capacity,
            fuel_cost: cost(self.fuel_cost.as_ref(), &units, "fuel_cost")?,
            om_cost_variable: cost(self.om_cost_variable.as_ref(), &units, "om_cost_variable")?,
            om_cost_fixed: optional_quantity(self.om_cost_fixed.as_ref(), &units, "om_cost_fixed")?
                .unwrap_or(MoneyPerPower(0.0)),
            capital_cost: optional_quantity(self.capital_cost.as_ref(), &units, "capital_cost")?
                .unwrap_or(MoneyPerPower(0.0)),
            ramping,
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn parse(contents: &str) -> Result<Vec<Resource>> {
        let file: ResourcesFile = toml::from_str(contents)?;
        read_resources_from_iter(file.resources.into_iter(), 3)
    }

    #[test]
    fn test_read_resources_defaults() {
        let resources = parse(
            r#"
            [[resources]]
            id = "gas"
            capacity = 100
            fuel_cost = 30
            "#,
        )
        .unwrap();
        assert_eq!(
            resources,
            [Resource::new("gas", Power(100.0)).with_fuel_cost(30.0)]
        );
    }

    #[test]
    fn test_read_resources_units() {
        let resources = parse(
            r#"
            [[resources]]
            id = "gas"
            capacity = "1 GW"
            fuel_cost = "0.03 1/kWh"
            om_cost_variable = [1, 2, 3]
            ramp_up = "0.5 1/hr"

            [[resources]]
            id = "battery"
            capacity = 10
            power_unit = "kW"
            storage_duration = "240 min"
            efficiency = 0.81
            initial_state_of_charge = 20
            "#,
        )
        .unwrap();

        let gas = &resources[0];
        assert_approx_eq!(f64, gas.capacity.value(), 1000.0);
        assert_approx_eq!(f64, gas.fuel_cost.at(0).value(), 30.0, epsilon = 1e-9);
        assert_eq!(gas.om_cost_variable, VariableCost::from(vec![1.0, 2.0, 3.0]));
        assert_eq!(gas.ramp_up(), Some(PerTime(0.5)));
        assert_eq!(gas.ramp_down(), Some(DEFAULT_RAMP_RATE));

        let battery = &resources[1];
        assert_eq!(battery.category, ResourceCategory::Storage);
        assert_approx_eq!(f64, battery.capacity.value(), 0.01, epsilon = 1e-12);
        assert_approx_eq!(
            f64,
            battery.storage_capacity().unwrap().value(),
            0.04,
            epsilon = 1e-12
        );
        assert_approx_eq!(
            f64,
            battery.initial_state_of_charge().value(),
            0.02,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_read_resources_wrong_dimension() {
        let result = parse(
            r#"
            [[resources]]
            id = "gas"
            capacity = "100 MWh"
            "#,
        );
        assert_error!(result, "Invalid resource gas");
    }

    #[test]
    fn test_read_resources_series_length() {
        let result = parse(
            r#"
            [[resources]]
            id = "gas"
            capacity = 100
            fuel_cost = [1, 2]
            "#,
        );
        assert_error!(
            result,
            "Resource gas: fuel_cost has 2 values but there are 3 time steps"
        );
    }

    #[test]
    fn test_read_resources_efficiency_without_storage() {
        let result = parse(
            r#"
            [[resources]]
            id = "gas"
            capacity = 100
            efficiency = 0.9
            "#,
        );
        assert_error!(result, "Invalid resource gas");
    }

    #[test]
    fn test_read_resources_file() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RESOURCES_FILE_NAME)).unwrap();
            writeln!(file, "[[resources]]\nid = \"wind\"\ncapacity = 50\nrenewable = true").unwrap();
        }
        let resources = read_resources(dir.path(), 1).unwrap();
        assert_eq!(resources.len(), 1);
        assert!(resources[0].renewable);

        assert!(read_resources(&dir.path().join("missing"), 1).is_err());
    }
}
