//! Fixtures for tests

use crate::resource::Resource;
use crate::units::{Dimensionless, Energy, Power, Time};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A 100 MW gas plant with a fuel cost of 30 per MWh
#[fixture]
pub fn gas_plant() -> Resource {
    Resource::new("gas", Power(100.0)).with_fuel_cost(30.0)
}

/// A 10 MW, four-hour battery which starts half full
#[fixture]
pub fn battery() -> Resource {
    Resource::new("battery", Power(10.0)).with_storage(
        Time(4.0),
        Dimensionless(0.81),
        Energy(20.0),
    )
}
