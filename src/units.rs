//! This module defines the unit types used by the dispatch engine and their conversions.
//!
//! Every quantity is stored in canonical units: power in megawatts, time in hours and energy in
//! megawatt-hours. Money carries no currency. Values expressed in other units must be converted
//! explicitly, either through [`PowerUnit`] and [`TimeUnit`] or by parsing a quantity string with
//! [`validate`].
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::iter::Sum;
use std::ops::{Div, Mul, Neg};
use std::str::FromStr;
use strum::{EnumIter, EnumString};

/// The physical dimension of a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Dimension {
    /// A pure number (also used for money, which has no currency)
    #[strum(to_string = "dimensionless")]
    Dimensionless,
    /// Power, e.g. MW
    #[strum(to_string = "power")]
    Power,
    /// Time, e.g. hours
    #[strum(to_string = "time")]
    Time,
    /// Energy, e.g. MWh
    #[strum(to_string = "energy")]
    Energy,
    /// Inverse power, e.g. the unit of capital cost ($/MW)
    #[strum(to_string = "1/power")]
    PerPower,
    /// Inverse time, e.g. the unit of ramp rates (1/hr)
    #[strum(to_string = "1/time")]
    PerTime,
    /// Inverse energy, e.g. the unit of variable costs ($/MWh)
    #[strum(to_string = "1/energy")]
    PerEnergy,
}

impl Dimension {
    /// The dimension of the reciprocal of a quantity with this dimension
    fn inverse(self) -> Option<Self> {
        match self {
            Self::Power => Some(Self::PerPower),
            Self::Time => Some(Self::PerTime),
            Self::Energy => Some(Self::PerEnergy),
            Self::PerPower => Some(Self::Power),
            Self::PerTime => Some(Self::Time),
            Self::PerEnergy => Some(Self::Energy),
            Self::Dimensionless => None,
        }
    }
}

/// Common behaviour of all unit types
pub trait UnitType:
    fmt::Debug + Copy + PartialEq + PartialOrd + Mul<Dimensionless, Output = Self>
{
    /// The physical dimension of the unit
    const DIMENSION: Dimension;

    /// Create a new quantity from a value in canonical units
    fn new(value: f64) -> Self;

    /// The value in canonical units
    fn value(&self) -> f64;

    /// Whether the value is neither infinite nor NaN
    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }
}

macro_rules! unit_struct {
    ($name:ident, $dimension:expr) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl UnitType for $name {
            const DIMENSION: Dimension = $dimension;

            fn new(value: f64) -> Self {
                Self(value)
            }

            fn value(&self) -> f64 {
                self.0
            }
        }

        impl $name {
            /// The absolute value of the quantity
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// The larger of two quantities
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// The smaller of two quantities
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Total ordering of quantities (see [`f64::total_cmp`])
            pub fn total_cmp(&self, other: &Self) -> Ordering {
                self.0.total_cmp(&other.0)
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
pub struct Dimensionless(pub f64);

impl UnitType for Dimensionless {
    const DIMENSION: Dimension = Dimension::Dimensionless;

    fn new(value: f64) -> Self {
        Self(value)
    }

    fn value(&self) -> f64 {
        self.0
    }
}

impl Dimensionless {
    /// The square root of the quantity
    pub fn sqrt(self) -> Self {
        Self(self.0.sqrt())
    }
}

impl Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

// Base quantities
unit_struct!(Power, Dimension::Power);
unit_struct!(Time, Dimension::Time);
unit_struct!(Energy, Dimension::Energy);
unit_struct!(Money, Dimension::Dimensionless);

// Derived quantities
unit_struct!(MoneyPerEnergy, Dimension::PerEnergy);
unit_struct!(MoneyPerPower, Dimension::PerPower);
unit_struct!(PerTime, Dimension::PerTime);

// Multiplication rules
impl_mul!(Power, Time, Energy);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(PerTime, Time, Dimensionless);

// Division rules
impl_div!(Energy, Time, Power);
impl_div!(Energy, Power, Time);
impl_div!(Money, Energy, MoneyPerEnergy);

/// A unit of power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumIter, strum::Display)]
pub enum PowerUnit {
    /// Watts
    #[strum(to_string = "W")]
    Watt,
    /// Kilowatts
    #[strum(to_string = "kW")]
    Kilowatt,
    /// Megawatts (the canonical unit)
    #[default]
    #[strum(to_string = "MW")]
    Megawatt,
    /// Gigawatts
    #[strum(to_string = "GW")]
    Gigawatt,
}

impl PowerUnit {
    /// The size of this unit in megawatts
    pub fn in_megawatts(self) -> f64 {
        match self {
            Self::Watt => 1e-6,
            Self::Kilowatt => 1e-3,
            Self::Megawatt => 1.0,
            Self::Gigawatt => 1e3,
        }
    }

    /// Convert a value in this unit to a [`Power`]
    pub fn to_power(self, value: f64) -> Power {
        Power(value * self.in_megawatts())
    }

    /// Express a [`Power`] as a value in this unit
    pub fn from_power(self, power: Power) -> f64 {
        power.0 / self.in_megawatts()
    }
}

impl TryFrom<String> for PowerUnit {
    type Error = DimensionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse()
            .map_err(|_| DimensionError::UnknownUnit(value))
    }
}

impl<'de> Deserialize<'de> for PowerUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// A unit of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumIter, strum::Display)]
pub enum TimeUnit {
    /// Seconds
    #[strum(to_string = "s", serialize = "sec", serialize = "second", serialize = "seconds")]
    Second,
    /// Minutes
    #[strum(to_string = "min", serialize = "minute", serialize = "minutes")]
    Minute,
    /// Hours (the canonical unit)
    #[default]
    #[strum(to_string = "hr", serialize = "h", serialize = "hour", serialize = "hours")]
    Hour,
    /// Days
    #[strum(to_string = "day", serialize = "d", serialize = "days")]
    Day,
}

impl TimeUnit {
    /// The size of this unit in hours
    pub fn in_hours(self) -> f64 {
        match self {
            Self::Second => 1.0 / 3600.0,
            Self::Minute => 1.0 / 60.0,
            Self::Hour => 1.0,
            Self::Day => 24.0,
        }
    }

    /// Convert a value in this unit to a [`Time`]
    pub fn to_time(self, value: f64) -> Time {
        Time(value * self.in_hours())
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(DimensionError::UnknownUnit(value)))
    }
}

/// The units in which bare numbers are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitSettings {
    /// Unit of power
    pub power: PowerUnit,
    /// Unit of time
    pub time: TimeUnit,
}

impl UnitSettings {
    /// The canonical conversion factor for a bare number with the given dimension
    fn factor(&self, dimension: Dimension) -> f64 {
        let power = self.power.in_megawatts();
        let time = self.time.in_hours();
        match dimension {
            Dimension::Dimensionless => 1.0,
            Dimension::Power => power,
            Dimension::Time => time,
            Dimension::Energy => power * time,
            Dimension::PerPower => 1.0 / power,
            Dimension::PerTime => 1.0 / time,
            Dimension::PerEnergy => 1.0 / (power * time),
        }
    }
}

/// A quantity as supplied by a user: either a bare number or a string with units (e.g. "10 MW")
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    /// A value in the default units for its dimension
    Number(f64),
    /// A value followed by a unit expression
    Text(String),
}

impl From<f64> for QuantityInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for QuantityInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// An error raised when a quantity cannot be interpreted with the expected dimension
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionError {
    /// The numeric part of the quantity could not be read
    InvalidNumber(String),
    /// The unit expression is not recognised
    UnknownUnit(String),
    /// The quantity has a different dimension from the one expected
    Mismatch {
        /// The quantity as supplied
        input: String,
        /// The dimension required
        expected: Dimension,
        /// The dimension of the supplied unit
        found: Dimension,
    },
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber(input) => write!(f, "Could not interpret <{input}>"),
            Self::UnknownUnit(unit) => write!(f, "Unknown unit: {unit}"),
            Self::Mismatch {
                input,
                expected,
                found,
            } => write!(f, "{input} lacks units of {expected} (found {found})"),
        }
    }
}

impl Error for DimensionError {}

/// Parse a unit expression, returning its dimension and the factor to canonical units
fn parse_unit(expr: &str) -> Result<(Dimension, f64), DimensionError> {
    let unknown = || DimensionError::UnknownUnit(expr.to_string());
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.trim_start_matches('$');

    // Reciprocal forms: "1/MWh", "/MWh", "(MW*hr)**-1", "MW^-1"
    let reciprocal = compact
        .strip_prefix("1/")
        .or_else(|| compact.strip_prefix('/'))
        .or_else(|| compact.strip_suffix("**-1"))
        .or_else(|| compact.strip_suffix("^-1"));
    if let Some(inner) = reciprocal {
        let inner = inner.trim_start_matches('(').trim_end_matches(')');
        let (dimension, factor) = parse_unit(inner)?;
        let dimension = dimension.inverse().ok_or_else(unknown)?;
        return Ok((dimension, 1.0 / factor));
    }

    if let Ok(unit) = PowerUnit::from_str(compact) {
        return Ok((Dimension::Power, unit.in_megawatts()));
    }
    if let Ok(unit) = TimeUnit::from_str(compact) {
        return Ok((Dimension::Time, unit.in_hours()));
    }

    // Energy: "MWh", "kWh", "MW*hr", "MW*h"
    let (power, time) = compact
        .split_once('*')
        .or_else(|| compact.strip_suffix('h').map(|power| (power, "h")))
        .ok_or_else(unknown)?;
    let power = PowerUnit::from_str(power).map_err(|_| unknown())?;
    let time = TimeUnit::from_str(time).map_err(|_| unknown())?;

    Ok((Dimension::Energy, power.in_megawatts() * time.in_hours()))
}

/// Validate a quantity against an expected dimension.
///
/// Bare numbers are interpreted in the default units given by `units`. Strings must contain a
/// number, optionally followed by a unit expression, e.g. `"10 MW"`, `"25 1/MWh"` or `"0.5 1/hr"`.
///
/// # Returns
///
/// The value in canonical units or a [`DimensionError`].
pub fn validate_dimension(
    input: &QuantityInput,
    expected: Dimension,
    units: &UnitSettings,
) -> Result<f64, DimensionError> {
    let (value, factor) = match input {
        QuantityInput::Number(value) => (*value, units.factor(expected)),
        QuantityInput::Text(text) => {
            let text = text.trim();
            let (number, unit) = text
                .split_once(char::is_whitespace)
                .unwrap_or((text, ""));
            let value: f64 = number
                .parse()
                .map_err(|_| DimensionError::InvalidNumber(text.to_string()))?;

            if unit.trim().is_empty() {
                (value, units.factor(expected))
            } else {
                let (found, factor) = parse_unit(unit)?;
                if found != expected {
                    return Err(DimensionError::Mismatch {
                        input: text.to_string(),
                        expected,
                        found,
                    });
                }
                (value, factor)
            }
        }
    };

    if !value.is_finite() {
        return Err(DimensionError::InvalidNumber(format!("{input:?}")));
    }

    Ok(value * factor)
}

/// Validate a quantity and convert it to the unit type `U`
pub fn validate<U: UnitType>(input: &QuantityInput, units: &UnitSettings) -> Result<U, DimensionError> {
    validate_dimension(input, U::DIMENSION, units).map(U::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_unit_arithmetic() {
        let energy = Power(10.0) * Time(2.0);
        assert_eq!(energy, Energy(20.0));
        assert_eq!(energy / Time(4.0), Power(5.0));
        assert_eq!(energy / Power(5.0), Time(4.0));
        assert_eq!(MoneyPerEnergy(3.0) * energy, Money(60.0));
        assert_eq!(PerTime(0.5) * Time(2.0), Dimensionless(1.0));
        assert_eq!(Power(3.0) / Power(4.0), Dimensionless(0.75));
        assert_eq!(
            [Power(1.0), Power(2.5)].into_iter().sum::<Power>(),
            Power(3.5)
        );
    }

    #[test]
    fn test_power_unit_conversion() {
        assert_eq!(PowerUnit::Gigawatt.to_power(1.5), Power(1500.0));
        assert_approx_eq!(f64, PowerUnit::Kilowatt.from_power(Power(2.0)), 2000.0);
        assert_eq!("kW".parse::<PowerUnit>().unwrap(), PowerUnit::Kilowatt);
        assert_eq!(PowerUnit::Megawatt.to_string(), "MW");
        assert!(PowerUnit::try_from("fortnights".to_string()).is_err());
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Day.to_time(1.0), Time(24.0));
        assert_eq!("minutes".parse::<TimeUnit>().unwrap(), TimeUnit::Minute);
        assert_eq!("hr".parse::<TimeUnit>().unwrap(), TimeUnit::Hour);
    }

    #[rstest]
    #[case("10 MW", Dimension::Power, 10.0)]
    #[case("1 GW", Dimension::Power, 1000.0)]
    #[case("500 kW", Dimension::Power, 0.5)]
    #[case("10", Dimension::Power, 10.0)]
    #[case("2 MWh", Dimension::Energy, 2.0)]
    #[case("10 MW*hr", Dimension::Energy, 10.0)]
    #[case("1000 kWh", Dimension::Energy, 1.0)]
    #[case("30 min", Dimension::Time, 0.5)]
    #[case("1 day", Dimension::Time, 24.0)]
    #[case("25 1/MWh", Dimension::PerEnergy, 25.0)]
    #[case("25 $/MWh", Dimension::PerEnergy, 25.0)]
    #[case("0.025 /kWh", Dimension::PerEnergy, 25.0)]
    #[case("10 (MW*hr)**-1", Dimension::PerEnergy, 10.0)]
    #[case("10 MW**-1", Dimension::PerPower, 10.0)]
    #[case("0.5 1/hr", Dimension::PerTime, 0.5)]
    fn test_validate_dimension_valid(
        #[case] input: &str,
        #[case] dimension: Dimension,
        #[case] expected: f64,
    ) {
        let value =
            validate_dimension(&input.into(), dimension, &UnitSettings::default()).unwrap();
        assert_approx_eq!(f64, value, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let err = validate_dimension(
            &"10 MW*hr".into(),
            Dimension::Power,
            &UnitSettings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DimensionError::Mismatch {
                input: "10 MW*hr".into(),
                expected: Dimension::Power,
                found: Dimension::Energy
            }
        );
        assert_eq!(err.to_string(), "10 MW*hr lacks units of power (found energy)");
    }

    #[rstest]
    #[case("10 fortnights")]
    #[case("ten MW")]
    #[case("inf MW")]
    fn test_validate_dimension_invalid(#[case] input: &str) {
        assert!(
            validate_dimension(&input.into(), Dimension::Power, &UnitSettings::default())
                .is_err()
        );
    }

    #[test]
    fn test_validate_number_uses_default_units() {
        let units = UnitSettings {
            power: PowerUnit::Kilowatt,
            time: TimeUnit::Minute,
        };
        let power: Power = validate(&QuantityInput::Number(2000.0), &units).unwrap();
        assert_approx_eq!(f64, power.value(), 2.0);

        // 1/60 $/kWmin == 1 $/kWh == 1000 $/MWh
        let cost: MoneyPerEnergy = validate(&QuantityInput::Number(1.0 / 60.0), &units).unwrap();
        assert_approx_eq!(f64, cost.value(), 1000.0, epsilon = 1e-9);
    }
}
