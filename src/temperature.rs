//! Temperature output units.
//!
//! EDM monitors record temperatures in either Fahrenheit or Celsius,
//! selected by the installer and reported by bit 28 of the flight flags.
//! A [Reader](crate::Reader) can be asked to convert every temperature
//! field to a fixed unit, or to pass the recorded values through untouched.

/// The unit requested for temperature fields in decoded samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemperatureUnit {
    /// Leave temperatures in whatever unit the monitor recorded.
    #[default]
    Original,

    /// Convert all temperature fields to degrees Celsius.
    Celsius,

    /// Convert all temperature fields to degrees Fahrenheit.
    Fahrenheit,
}

pub(crate) fn fahrenheit_to_celsius(degrees: f64) -> f64 {
    (degrees - 32.0) * 5.0 / 9.0
}

pub(crate) fn celsius_to_fahrenheit(degrees: f64) -> f64 {
    degrees * 9.0 / 5.0 + 32.0
}
