//! Engine samples decoded from a flight's record stream.
//!
//! Samples are simple structures with public attributes. One sample is
//! emitted per compressed record, carrying the absolute value of every
//! field the monitor tracks.
//!
//! ```
//! use jpi::Sample;
//! let sample = Sample::default();
//! assert_eq!(0., sample.egt[0]);
//! assert_eq!(None, sample.lat);
//! ```
//!
//! Temperature fields are in the unit requested when the file was opened
//! (or the unit the monitor recorded, for
//! [TemperatureUnit::Original](crate::TemperatureUnit::Original)). Fuel
//! flow and volts have already been scaled from the wire's tenths.

use chrono::NaiveDateTime;

/// One decoded engine sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    /// The virtual-clock timestamp of this sample.
    pub time: NaiveDateTime,

    /// Exhaust gas temperature per cylinder.
    pub egt: [f64; 6],

    /// Cylinder head temperature per cylinder.
    pub cht: [f64; 6],

    /// Shock-cooling rate, in degrees per minute.
    pub cld: f64,

    /// Oil temperature.
    pub oil_t: f64,

    /// The pilot-initiated event marker.
    pub mark: f64,

    /// Oil pressure, in psi.
    pub oil_p: f64,

    /// Carburetor temperature.
    pub crb: f64,

    /// Bus voltage.
    pub volt: f64,

    /// Outside air temperature.
    pub oat: f64,

    /// Fuel used, in tenths of a gallon.
    pub usd: f64,

    /// Fuel flow, in gallons per hour.
    pub ff: f64,

    /// Percent horsepower.
    pub hp: f64,

    /// Manifold pressure, in tenths of inHg.
    pub map: f64,

    /// Engine speed, in rpm.
    pub rpm: f64,

    /// The Hobbs engine-hours accumulator.
    pub hours: f64,

    /// GPS altitude, in feet.
    pub alt: f64,

    /// GPS ground speed, in knots.
    pub gspd: f64,

    /// Latitude in degrees, when the GPS filter has a stable fix.
    pub lat: Option<f64>,

    /// Longitude in degrees, when the GPS filter has a stable fix.
    pub long: Option<f64>,
}
