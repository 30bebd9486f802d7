//! Native library for reading flight data recorded by [JPI
//! EDM](https://www.jpinstruments.com/) engine monitors.
//!
//! EDM monitors (700/730/830/900/930/960) log engine temperatures,
//! pressures, fuel flow, rpm, and GPS position while the engine runs. A
//! download produces a `.JPI` file: an ASCII metadata header followed by a
//! delta-compressed binary record stream for one or more flights.
//!
//! # Reading flights
//!
//! Use a [Reader] to open a file and pull decoded flights out of it.
//! Flights decode lazily and are cached by flight number:
//!
//! ```
//! use jpi::{Reader, TemperatureUnit};
//!
//! let mut reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
//! println!("{} ({})", reader.tail_number().unwrap(), reader.model_string());
//! for flight in reader.flights() {
//!     println!("flight {}: {} samples", flight.number(), flight.samples().len());
//! }
//! ```
//!
//! Decoding never fails past the header: damage inside a flight's data
//! area is collected as warnings on that [Flight], which keeps whatever
//! samples decoded cleanly.
//!
//! # Temperature units
//!
//! Monitors record temperatures in Fahrenheit or Celsius depending on
//! installer configuration. Ask for [TemperatureUnit::Celsius] or
//! [TemperatureUnit::Fahrenheit] to convert every temperature field on the
//! way out, or [TemperatureUnit::Original] to pass recorded values
//! through.
//!
//! # CSV export
//!
//! ```
//! # use jpi::{Reader, TemperatureUnit};
//! let mut reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
//! let csv = reader.flight(1197).unwrap().to_csv();
//! assert!(csv.starts_with("DATE,EGT1,"));
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

mod error;
pub mod flight;
pub mod header;
mod reader;
mod sample;
mod temperature;
mod utils;

pub use crate::{
    error::Error, flight::Flight, header::Header, reader::Reader, sample::Sample,
    temperature::TemperatureUnit,
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
