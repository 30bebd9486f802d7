//! One decoded flight.
//!
//! A [Flight] is produced from its slice of the binary area: the 28-byte
//! preamble, then the delta-compressed record stream. Faults inside a
//! flight never escape as errors; they are collected as warnings and the
//! flight keeps whatever samples decoded cleanly, possibly none.

mod decoder;
mod gps;
mod header;

pub use self::header::FlightHeader;

use self::decoder::Decoder;
use crate::sample::Sample;
use crate::temperature::TemperatureUnit;
use chrono::NaiveDateTime;
use std::io::{Cursor, Write};

/// The recording interval used when the preamble's value is implausible.
const DEFAULT_INTERVAL_SECS: u16 = 6;

/// The CSV column schema, fixed across models.
const CSV_COLUMNS: &str = "DATE,EGT1,EGT2,EGT3,EGT4,EGT5,EGT6,\
                           CHT1,CHT2,CHT3,CHT4,CHT5,CHT6,\
                           CLD,OIL_T,MARK,OIL_P,CRB,VOLT,OAT,USD,FF,HP,MAP,\
                           RPM,HOURS,ALT,GSPD,LAT,LONG";

/// One flight's decoded samples and everything learned along the way.
#[derive(Clone, Debug, Default)]
pub struct Flight {
    number: u16,
    header: Option<FlightHeader>,
    start: Option<NaiveDateTime>,
    interval_secs: u16,
    samples: Vec<Sample>,
    warnings: Vec<String>,
}

impl Flight {
    /// A flight whose data could not be found or used at all.
    pub(crate) fn unusable(number: u16, warnings: Vec<String>) -> Flight {
        Flight {
            number,
            interval_secs: DEFAULT_INTERVAL_SECS,
            warnings,
            ..Default::default()
        }
    }

    /// Decodes a flight from its data area.
    ///
    /// `data` spans the preamble and the record stream; `warnings` carries
    /// anything the locator already noticed about this flight.
    pub(crate) fn decode(
        number: u16,
        data: &[u8],
        unit: TemperatureUnit,
        mut warnings: Vec<String>,
    ) -> Flight {
        if data.len() < FlightHeader::SIZE {
            push_warning(
                &mut warnings,
                number,
                format!("Flight data too short ({} bytes)", data.len()),
            );
            return Flight::unusable(number, warnings);
        }
        let header = match FlightHeader::read_from(Cursor::new(data)) {
            Ok(header) => header,
            Err(err) => {
                push_warning(&mut warnings, number, format!("Parse error: {}", err));
                return Flight::unusable(number, warnings);
            }
        };
        let start = header.start_time();
        if start.is_none() {
            push_warning(
                &mut warnings,
                number,
                "Invalid date/time in flight header".to_string(),
            );
        }
        let interval_secs = if (1..=60).contains(&header.interval_secs) {
            header.interval_secs
        } else {
            push_warning(
                &mut warnings,
                number,
                format!(
                    "Invalid recording interval ({}), using default of 6 seconds",
                    header.interval_secs
                ),
            );
            DEFAULT_INTERVAL_SECS
        };
        if data.len() < FlightHeader::SIZE + 6 {
            push_warning(
                &mut warnings,
                number,
                "No data records present after flight header".to_string(),
            );
        }
        let decoder = Decoder::new(&header, start.unwrap_or_default(), interval_secs, unit);
        let (samples, decode_warnings) = decoder.decode(data);
        warnings.extend(decode_warnings);
        Flight {
            number,
            header: Some(header),
            start,
            interval_secs,
            samples,
            warnings,
        }
    }

    /// Returns this flight's number.
    pub fn number(&self) -> u16 {
        self.number
    }

    /// Returns the decoded preamble, if one was found.
    pub fn header(&self) -> Option<&FlightHeader> {
        self.header.as_ref()
    }

    /// Returns when the flight started, if the preamble's date made sense.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Returns the seconds between samples.
    ///
    /// Falls back to 6 when the preamble's value is implausible; the
    /// fallback is noted in [parse_warnings](Flight::parse_warnings).
    pub fn interval_secs(&self) -> u16 {
        self.interval_secs
    }

    /// Returns the decoded samples, in wire order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Returns the warnings collected while locating and decoding.
    pub fn parse_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns true if this flight has a start date and at least one
    /// sample.
    pub fn is_valid(&self) -> bool {
        self.start.is_some() && !self.samples.is_empty()
    }

    /// Returns true if no samples decoded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns true if any sample carries a GPS position.
    pub fn has_gps(&self) -> bool {
        self.samples.iter().any(|sample| sample.lat.is_some())
    }

    /// Returns the recorded duration, in hours.
    pub fn duration_hours(&self) -> f64 {
        self.samples.len() as f64 * f64::from(self.interval_secs) / 3600.0
    }

    /// Renders the flight as CSV.
    ///
    /// One row per sample in the fixed column schema; GPS columns are
    /// empty until the filter trusts a position.
    ///
    /// # Examples
    ///
    /// ```
    /// use jpi::Flight;
    /// let csv = Flight::default().to_csv();
    /// assert!(csv.starts_with("DATE,EGT1,"));
    /// ```
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_COLUMNS);
        csv.push('\n');
        for sample in &self.samples {
            csv.push_str(&sample.time.format("%Y-%m-%d %H:%M:%S").to_string());
            for value in sample.egt {
                push_field(&mut csv, value);
            }
            for value in sample.cht {
                push_field(&mut csv, value);
            }
            for value in [
                sample.cld,
                sample.oil_t,
                sample.mark,
                sample.oil_p,
                sample.crb,
                sample.volt,
                sample.oat,
                sample.usd,
                sample.ff,
                sample.hp,
                sample.map,
                sample.rpm,
                sample.hours,
                sample.alt,
                sample.gspd,
            ] {
                push_field(&mut csv, value);
            }
            for value in [sample.lat, sample.long] {
                csv.push(',');
                if let Some(value) = value {
                    csv.push_str(&value.to_string());
                }
            }
            csv.push('\n');
        }
        csv
    }

    /// Writes the CSV rendering to a [Write].
    pub fn to_csv_into<W: Write>(&self, mut write: W) -> crate::Result<()> {
        write.write_all(self.to_csv().as_bytes())?;
        Ok(())
    }
}

fn push_field(csv: &mut String, value: f64) {
    csv.push(',');
    csv.push_str(&value.to_string());
}

fn push_warning(warnings: &mut Vec<String>, number: u16, warning: String) {
    log::warn!("flight {}: {}", number, warning);
    warnings.push(warning);
}
