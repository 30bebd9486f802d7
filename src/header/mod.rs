//! A [Header] describes everything the ASCII part of a JPI file records
//! about the download.
//!
//! EDM files start with CR-LF delimited `$X,...*HH` lines: the aircraft
//! registration, alarm and fuel configuration, the download timestamp, and
//! one `$D` line per stored flight. The `$L` line closes the header; the
//! delta-compressed binary flight data starts on the next byte.
//!
//! ```
//! use jpi::Header;
//!
//! let bytes = b"$U,N73898*0A\r\n$D, 1197,  250*5D\r\n$L, 49*4D\r\n";
//! let (header, offset) = Header::parse(bytes).unwrap();
//! assert_eq!(Some("N73898"), header.tail_number());
//! assert_eq!(1, header.flight_index().len());
//! assert_eq!(bytes.len(), offset);
//! ```

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

pub(crate) mod record;

use self::record::Record;

/// File-level metadata parsed from the ASCII header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    tail_number: Option<String>,
    config: Option<Config>,
    alarm_limits: AlarmLimits,
    fuel_config: FuelConfig,
    download_time: Option<NaiveDateTime>,
    flight_index: Vec<FlightIndexEntry>,
}

/// Alarm thresholds from the `$A` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlarmLimits {
    /// High bus voltage, in tenths of a volt.
    pub volts_hi: u16,
    /// Low bus voltage, in tenths of a volt.
    pub volts_lo: u16,
    /// Maximum EGT spread between cylinders.
    pub dif: u16,
    /// Cylinder head temperature limit.
    pub cht: u16,
    /// Shock-cooling rate limit, in degrees per minute.
    pub cld: u16,
    /// Turbine inlet temperature limit.
    pub tit: u16,
    /// High oil temperature limit.
    pub oil_hi: u16,
    /// Low oil temperature limit.
    pub oil_lo: u16,
}

/// Model number and feature flags from the `$C` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// The EDM model number, e.g. 830.
    pub model_number: u16,
    /// Low word of the 32-bit feature flags.
    pub flags_lo: u16,
    /// High word of the 32-bit feature flags.
    pub flags_hi: u16,
    /// Undocumented; present in observed files.
    pub unknown: u16,
    /// Firmware version times 100.
    pub firmware_version: u16,
}

/// Fuel-computer configuration from the `$F` record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FuelConfig {
    /// Usable fuel at empty warning, in tenths of a gallon.
    pub empty: u16,
    /// Tank capacity, in tenths of a gallon.
    pub full: u16,
    /// Low-fuel warning threshold, in tenths of a gallon.
    pub warning: u16,
    /// Fuel-flow transducer calibration constant.
    pub k_factor: u16,
    /// Calibration constant for the second transducer, when fitted.
    pub k_factor2: u16,
}

/// One `$D` record: a stored flight and the size of its data area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlightIndexEntry {
    /// The flight number, matching word 0 of the flight's preamble.
    pub flight_number: u16,
    /// The length of the flight's data area in 16-bit words.
    ///
    /// This is the ceiling of the byte length over two, so the data area
    /// is either `data_words * 2` or one byte shorter.
    pub data_words: u16,
}

/// The raw `$T` download timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DownloadTime {
    pub(crate) month: u16,
    pub(crate) day: u16,
    pub(crate) year: u16,
    pub(crate) hour: u16,
    pub(crate) minute: u16,
}

impl FlightIndexEntry {
    /// Returns the word-rounded byte length of this flight's data area.
    pub fn data_bytes(&self) -> usize {
        usize::from(self.data_words) * 2
    }
}

impl DownloadTime {
    /// Two-digit years pivot at 50.
    fn to_date_time(self) -> Option<NaiveDateTime> {
        let year = match i32::from(self.year) {
            year @ 0..=49 => 2000 + year,
            year @ 50..=99 => 1900 + year,
            year => year,
        };
        NaiveDate::from_ymd_opt(year, u32::from(self.month), u32::from(self.day))
            .and_then(|date| date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0))
    }
}

impl Header {
    /// Parses the ASCII header from the front of a file.
    ///
    /// On success, also returns the offset of the first byte after the `$L`
    /// line, where the binary flight data starts.
    ///
    /// # Examples
    ///
    /// ```
    /// use jpi::Header;
    /// let (header, offset) = Header::parse(b"$U,N73898*0A\r\n$L, 49*4D\r\n").unwrap();
    /// assert_eq!(Some("N73898"), header.tail_number());
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<(Header, usize)> {
        if !bytes.starts_with(b"$U") {
            return Err(Error::FileSignature);
        }
        let mut header = Header::default();
        let mut offset = 0;
        while offset < bytes.len() && bytes[offset] == b'$' {
            let (line, next) = match bytes[offset..].iter().position(|&byte| byte == b'\n') {
                Some(newline) => {
                    let mut line = &bytes[offset..offset + newline];
                    if line.last() == Some(&b'\r') {
                        line = &line[..line.len() - 1];
                    }
                    (line, offset + newline + 1)
                }
                None => (&bytes[offset..], bytes.len()),
            };
            offset = next;
            match Record::parse(line)? {
                Record::TailNumber(tail) => {
                    header.tail_number = Some(tail).filter(|tail| !tail.is_empty());
                }
                Record::AlarmLimits(limits) => header.alarm_limits = limits,
                Record::Config(config) => header.config = Some(config),
                Record::FlightIndex(entry) => header.flight_index.push(entry),
                Record::FuelConfig(fuel) => header.fuel_config = fuel,
                Record::DownloadTime(time) => header.download_time = time.to_date_time(),
                Record::EndOfHeader => return Ok((header, offset)),
                Record::Unused => {}
            }
        }
        Err(Error::MissingEndOfHeader)
    }

    /// Returns the aircraft registration, if the file carried one.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jpi::Header;
    /// let (header, _) = Header::parse(b"$U,N73898*0A\r\n$L, 49*4D\r\n").unwrap();
    /// assert_eq!(Some("N73898"), header.tail_number());
    /// ```
    pub fn tail_number(&self) -> Option<&str> {
        self.tail_number.as_deref()
    }

    /// Returns the EDM model number, or 0 if the file had no `$C` record.
    pub fn model_number(&self) -> u16 {
        self.config.map_or(0, |config| config.model_number)
    }

    /// Returns the model as a display string, `"EDM-<n>"` or `"Unknown"`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jpi::Header;
    /// let (header, _) = Header::parse(b"$U,N73898*0A\r\n$L, 49*4D\r\n").unwrap();
    /// assert_eq!("Unknown", header.model_string());
    /// ```
    pub fn model_string(&self) -> String {
        match self.config {
            Some(config) => format!("EDM-{}", config.model_number),
            None => "Unknown".to_string(),
        }
    }

    /// Returns the 32-bit feature flags word from the `$C` record.
    pub fn feature_flags(&self) -> u32 {
        self.config.map_or(0, |config| {
            u32::from(config.flags_lo) | u32::from(config.flags_hi) << 16
        })
    }

    /// Returns the configured alarm thresholds.
    pub fn alarm_limits(&self) -> AlarmLimits {
        self.alarm_limits
    }

    /// Returns the fuel-computer configuration.
    pub fn fuel_config(&self) -> FuelConfig {
        self.fuel_config
    }

    /// Returns when the file was downloaded from the monitor.
    pub fn download_time(&self) -> Option<NaiveDateTime> {
        self.download_time
    }

    /// Returns the flight index in the order the `$D` records appeared.
    ///
    /// Flights are stored oldest first; the binary data areas follow the
    /// same order.
    pub fn flight_index(&self) -> &[FlightIndexEntry] {
        &self.flight_index
    }
}
