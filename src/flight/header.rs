//! The 28-byte preamble at the front of each flight's data area.

use crate::Result;
use byteorder::{BigEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;

/// Bit 28 of the flags word: source temperatures are Fahrenheit.
const FAHRENHEIT_FLAG: u32 = 1 << 28;

/// Positions are recorded in units of 1/6000 degree (hundredths of a
/// minute).
pub(crate) const POSITION_UNITS_PER_DEGREE: f64 = 6000.0;

/// The per-flight preamble: fourteen big-endian 16-bit words.
///
/// Thirty-two-bit quantities (the flags word and the initial position) are
/// stored low word first.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlightHeader {
    /// The flight number; matches the `$D` index entry.
    pub flight_number: u16,

    /// The 32-bit flags word.
    pub flags: u32,

    /// Initial latitude, in 1/6000 degree; 0 when the monitor had no GPS.
    pub initial_lat: i32,

    /// Initial longitude, in 1/6000 degree; 0 when the monitor had no GPS.
    pub initial_long: i32,

    /// The recording interval, in seconds.
    pub interval_secs: u16,

    /// Packed start date: day in bits 0-4, month in bits 5-8, year since
    /// 2000 in bits 9-15.
    pub date: u16,

    /// Packed start time: two-second units in bits 0-4, minutes in bits
    /// 5-10, hours in bits 11-15.
    pub time: u16,
}

impl FlightHeader {
    /// The preamble length in bytes.
    pub(crate) const SIZE: usize = 28;

    /// Reads a flight header from a `Read`.
    ///
    /// # Examples
    ///
    /// ```
    /// use jpi::flight::FlightHeader;
    /// use std::io::Cursor;
    ///
    /// let mut bytes = [0u8; 28];
    /// bytes[1] = 42; // flight number, big-endian word 0
    /// let header = FlightHeader::read_from(Cursor::new(bytes)).unwrap();
    /// assert_eq!(42, header.flight_number);
    /// ```
    pub fn read_from<R: Read>(mut read: R) -> Result<FlightHeader> {
        let mut words = [0u16; 14];
        for word in &mut words {
            *word = read.read_u16::<BigEndian>()?;
        }
        Ok(FlightHeader {
            flight_number: words[0],
            flags: u32::from(words[1]) | u32::from(words[2]) << 16,
            initial_lat: (u32::from(words[6]) | u32::from(words[7]) << 16) as i32,
            initial_long: (u32::from(words[8]) | u32::from(words[9]) << 16) as i32,
            interval_secs: words[11],
            date: words[12],
            time: words[13],
        })
    }

    /// Returns true if the monitor recorded temperatures in Fahrenheit.
    pub fn is_fahrenheit(&self) -> bool {
        self.flags & FAHRENHEIT_FLAG != 0
    }

    /// Returns the initial position in degrees, or `None` when the
    /// preamble carried no GPS fix.
    pub fn initial_position(&self) -> Option<(f64, f64)> {
        if self.initial_lat == 0 && self.initial_long == 0 {
            None
        } else {
            Some((
                f64::from(self.initial_lat) / POSITION_UNITS_PER_DEGREE,
                f64::from(self.initial_long) / POSITION_UNITS_PER_DEGREE,
            ))
        }
    }

    /// Returns the flight's start time, or `None` for an impossible date.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year(), u32::from(self.month()), u32::from(self.day()))
            .and_then(|date| {
                date.and_hms_opt(
                    u32::from(self.hour()),
                    u32::from(self.minute()),
                    u32::from(self.second()),
                )
            })
    }

    /// Does this look like a real flight header?
    ///
    /// The flight locator probes candidate offsets and accepts one only if
    /// the preamble there passes these range checks.
    pub(crate) fn is_plausible(&self) -> bool {
        (1..=60).contains(&self.interval_secs)
            && (1..=31).contains(&self.day())
            && (1..=12).contains(&self.month())
            && (2000..=2050).contains(&self.year())
            && self.hour() <= 23
            && self.minute() <= 59
            && self.second() <= 59
    }

    fn day(&self) -> u16 {
        self.date & 0x1F
    }

    fn month(&self) -> u16 {
        self.date >> 5 & 0x0F
    }

    fn year(&self) -> i32 {
        2000 + i32::from(self.date >> 9)
    }

    fn hour(&self) -> u16 {
        self.time >> 11
    }

    fn minute(&self) -> u16 {
        self.time >> 5 & 0x3F
    }

    fn second(&self) -> u16 {
        (self.time & 0x1F) * 2
    }
}

/// Assembles preamble bytes for in-memory test files.
#[cfg(test)]
pub(crate) fn preamble_bytes(header: &FlightHeader) -> Vec<u8> {
    use byteorder::WriteBytesExt;

    let words = [
        header.flight_number,
        (header.flags & 0xFFFF) as u16,
        (header.flags >> 16) as u16,
        0,
        0,
        0,
        (header.initial_lat as u32 & 0xFFFF) as u16,
        (header.initial_lat as u32 >> 16) as u16,
        (header.initial_long as u32 & 0xFFFF) as u16,
        (header.initial_long as u32 >> 16) as u16,
        0,
        header.interval_secs,
        header.date,
        header.time,
    ];
    let mut bytes = Vec::with_capacity(FlightHeader::SIZE);
    for word in words {
        bytes.write_u16::<BigEndian>(word).unwrap();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn example() -> FlightHeader {
        FlightHeader {
            flight_number: 1197,
            flags: 1 << 28,
            initial_lat: 201044,
            initial_long: -673704,
            interval_secs: 6,
            date: 19 | 7 << 5 | 25 << 9,
            time: 15 | 52 << 5 | 14 << 11,
        }
    }

    #[test]
    fn round_trip() {
        let header = example();
        let bytes = preamble_bytes(&header);
        assert_eq!(FlightHeader::SIZE, bytes.len());
        assert_eq!(header, FlightHeader::read_from(Cursor::new(bytes)).unwrap());
    }

    #[test]
    fn start_time() {
        assert_eq!(
            NaiveDate::from_ymd_opt(2025, 7, 19)
                .unwrap()
                .and_hms_opt(14, 52, 30)
                .unwrap(),
            example().start_time().unwrap()
        );
    }

    #[test]
    fn fahrenheit_flag() {
        assert!(example().is_fahrenheit());
        let mut header = example();
        header.flags = 0;
        assert!(!header.is_fahrenheit());
    }

    #[test]
    fn initial_position() {
        let (lat, long) = example().initial_position().unwrap();
        assert!((lat - 33.5073).abs() < 0.001);
        assert!((long + 112.284).abs() < 0.001);

        let mut header = example();
        header.initial_lat = 0;
        header.initial_long = 0;
        assert_eq!(None, header.initial_position());
    }

    #[test]
    fn plausibility() {
        assert!(example().is_plausible());

        let mut header = example();
        header.interval_secs = 0;
        assert!(!header.is_plausible());
        header.interval_secs = 61;
        assert!(!header.is_plausible());

        let mut header = example();
        header.date = 0; // day and month zero
        assert!(!header.is_plausible());

        let mut header = example();
        header.date = 19 | 7 << 5 | 51 << 9; // year 2051
        assert!(!header.is_plausible());

        let mut header = example();
        header.time = 24 << 11;
        assert!(!header.is_plausible());
    }

    #[test]
    fn truncated_read() {
        assert!(FlightHeader::read_from(Cursor::new([0u8; 27])).is_err());
    }
}
