//! Read decoded flights out of a JPI file.
//!
//! A [Reader] owns the file's bytes, parses the ASCII header up front, and
//! decodes flights lazily: each flight is decoded on first request and
//! cached by flight number. Decoded flights are immutable. To re-decode
//! with a different temperature unit, build a new reader.
//!
//! ```
//! use jpi::{Reader, TemperatureUnit};
//!
//! let bytes = b"$U,N73898*0A\r\n$L, 49*4D\r\n".to_vec();
//! let mut reader = Reader::new(bytes, TemperatureUnit::Original).unwrap();
//! assert_eq!(Some("N73898"), reader.tail_number());
//! assert_eq!(0, reader.flight_count());
//! ```

use crate::flight::{Flight, FlightHeader};
use crate::header::Header;
use crate::temperature::TemperatureUnit;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Reads JPI flight data.
#[derive(Debug)]
pub struct Reader {
    bytes: Vec<u8>,
    header: Header,
    unit: TemperatureUnit,
    locations: Vec<Option<usize>>,
    cache: HashMap<u16, Flight>,
}

impl Reader {
    /// Creates a reader over a whole file's bytes.
    ///
    /// Fails on structural faults only: a missing `$U` signature, a header
    /// checksum mismatch, or a header with no `$L` record. Faults inside a
    /// flight's data area surface later, as warnings on that flight.
    ///
    /// # Examples
    ///
    /// ```
    /// use jpi::{Reader, TemperatureUnit};
    /// let reader = Reader::new(b"$U,N73898*0A\r\n$L, 49*4D\r\n".to_vec(), TemperatureUnit::Original);
    /// assert!(reader.is_ok());
    /// assert!(Reader::new(b"%PDF-1.4".to_vec(), TemperatureUnit::Original).is_err());
    /// ```
    pub fn new(bytes: Vec<u8>, unit: TemperatureUnit) -> Result<Reader> {
        let (header, binary_offset) = Header::parse(&bytes)?;
        let locations = locate_flights(&bytes, &header, binary_offset);
        Ok(Reader {
            bytes,
            header,
            unit,
            locations,
            cache: HashMap::new(),
        })
    }

    /// Creates a reader from a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use jpi::{Reader, TemperatureUnit};
    /// let reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
    /// assert_eq!("EDM-830", reader.model_string());
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P, unit: TemperatureUnit) -> Result<Reader> {
        fs::read(path)
            .map_err(Error::from)
            .and_then(|bytes| Reader::new(bytes, unit))
    }

    /// Returns the parsed file header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the aircraft registration.
    pub fn tail_number(&self) -> Option<&str> {
        self.header.tail_number()
    }

    /// Returns the monitor model, `"EDM-<n>"` or `"Unknown"`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jpi::{Reader, TemperatureUnit};
    /// let reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
    /// assert_eq!("EDM-830", reader.model_string());
    /// ```
    pub fn model_string(&self) -> String {
        self.header.model_string()
    }

    /// Returns the number of flights the file's index advertises.
    pub fn flight_count(&self) -> usize {
        self.header.flight_index().len()
    }

    /// Returns one flight by flight number, decoding it on first request.
    ///
    /// Returns `None` for a number that is not in the file's index; a
    /// flight whose data is damaged still decodes, to an empty flight with
    /// warnings attached.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jpi::{Reader, TemperatureUnit};
    /// let mut reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
    /// let flight = reader.flight(1197).unwrap();
    /// assert!(flight.is_valid());
    /// assert!(reader.flight(9999).is_none());
    /// ```
    pub fn flight(&mut self, number: u16) -> Option<&Flight> {
        let index = self
            .header
            .flight_index()
            .iter()
            .position(|entry| entry.flight_number == number)?;
        if !self.cache.contains_key(&number) {
            let flight = self.decode_flight(index);
            let _ = self.cache.insert(number, flight);
        }
        self.cache.get(&number)
    }

    /// Decodes every flight and returns them in index order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use jpi::{Reader, TemperatureUnit};
    /// let mut reader = Reader::from_path("tests/data/n73898.jpi", TemperatureUnit::Original).unwrap();
    /// let flights = reader.flights();
    /// assert_eq!(3, flights.len());
    /// ```
    pub fn flights(&mut self) -> Vec<&Flight> {
        let numbers: Vec<u16> = self
            .header
            .flight_index()
            .iter()
            .map(|entry| entry.flight_number)
            .collect();
        for (index, number) in numbers.iter().enumerate() {
            if !self.cache.contains_key(number) {
                let flight = self.decode_flight(index);
                let _ = self.cache.insert(*number, flight);
            }
        }
        numbers
            .iter()
            .filter_map(|number| self.cache.get(number))
            .collect()
    }

    fn decode_flight(&self, index: usize) -> Flight {
        let entry = self.header.flight_index()[index];
        match self.locations[index] {
            None => {
                let warning = "Could not locate flight data start marker".to_string();
                log::warn!("flight {}: {}", entry.flight_number, warning);
                Flight::unusable(entry.flight_number, vec![warning])
            }
            Some(start) => {
                let mut warnings = Vec::new();
                let mut end = start + entry.data_bytes();
                if end > self.bytes.len() {
                    let warning = format!(
                        "Flight data extends beyond file (offset {} + {} > {})",
                        start,
                        entry.data_bytes(),
                        self.bytes.len()
                    );
                    log::warn!("flight {}: {}", entry.flight_number, warning);
                    warnings.push(warning);
                    end = self.bytes.len();
                }
                Flight::decode(entry.flight_number, &self.bytes[start..end], self.unit, warnings)
            }
        }
    }
}

/// Finds the starting byte of each indexed flight.
///
/// `data_words` is the ceiling of the true byte length over two, so each
/// flight begins either exactly where the previous one's word-rounded
/// length says, or one byte earlier. Both positions are probed; a probe
/// wins by carrying the expected big-endian flight number and a plausible
/// preamble. When the preamble check rejects both probes, a bare
/// flight-number match is still accepted so that flights with damaged
/// preambles decode (and collect their own warnings) instead of being
/// skipped.
fn locate_flights(bytes: &[u8], header: &Header, binary_offset: usize) -> Vec<Option<usize>> {
    let mut locations = Vec::with_capacity(header.flight_index().len());
    let mut cursor = binary_offset;
    for entry in header.flight_index() {
        let probes = [cursor, cursor.saturating_sub(1)];
        let matches_number = |position: usize| {
            position >= binary_offset
                && bytes.len() >= position + 2
                && bytes[position..position + 2] == entry.flight_number.to_be_bytes()
        };
        let mut location = probes
            .into_iter()
            .find(|&position| matches_number(position) && plausible_preamble(bytes, position));
        if location.is_none() {
            location = probes.into_iter().find(|&position| matches_number(position));
        }
        if let Some(position) = location {
            cursor = position + entry.data_bytes();
        } else {
            cursor += entry.data_bytes();
        }
        locations.push(location);
    }
    locations
}

fn plausible_preamble(bytes: &[u8], position: usize) -> bool {
    bytes.len() >= position + FlightHeader::SIZE
        && FlightHeader::read_from(Cursor::new(&bytes[position..]))
            .map(|header| header.is_plausible())
            .unwrap_or(false)
}
