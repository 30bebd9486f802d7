//! The delta-record decoder.
//!
//! Flight data is a stream of variable-length compressed records. Each
//! record carries a 16-bit mask selecting which groups of eight slots have
//! deltas, one presence byte and one sign byte per selected group, and one
//! delta byte per present slot, in ascending slot order. The decoder
//! accumulates deltas into a 128-slot state array and emits one absolute
//! sample per record, advancing a virtual clock as it goes.

use crate::flight::gps::{GpsFilter, RawDelta};
use crate::flight::header::FlightHeader;
use crate::sample::Sample;
use crate::temperature::{TemperatureUnit, celsius_to_fahrenheit, fahrenheit_to_celsius};
use crate::utils::round1;
use byteorder::{BigEndian, ReadBytesExt};
use chrono::{Duration, NaiveDateTime};
use std::io::{self, Cursor};

pub(crate) const SLOT_COUNT: usize = 128;
const FLAG_GROUPS: usize = 16;

/// Every slot starts here on its first non-zero delta, except the
/// horsepower slot and the high byte of each two-slot pair.
const DEFAULT_SLOT_VALUE: i32 = 0xF0;

/// Logical fields whose value spans two slots: EGT1-6, RPM, and the Hobbs
/// accumulator. The high byte takes its delta sign from the low byte.
pub(crate) const SLOT_PAIRS: [(usize, usize); 8] = [
    (SLOT_EGT_LO, SLOT_EGT_HI),
    (SLOT_EGT_LO + 1, SLOT_EGT_HI + 1),
    (SLOT_EGT_LO + 2, SLOT_EGT_HI + 2),
    (SLOT_EGT_LO + 3, SLOT_EGT_HI + 3),
    (SLOT_EGT_LO + 4, SLOT_EGT_HI + 4),
    (SLOT_EGT_LO + 5, SLOT_EGT_HI + 5),
    (SLOT_RPM_LO, SLOT_RPM_HI),
    (SLOT_HOURS_LO, SLOT_HOURS_HI),
];

pub(crate) const SLOT_EGT_LO: usize = 0;
pub(crate) const SLOT_EGT_HI: usize = 48;
pub(crate) const SLOT_CHT: usize = 8;
pub(crate) const SLOT_CLD: usize = 14;
pub(crate) const SLOT_OIL_T: usize = 15;
pub(crate) const SLOT_MARK: usize = 16;
pub(crate) const SLOT_OIL_P: usize = 17;
pub(crate) const SLOT_CRB: usize = 18;
pub(crate) const SLOT_VOLT: usize = 20;
pub(crate) const SLOT_OAT: usize = 21;
pub(crate) const SLOT_USD: usize = 22;
pub(crate) const SLOT_FF: usize = 23;
pub(crate) const SLOT_HP: usize = 30;
pub(crate) const SLOT_MAP: usize = 40;
pub(crate) const SLOT_RPM_LO: usize = 41;
pub(crate) const SLOT_RPM_HI: usize = 42;
pub(crate) const SLOT_HOURS_LO: usize = 78;
pub(crate) const SLOT_HOURS_HI: usize = 79;
pub(crate) const SLOT_LONG_HI: usize = 81;
pub(crate) const SLOT_LAT_HI: usize = 82;
pub(crate) const SLOT_ALT: usize = 83;
pub(crate) const SLOT_GSPD: usize = 85;
pub(crate) const SLOT_LONG_LO: usize = 86;
pub(crate) const SLOT_LAT_LO: usize = 87;

fn default_value(slot: usize) -> i32 {
    if slot == SLOT_HP || SLOT_PAIRS.iter().any(|&(_, hi)| hi == slot) {
        0
    } else {
        DEFAULT_SLOT_VALUE
    }
}

enum RecordStep {
    Sample(Box<Sample>),
    FlagMismatch(u16, u16),
}

/// Per-flight decoder state, constructed for one flight's data area and
/// dropped when decoding finishes.
pub(crate) struct Decoder {
    prev: [Option<i32>; SLOT_COUNT],
    clock: NaiveDateTime,
    interval_secs: i64,
    unit: TemperatureUnit,
    source_fahrenheit: bool,
    gspd_bug: bool,
    gps: GpsFilter,
}

impl Decoder {
    pub(crate) fn new(
        header: &FlightHeader,
        start: NaiveDateTime,
        interval_secs: u16,
        unit: TemperatureUnit,
    ) -> Decoder {
        Decoder {
            prev: [None; SLOT_COUNT],
            clock: start,
            interval_secs: i64::from(interval_secs),
            unit,
            source_fahrenheit: header.is_fahrenheit(),
            gspd_bug: true,
            gps: GpsFilter::new(header.initial_position()),
        }
    }

    /// Consumes the flight's data area (preamble included) and returns the
    /// decoded samples plus any warnings.
    ///
    /// Mismatched decode flags and truncated reads end the stream cleanly;
    /// samples already emitted are kept.
    pub(crate) fn decode(mut self, data: &[u8]) -> (Vec<Sample>, Vec<String>) {
        let mut samples = Vec::new();
        let mut warnings = Vec::new();
        let budget = data.len().saturating_sub(5) as u64;
        let mut cursor = Cursor::new(data);
        cursor.set_position(FlightHeader::SIZE as u64);
        while cursor.position() < budget {
            match self.next_record(&mut cursor) {
                Ok(RecordStep::Sample(sample)) => samples.push(*sample),
                Ok(RecordStep::FlagMismatch(a, b)) => {
                    if samples.is_empty() {
                        let warning = format!(
                            "Decode flags mismatch at start of data (0x{a:04X} vs 0x{b:04X})"
                        );
                        log::warn!("{}", warning);
                        warnings.push(warning);
                    }
                    break;
                }
                Err(_) => break,
            }
        }
        (samples, warnings)
    }

    fn next_record(&mut self, cursor: &mut Cursor<&[u8]>) -> io::Result<RecordStep> {
        let _ = cursor.read_u8()?; // undocumented lead byte
        let flags_a = cursor.read_u16::<BigEndian>()?;
        let flags_b = cursor.read_u16::<BigEndian>()?;
        if flags_a != flags_b {
            return Ok(RecordStep::FlagMismatch(flags_a, flags_b));
        }
        let repeat = cursor.read_u8()?;
        // a repeat carries the previous sample forward in time, unemitted
        self.clock += Duration::seconds(i64::from(repeat) * self.interval_secs);

        let mut field_flags = [0u8; FLAG_GROUPS];
        for (group, flags) in field_flags.iter_mut().enumerate() {
            if flags_a & 1 << group != 0 {
                *flags = cursor.read_u8()?;
            }
        }
        let mut sign_flags = [0u8; FLAG_GROUPS];
        for (group, flags) in sign_flags.iter_mut().enumerate() {
            // groups 6 and 7 carry no sign bytes; their slots sign via
            // their pair's low byte
            if flags_a & 1 << group != 0 && group != 6 && group != 7 {
                *flags = cursor.read_u8()?;
            }
        }

        let mut present = [false; SLOT_COUNT];
        let mut sign = [false; SLOT_COUNT];
        for slot in 0..SLOT_COUNT {
            present[slot] = field_flags[slot >> 3] >> (slot & 7) & 1 != 0;
            sign[slot] = sign_flags[slot >> 3] >> (slot & 7) & 1 != 0;
        }
        for (lo, hi) in SLOT_PAIRS {
            sign[hi] = sign[lo];
        }

        let mut raw = [None::<u8>; SLOT_COUNT];
        for slot in 0..SLOT_COUNT {
            if !present[slot] {
                continue;
            }
            let byte = cursor.read_u8()?;
            raw[slot] = Some(byte);
            let delta = if sign[slot] {
                -i32::from(byte)
            } else {
                i32::from(byte)
            };
            if self.prev[slot].is_none() && delta == 0 {
                // a zero delta against a never-seen slot is not a write
                continue;
            }
            let base = self.prev[slot].unwrap_or_else(|| default_value(slot));
            self.prev[slot] = Some(base + delta);
        }

        let position = self.gps.update(
            RawDelta {
                lo: raw[SLOT_LAT_LO],
                hi: raw[SLOT_LAT_HI],
                negate: sign[SLOT_LAT_LO],
            },
            RawDelta {
                lo: raw[SLOT_LONG_LO],
                hi: raw[SLOT_LONG_HI],
                negate: sign[SLOT_LONG_LO],
            },
        );

        let mut sample = self.compose(position);
        self.finalize(&mut sample);
        self.clock += Duration::seconds(self.interval_secs);
        Ok(RecordStep::Sample(Box::new(sample)))
    }

    fn slot(&self, slot: usize) -> i32 {
        self.prev[slot].unwrap_or(0)
    }

    fn pair(&self, lo: usize, hi: usize) -> f64 {
        f64::from(self.slot(lo) + (self.slot(hi) << 8))
    }

    fn compose(&self, position: Option<(f64, f64)>) -> Sample {
        let mut sample = Sample {
            time: self.clock,
            cld: f64::from(self.slot(SLOT_CLD)),
            oil_t: f64::from(self.slot(SLOT_OIL_T)),
            mark: f64::from(self.slot(SLOT_MARK)),
            oil_p: f64::from(self.slot(SLOT_OIL_P)),
            crb: f64::from(self.slot(SLOT_CRB)),
            volt: f64::from(self.slot(SLOT_VOLT)),
            oat: f64::from(self.slot(SLOT_OAT)),
            usd: f64::from(self.slot(SLOT_USD)),
            ff: f64::from(self.slot(SLOT_FF)),
            hp: f64::from(self.slot(SLOT_HP)),
            map: f64::from(self.slot(SLOT_MAP)),
            rpm: self.pair(SLOT_RPM_LO, SLOT_RPM_HI),
            hours: self.pair(SLOT_HOURS_LO, SLOT_HOURS_HI),
            alt: f64::from(self.slot(SLOT_ALT)),
            gspd: f64::from(self.slot(SLOT_GSPD)),
            lat: position.map(|(lat, _)| lat),
            long: position.map(|(_, long)| long),
            ..Default::default()
        };
        for cylinder in 0..6 {
            sample.egt[cylinder] = self.pair(SLOT_EGT_LO + cylinder, SLOT_EGT_HI + cylinder);
            sample.cht[cylinder] = f64::from(self.slot(SLOT_CHT + cylinder));
        }
        sample
    }

    /// Scaling and workarounds applied to every emitted sample.
    fn finalize(&mut self, sample: &mut Sample) {
        // some firmware sticks ground speed at 150 until the GPS locks
        if sample.gspd == 150.0 && self.gspd_bug {
            sample.gspd = 0.0;
        }
        if sample.gspd > 0.0 {
            self.gspd_bug = false;
        }
        if sample.gspd < 0.0 {
            sample.gspd = 0.0;
        }

        let convert: Option<fn(f64) -> f64> = match (self.unit, self.source_fahrenheit) {
            (TemperatureUnit::Celsius, true) => Some(fahrenheit_to_celsius),
            (TemperatureUnit::Fahrenheit, false) => Some(celsius_to_fahrenheit),
            _ => None,
        };
        if let Some(convert) = convert {
            for value in sample
                .egt
                .iter_mut()
                .chain(sample.cht.iter_mut())
                .chain([
                    &mut sample.crb,
                    &mut sample.cld,
                    &mut sample.oil_t,
                    &mut sample.oat,
                ])
            {
                if *value != 0.0 {
                    *value = round1(convert(*value));
                }
            }
        }

        if sample.ff > 0.0 {
            sample.ff = round1(sample.ff / 10.0);
        }
        if sample.volt > 0.0 {
            sample.volt = round1(sample.volt / 10.0);
        }
    }
}

/// Encodes one record for in-memory test data; deltas are
/// (slot, magnitude, negative) in any order.
#[cfg(test)]
pub(crate) fn encode_record(repeat: u8, deltas: &[(usize, u8, bool)]) -> Vec<u8> {
    let mut field_flags = [0u8; FLAG_GROUPS];
    let mut sign_flags = [0u8; FLAG_GROUPS];
    let mut magnitudes = [None::<u8>; SLOT_COUNT];
    for &(slot, magnitude, negative) in deltas {
        field_flags[slot >> 3] |= 1 << (slot & 7);
        if negative {
            sign_flags[slot >> 3] |= 1 << (slot & 7);
        }
        magnitudes[slot] = Some(magnitude);
    }
    let mut decode_flags = 0u16;
    for group in 0..FLAG_GROUPS {
        if field_flags[group] != 0 {
            decode_flags |= 1 << group;
        }
    }
    let mut bytes = vec![0u8];
    bytes.extend_from_slice(&decode_flags.to_be_bytes());
    bytes.extend_from_slice(&decode_flags.to_be_bytes());
    bytes.push(repeat);
    for group in 0..FLAG_GROUPS {
        if decode_flags & 1 << group != 0 {
            bytes.push(field_flags[group]);
        }
    }
    for group in 0..FLAG_GROUPS {
        if decode_flags & 1 << group != 0 && group != 6 && group != 7 {
            bytes.push(sign_flags[group]);
        }
    }
    for magnitude in magnitudes.into_iter().flatten() {
        bytes.push(magnitude);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header() -> FlightHeader {
        FlightHeader {
            flight_number: 1197,
            flags: 1 << 28,
            initial_lat: 0,
            initial_long: 0,
            interval_secs: 6,
            date: 19 | 7 << 5 | 25 << 9,
            time: 52 << 5 | 14 << 11,
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 19)
            .unwrap()
            .and_hms_opt(14, 52, 0)
            .unwrap()
    }

    fn decoder(unit: TemperatureUnit) -> Decoder {
        Decoder::new(&header(), start(), 6, unit)
    }

    /// Wraps records in a data area: 28 preamble bytes (ignored by the
    /// decoder, which starts after them) plus trailing slack so the last
    /// record sits inside the byte budget.
    fn data_area(records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; FlightHeader::SIZE];
        for record in records {
            data.extend_from_slice(record);
        }
        data.extend_from_slice(&[0u8; 5]);
        data
    }

    #[test]
    fn first_nonzero_delta_starts_from_the_default() {
        let data = data_area(&[encode_record(0, &[(SLOT_EGT_LO, 5, false)])]);
        let (samples, warnings) = decoder(TemperatureUnit::Original).decode(&data);
        assert!(warnings.is_empty());
        assert_eq!(1, samples.len());
        assert_eq!(245.0, samples[0].egt[0]);
    }

    #[test]
    fn zero_delta_does_not_mark_a_slot_seen() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_CLD, 0, false)]),
            encode_record(0, &[(SLOT_CLD, 0, false)]),
            encode_record(0, &[(SLOT_CLD, 3, false)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(3, samples.len());
        assert_eq!(0.0, samples[0].cld);
        assert_eq!(0.0, samples[1].cld);
        assert_eq!(243.0, samples[2].cld);
    }

    #[test]
    fn hp_defaults_to_zero() {
        let data = data_area(&[encode_record(0, &[(SLOT_HP, 65, false)])]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(65.0, samples[0].hp);
    }

    #[test]
    fn negative_deltas_accumulate() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_OIL_P, 4, false)]),
            encode_record(0, &[(SLOT_OIL_P, 2, true)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(244.0, samples[0].oil_p);
        assert_eq!(242.0, samples[1].oil_p);
    }

    #[test]
    fn pair_high_byte_shares_the_low_byte_sign() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_RPM_LO, 10, false), (SLOT_RPM_HI, 1, false)]),
            encode_record(0, &[(SLOT_RPM_LO, 2, true), (SLOT_RPM_HI, 1, false)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        // low 240+10, high 0+1
        assert_eq!(506.0, samples[0].rpm);
        // the second record's high-byte delta is negated by the low sign
        assert_eq!(248.0, samples[1].rpm);
    }

    #[test]
    fn unmarked_slots_hold_their_value() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_OAT, 10, true)]),
            encode_record(0, &[(SLOT_VOLT, 8, false)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(230.0, samples[0].oat);
        assert_eq!(230.0, samples[1].oat);
    }

    #[test]
    fn repeat_count_advances_the_clock() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_EGT_LO, 5, false)]),
            encode_record(2, &[(SLOT_EGT_LO, 1, false)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(start(), samples[0].time);
        assert_eq!(start() + Duration::seconds(6 + 12), samples[1].time);
    }

    #[test]
    fn mismatched_flags_on_the_first_record() {
        let mut data = vec![0u8; FlightHeader::SIZE];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x02, 0x00]);
        data.extend_from_slice(&[0u8; 5]);
        let (samples, warnings) = decoder(TemperatureUnit::Original).decode(&data);
        assert!(samples.is_empty());
        assert_eq!(
            vec!["Decode flags mismatch at start of data (0x0001 vs 0x0002)".to_string()],
            warnings
        );
    }

    #[test]
    fn mismatched_flags_after_good_records_is_silent() {
        let mut data = vec![0u8; FlightHeader::SIZE];
        data.extend_from_slice(&encode_record(0, &[(SLOT_EGT_LO, 5, false)]));
        // mismatched decode flags where the next record should start
        data.extend_from_slice(&[0x00, 0xDE, 0xAD, 0xBE, 0xEF]);
        data.extend_from_slice(&[0u8; 5]);
        let (samples, warnings) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(1, samples.len());
        assert!(warnings.is_empty());
    }

    #[test]
    fn truncation_keeps_earlier_samples() {
        let mut data = vec![0u8; FlightHeader::SIZE];
        data.extend_from_slice(&encode_record(0, &[(SLOT_EGT_LO, 5, false)]));
        // a record that promises a delta byte it does not contain
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00]);
        let (samples, warnings) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(1, samples.len());
        assert!(warnings.is_empty());
    }

    #[test]
    fn fahrenheit_source_converts_to_celsius() {
        let data = data_area(&[encode_record(0, &[(SLOT_EGT_LO, 5, false), (SLOT_CHT, 60, true)])]);
        let (samples, _) = decoder(TemperatureUnit::Celsius).decode(&data);
        // 245 F and 180 F, converted and rounded to one decimal
        assert_eq!(118.3, samples[0].egt[0]);
        assert_eq!(82.2, samples[0].cht[0]);
    }

    #[test]
    fn original_unit_passes_temperatures_through() {
        let data = data_area(&[encode_record(0, &[(SLOT_EGT_LO, 5, false)])]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(245.0, samples[0].egt[0]);
    }

    #[test]
    fn zero_temperatures_are_not_converted() {
        let data = data_area(&[encode_record(0, &[(SLOT_EGT_LO, 5, false)])]);
        let (samples, _) = decoder(TemperatureUnit::Celsius).decode(&data);
        // cht never got a delta and stays exactly zero
        assert_eq!(0.0, samples[0].cht[0]);
    }

    #[test]
    fn fuel_flow_and_volts_scale_from_tenths() {
        let data = data_area(&[encode_record(0, &[(SLOT_FF, 17, true), (SLOT_VOLT, 44, true)])]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        // 240 - 17 = 223 tenths of a gph
        assert_eq!(22.3, samples[0].ff);
        // 240 - 44 = 196 tenths of a volt
        assert_eq!(19.6, samples[0].volt);
    }

    #[test]
    fn stuck_ground_speed_is_zeroed_until_real_motion() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_GSPD, 90, true)]),
            encode_record(0, &[(SLOT_GSPD, 0, false)]),
            encode_record(0, &[(SLOT_GSPD, 5, false)]),
            encode_record(0, &[(SLOT_GSPD, 5, true)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        // 240 - 90 = 150, the stuck value, squelched while latched
        assert_eq!(0.0, samples[0].gspd);
        assert_eq!(0.0, samples[1].gspd);
        // real motion clears the latch
        assert_eq!(155.0, samples[2].gspd);
        // and a later genuine 150 passes through
        assert_eq!(150.0, samples[3].gspd);
    }

    #[test]
    fn negative_ground_speed_clamps_to_zero() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_GSPD, 240, true)]),
            encode_record(0, &[(SLOT_GSPD, 10, true)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert_eq!(0.0, samples[0].gspd);
        assert_eq!(0.0, samples[1].gspd);
    }

    #[test]
    fn gps_deltas_feed_the_filter() {
        let mut header = header();
        header.initial_lat = 201044;
        header.initial_long = -673704;
        let decoder = Decoder::new(&header, start(), 6, TemperatureUnit::Original);
        let data = data_area(&[
            encode_record(0, &[(SLOT_EGT_LO, 5, false)]),
            encode_record(0, &[(SLOT_EGT_LO, 1, false)]),
            encode_record(0, &[(SLOT_LAT_LO, 60, false), (SLOT_LONG_LO, 60, true)]),
        ]);
        let (samples, _) = decoder.decode(&data);
        assert_eq!(None, samples[0].lat);
        let lat = samples[1].lat.unwrap();
        let long = samples[1].long.unwrap();
        assert!((lat - 33.507333).abs() < 1e-6);
        assert!((long + 112.284).abs() < 1e-6);
        // 60/6000 of a degree north and west
        let lat = samples[2].lat.unwrap();
        let long = samples[2].long.unwrap();
        assert!((lat - 33.517333).abs() < 1e-6);
        assert!((long + 112.294).abs() < 1e-6);
    }

    #[test]
    fn no_preamble_gps_means_no_positions() {
        let data = data_area(&[
            encode_record(0, &[(SLOT_LAT_LO, 60, false), (SLOT_LONG_LO, 60, false)]),
            encode_record(0, &[(SLOT_LAT_LO, 0, false), (SLOT_LONG_LO, 0, false)]),
        ]);
        let (samples, _) = decoder(TemperatureUnit::Original).decode(&data);
        assert!(samples.iter().all(|sample| sample.lat.is_none()));
        assert!(samples.iter().all(|sample| sample.long.is_none()));
    }
}
