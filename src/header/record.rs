//! One line of the ASCII header.
//!
//! Header lines look like `$D, 1197,  250*5D`: a tag letter, comma-separated
//! fields, and a two-hex-digit XOR checksum after the final `*`.

use crate::header::{AlarmLimits, Config, DownloadTime, FlightIndexEntry, FuelConfig};
use crate::{Error, Result};

/// A parsed header line.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Record {
    /// `$U`, the aircraft registration.
    TailNumber(String),
    /// `$A`, the configured alarm thresholds.
    AlarmLimits(AlarmLimits),
    /// `$C`, the model number and feature flags.
    Config(Config),
    /// `$D`, one flight index entry.
    FlightIndex(FlightIndexEntry),
    /// `$F`, the fuel-computer configuration.
    FuelConfig(FuelConfig),
    /// `$T`, the download timestamp.
    DownloadTime(DownloadTime),
    /// `$L`, the last header record. The binary area starts after its CR-LF.
    EndOfHeader,
    /// `$P` and `$H` are recognized but their bodies are unused.
    Unused,
}

impl Record {
    /// Parses one header line, without its CR-LF terminator.
    pub(crate) fn parse(line: &[u8]) -> Result<Record> {
        let body = checked_body(line)?;
        let (tag, rest) = body.split_at(1);
        let rest = rest.strip_prefix(',').unwrap_or(rest);
        let record = match tag {
            "U" => Record::TailNumber(rest.trim().trim_end_matches('_').trim_end().to_string()),
            "A" => {
                let fields = fields(rest);
                Record::AlarmLimits(AlarmLimits {
                    volts_hi: int(&fields, 0),
                    volts_lo: int(&fields, 1),
                    dif: int(&fields, 2),
                    cht: int(&fields, 3),
                    cld: int(&fields, 4),
                    tit: int(&fields, 5),
                    oil_hi: int(&fields, 6),
                    oil_lo: int(&fields, 7),
                })
            }
            "C" => {
                let fields = fields(rest);
                Record::Config(Config {
                    model_number: int(&fields, 0),
                    flags_lo: int(&fields, 1),
                    flags_hi: int(&fields, 2),
                    unknown: int(&fields, 3),
                    firmware_version: int(&fields, 4),
                })
            }
            "D" => {
                let fields = fields(rest);
                Record::FlightIndex(FlightIndexEntry {
                    flight_number: int(&fields, 0),
                    data_words: int(&fields, 1),
                })
            }
            "F" => {
                let fields = fields(rest);
                Record::FuelConfig(FuelConfig {
                    empty: int(&fields, 0),
                    full: int(&fields, 1),
                    warning: int(&fields, 2),
                    k_factor: int(&fields, 3),
                    k_factor2: int(&fields, 4),
                })
            }
            "T" => {
                let fields = fields(rest);
                Record::DownloadTime(DownloadTime {
                    month: int(&fields, 0),
                    day: int(&fields, 1),
                    year: int(&fields, 2),
                    hour: int(&fields, 3),
                    minute: int(&fields, 4),
                })
            }
            "L" => Record::EndOfHeader,
            "P" | "H" => Record::Unused,
            _ => return Err(invalid(line)),
        };
        Ok(record)
    }
}

/// Verifies the `*HH` checksum and returns the bytes between `$` and `*` as
/// a string.
fn checked_body(line: &[u8]) -> Result<&str> {
    if line.first() != Some(&b'$') {
        return Err(invalid(line));
    }
    let star = line
        .iter()
        .rposition(|&byte| byte == b'*')
        .filter(|&star| star > 1 && star + 3 == line.len())
        .ok_or_else(|| invalid(line))?;
    let suffix = std::str::from_utf8(&line[star + 1..]).map_err(|_| invalid(line))?;
    let expected = u8::from_str_radix(suffix, 16).map_err(|_| invalid(line))?;
    let actual = line[1..star].iter().fold(0, |checksum, &byte| checksum ^ byte);
    if expected != actual {
        return Err(Error::Checksum { expected, actual });
    }
    std::str::from_utf8(&line[1..star])
        .ok()
        .filter(|body| body.is_ascii())
        .ok_or_else(|| invalid(line))
}

fn invalid(line: &[u8]) -> Error {
    Error::InvalidHeaderLine(String::from_utf8_lossy(line).into_owned())
}

fn fields(rest: &str) -> Vec<&str> {
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').collect()
    }
}

/// Integer fields default to 0 when missing or unparseable; observed files
/// pad short records with blanks.
fn int(fields: &[&str], index: usize) -> u16 {
    fields
        .get(index)
        .and_then(|field| field.trim().parse().ok())
        .unwrap_or(0)
}
