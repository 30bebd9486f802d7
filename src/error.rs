//! Crate-specific errors.

use thiserror::Error;

/// Crate-specific error enum.
///
/// Only structural faults that prevent any parsing surface as errors; faults
/// inside a single flight's data area become warnings on the decoded
/// [Flight](crate::Flight) instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A header line's XOR checksum did not match its `*HH` suffix.
    #[error("header checksum mismatch: expected 0x{expected:02X}, computed 0x{actual:02X}")]
    Checksum {
        /// The checksum decoded from the line's suffix.
        expected: u8,
        /// The checksum computed over the line's body.
        actual: u8,
    },

    /// The file does not begin with a `$U` record.
    #[error("Not a valid JPI file")]
    FileSignature,

    /// A header line is not of the form `$X,...*HH`.
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(String),

    /// [std::io::Error]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The header ended without a `$L` record.
    #[error("No $L record found")]
    MissingEndOfHeader,
}
