//! Intel HEX validation
//!
//! as31 writes its output as Intel HEX. The R-31JP monitor consumes that text
//! directly, so the bytes of the file are sent unchanged; this module only
//! checks them first so a truncated or corrupted file never reaches the
//! board.
//!
//! Record layout: `:LLAAAATT<data>CC` with `LL` data length, `AAAA` load
//! address, `TT` record type and `CC` the two's complement checksum.

use thiserror::Error;

use crate::error::{Error, Result};

/// Size of the 8051 code address space
pub const CODE_SPACE: u32 = 0x1_0000;

/// Problems found in a single HEX record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    /// Record does not start with `:`
    #[error("missing ':' start code")]
    MissingStartCode,
    /// Non-hexadecimal character in the record
    #[error("invalid hex digit")]
    InvalidDigit,
    /// Record text has an odd number of digits
    #[error("odd number of hex digits")]
    OddLength,
    /// Record is shorter than the fixed header and checksum
    #[error("record too short")]
    TooShort,
    /// Declared data length disagrees with the record size
    #[error("declared {declared} data bytes, found {actual}")]
    LengthMismatch {
        /// Length from the `LL` field
        declared: usize,
        /// Data bytes actually present
        actual: usize,
    },
    /// Checksum mismatch
    #[error("checksum 0x{found:02X}, expected 0x{expected:02X}")]
    Checksum {
        /// Checksum computed from the record
        expected: u8,
        /// Checksum stored in the record
        found: u8,
    },
    /// Record type other than data or end-of-file
    #[error("unsupported record type 0x{0:02X}")]
    UnsupportedRecord(u8),
    /// End-of-file record carries data
    #[error("end-of-file record with data")]
    EofWithData,
    /// Data extends past the 64 KiB code space
    #[error("data ends at 0x{0:05X}, beyond the 64 KiB code space")]
    AddressOverflow(u32),
    /// A record follows the end-of-file record
    #[error("record after end-of-file record")]
    DataAfterEof,
    /// No end-of-file record
    #[error("missing end-of-file record")]
    MissingEof,
    /// Line is not ASCII text
    #[error("not ASCII text")]
    NotAscii,
}

/// Kind of a HEX record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Type 00, data
    Data,
    /// Type 01, end of file
    EndOfFile,
}

/// One decoded HEX record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record type
    pub kind: RecordKind,
    /// Load address
    pub address: u16,
    /// Payload
    pub data: Vec<u8>,
}

impl Record {
    /// Decode a single record line (surrounding whitespace ignored)
    pub fn parse(line: &str) -> core::result::Result<Self, HexError> {
        let line = line.trim();
        if !line.is_ascii() {
            return Err(HexError::NotAscii);
        }
        let digits = line.strip_prefix(':').ok_or(HexError::MissingStartCode)?;
        if digits.len() % 2 != 0 {
            return Err(HexError::OddLength);
        }
        let bytes = digits
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                let pair = core::str::from_utf8(pair).map_err(|_| HexError::InvalidDigit)?;
                u8::from_str_radix(pair, 16).map_err(|_| HexError::InvalidDigit)
            })
            .collect::<core::result::Result<Vec<u8>, HexError>>()?;

        // LL AAAA TT CC
        if bytes.len() < 5 {
            return Err(HexError::TooShort);
        }
        let declared = bytes[0] as usize;
        let actual = bytes.len() - 5;
        if declared != actual {
            return Err(HexError::LengthMismatch { declared, actual });
        }

        let (body, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = checksum_of(body);
        if expected != checksum[0] {
            return Err(HexError::Checksum {
                expected,
                found: checksum[0],
            });
        }

        let address = u16::from_be_bytes([bytes[1], bytes[2]]);
        let data = body[4..].to_vec();
        let kind = match bytes[3] {
            0x00 => RecordKind::Data,
            0x01 if data.is_empty() => RecordKind::EndOfFile,
            0x01 => return Err(HexError::EofWithData),
            other => return Err(HexError::UnsupportedRecord(other)),
        };

        let end = address as u32 + data.len() as u32;
        if end > CODE_SPACE {
            return Err(HexError::AddressOverflow(end));
        }

        Ok(Self {
            kind,
            address,
            data,
        })
    }
}

/// Two's complement checksum of a record body
pub fn checksum_of(body: &[u8]) -> u8 {
    body.iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

/// A validated HEX image ready for download
#[derive(Debug, Clone)]
pub struct HexImage {
    raw: Vec<u8>,
    records: Vec<Record>,
}

impl HexImage {
    /// Validate HEX file contents
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let text = core::str::from_utf8(raw).map_err(|e| Error::InvalidHex {
            line: 1 + raw[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count(),
            reason: HexError::NotAscii,
        })?;

        let mut records = Vec::new();
        let mut seen_eof = false;
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let invalid = |reason| Error::InvalidHex {
                line: index + 1,
                reason,
            };
            if seen_eof {
                return Err(invalid(HexError::DataAfterEof));
            }
            let record = Record::parse(line).map_err(invalid)?;
            seen_eof = record.kind == RecordKind::EndOfFile;
            records.push(record);
        }

        if !seen_eof {
            return Err(Error::InvalidHex {
                line: text.lines().count().max(1),
                reason: HexError::MissingEof,
            });
        }

        Ok(Self {
            raw: raw.to_vec(),
            records,
        })
    }

    /// File contents exactly as they are sent to the board
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// All records, end-of-file record last
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of data records
    pub fn data_records(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.kind == RecordKind::Data)
            .count()
    }

    /// Total number of program bytes
    pub fn data_len(&self) -> usize {
        self.records.iter().map(|r| r.data.len()).sum()
    }

    /// Lowest and highest (inclusive) address written, if any
    pub fn address_range(&self) -> Option<(u16, u16)> {
        self.records
            .iter()
            .filter(|r| !r.data.is_empty())
            .map(|r| (r.address, r.address + (r.data.len() as u16 - 1)))
            .reduce(|(lo, hi), (start, end)| (lo.min(start), hi.max(end)))
    }
}
