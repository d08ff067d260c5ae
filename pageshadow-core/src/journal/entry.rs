//! Log entry encoding and parsing.
//!
//! One entry per line:
//!
//! ```text
//! Offset: <decimal>, Length: <decimal>, Data: <payload bytes>\n
//! ```
//!
//! `Length` is authoritative: the parser takes exactly that many bytes after
//! `Data: ` and then requires the newline, so payloads may contain any byte.

use crate::error::{Result, ShadowError};
use std::fmt;

const OFFSET_TAG: &[u8] = b"Offset: ";
const LENGTH_TAG: &[u8] = b", Length: ";
const DATA_TAG: &[u8] = b", Data: ";

/// Largest end offset a file position can take (`off_t` is signed).
const MAX_END: u64 = i64::MAX as u64;

/// One logged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Byte offset into the target file.
    pub offset: u64,
    /// The bytes written; never empty.
    pub data: Vec<u8>,
}

impl LogEntry {
    /// Create an entry, rejecting empty payloads.
    pub fn new(offset: u64, data: impl Into<Vec<u8>>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(ShadowError::EmptyPayload { offset });
        }
        Ok(Self { offset, data })
    }

    /// Number of payload bytes.
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Encode as a single log line, newline included.
    pub fn encode(&self) -> Vec<u8> {
        let header = format!(
            "Offset: {}, Length: {}, Data: ",
            self.offset,
            self.data.len()
        );
        let mut line = Vec::with_capacity(header.len() + self.data.len() + 1);
        line.extend_from_slice(header.as_bytes());
        line.extend_from_slice(&self.data);
        line.push(b'\n');
        line
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offset: {}, Length: {}, Data: {}",
            self.offset,
            self.data.len(),
            String::from_utf8_lossy(&self.data)
        )
    }
}

/// What was wrong with an unparsable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDefect {
    /// A field tag was missing or misspelled.
    MissingTag(&'static str),
    /// A numeric field was not a decimal number.
    BadNumber(&'static str),
    /// The entry declared zero payload bytes.
    ZeroLength,
    /// The input ended before the declared payload and newline.
    Truncated,
    /// The byte after the payload was not a newline.
    MissingNewline,
}

impl fmt::Display for EntryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTag(tag) => write!(f, "missing '{}' field", tag),
            Self::BadNumber(field) => write!(f, "invalid {} value", field),
            Self::ZeroLength => write!(f, "zero-length payload"),
            Self::Truncated => write!(f, "entry truncated"),
            Self::MissingNewline => write!(f, "payload not followed by newline"),
        }
    }
}

/// Outcome of parsing one entry from the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A well-formed entry and the bytes it occupied.
    Entry { entry: LogEntry, consumed: usize },
    /// A defective entry and where parsing should resume.
    Defect { defect: EntryDefect, resume: usize },
}

/// Parse the entry at the start of `input`.
///
/// `input` must be non-empty. On a defect, `resume` points just past the next
/// newline (or at the end of `input`).
pub fn parse_entry(input: &[u8]) -> Parsed {
    match parse_strict(input) {
        Ok((entry, consumed)) => Parsed::Entry { entry, consumed },
        Err(defect) => {
            let resume = input
                .iter()
                .position(|&b| b == b'\n')
                .map_or(input.len(), |nl| nl + 1);
            Parsed::Defect { defect, resume }
        }
    }
}

fn parse_strict(input: &[u8]) -> std::result::Result<(LogEntry, usize), EntryDefect> {
    let rest = input
        .strip_prefix(OFFSET_TAG)
        .ok_or(EntryDefect::MissingTag("Offset"))?;
    let (offset, rest) = take_decimal(rest, "offset")?;

    let rest = rest
        .strip_prefix(LENGTH_TAG)
        .ok_or(EntryDefect::MissingTag("Length"))?;
    let (length, rest) = take_decimal(rest, "length")?;
    if length == 0 {
        return Err(EntryDefect::ZeroLength);
    }
    if offset.checked_add(length).is_none_or(|end| end > MAX_END) {
        return Err(EntryDefect::BadNumber("offset"));
    }

    let rest = rest
        .strip_prefix(DATA_TAG)
        .ok_or(EntryDefect::MissingTag("Data"))?;
    let length = usize::try_from(length).map_err(|_| EntryDefect::BadNumber("length"))?;
    if rest.len() <= length {
        return Err(EntryDefect::Truncated);
    }
    if rest[length] != b'\n' {
        return Err(EntryDefect::MissingNewline);
    }

    let header = input.len() - rest.len();
    let entry = LogEntry {
        offset,
        data: rest[..length].to_vec(),
    };
    Ok((entry, header + length + 1))
}

fn take_decimal<'a>(
    input: &'a [u8],
    field: &'static str,
) -> std::result::Result<(u64, &'a [u8]), EntryDefect> {
    let digits = input.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(EntryDefect::BadNumber(field));
    }
    let value = std::str::from_utf8(&input[..digits])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(EntryDefect::BadNumber(field))?;
    Ok((value, &input[digits..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_entry(input: &[u8]) -> (LogEntry, usize) {
        match parse_entry(input) {
            Parsed::Entry { entry, consumed } => (entry, consumed),
            Parsed::Defect { defect, .. } => panic!("unexpected defect: {}", defect),
        }
    }

    fn expect_defect(input: &[u8]) -> (EntryDefect, usize) {
        match parse_entry(input) {
            Parsed::Defect { defect, resume } => (defect, resume),
            Parsed::Entry { entry, .. } => panic!("unexpected entry: {}", entry),
        }
    }

    #[test]
    fn encodes_the_line_format() {
        let entry = LogEntry::new(15, b"xxx".to_vec()).unwrap();
        assert_eq!(entry.encode(), b"Offset: 15, Length: 3, Data: xxx\n");
    }

    #[test]
    fn rejects_empty_payload() {
        let err = LogEntry::new(4, Vec::new()).unwrap_err();
        assert_eq!(err.code(), "E004");
    }

    #[test]
    fn parses_one_line_and_reports_consumed_bytes() {
        let input = b"Offset: 15, Length: 3, Data: xxx\nOffset: 0, Length: 1, Data: a\n";
        let (entry, consumed) = expect_entry(input);
        assert_eq!(entry.offset, 15);
        assert_eq!(entry.data, b"xxx");
        assert_eq!(consumed, 33);

        let (second, _) = expect_entry(&input[consumed..]);
        assert_eq!(second.offset, 0);
        assert_eq!(second.data, b"a");
    }

    #[test]
    fn payload_may_contain_newlines() {
        let entry = LogEntry::new(2, b"a\nb".to_vec()).unwrap();
        let line = entry.encode();
        let (parsed, consumed) = expect_entry(&line);
        assert_eq!(parsed, entry);
        assert_eq!(consumed, line.len());
    }

    #[test]
    fn torn_entry_is_truncated() {
        let (defect, resume) = expect_defect(b"Offset: 15, Length: 3, Data: xx");
        assert_eq!(defect, EntryDefect::Truncated);
        assert_eq!(resume, 31);
    }

    #[test]
    fn length_mismatch_resyncs_after_newline() {
        let input = b"Offset: 1, Length: 5, Data: ab\nOffset: 0, Length: 1, Data: z\n";
        let (defect, resume) = expect_defect(input);
        assert_eq!(defect, EntryDefect::MissingNewline);
        assert_eq!(&input[resume..resume + 6], b"Offset");
    }

    #[test]
    fn malformed_headers() {
        assert_eq!(
            expect_defect(b"garbage\n").0,
            EntryDefect::MissingTag("Offset")
        );
        assert_eq!(
            expect_defect(b"Offset: -1, Length: 1, Data: a\n").0,
            EntryDefect::BadNumber("offset")
        );
        assert_eq!(
            expect_defect(b"Offset: 1 Length: 1, Data: a\n").0,
            EntryDefect::MissingTag("Length")
        );
        assert_eq!(
            expect_defect(b"Offset: 1, Length: 0, Data: \n").0,
            EntryDefect::ZeroLength
        );
        assert_eq!(
            expect_defect(b"Offset: 1, Length: 1, Payload: a\n").0,
            EntryDefect::MissingTag("Data")
        );
    }

    #[test]
    fn offset_beyond_file_positions_is_a_defect() {
        let input = b"Offset: 18446744073709551615, Length: 1, Data: z\nOffset: 0, Length: 1, Data: a\n";
        let (defect, resume) = expect_defect(input);
        assert_eq!(defect, EntryDefect::BadNumber("offset"));
        assert_eq!(&input[resume..resume + 9], b"Offset: 0");

        let (defect, _) = expect_defect(b"Offset: 9223372036854775807, Length: 1, Data: z\n");
        assert_eq!(defect, EntryDefect::BadNumber("offset"));

        let (entry, _) = expect_entry(b"Offset: 9223372036854775806, Length: 1, Data: z\n");
        assert_eq!(entry.offset, i64::MAX as u64 - 1);
    }
}
