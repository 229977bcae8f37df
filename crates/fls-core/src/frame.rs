//! LUI / LUS / LUR frame codec (component C1).
//!
//! All multi-byte fields are big-endian; all strings are strict ASCII.
//! Builders never panic — invalid input is rejected with `CoreError`.

use crate::error::{CoreError, Result};

/// ARINC 615A status code carried in the LUI/LUS header.
///
/// Any value outside the closed set is `Unknown` and is only logged by
/// the caller — it never causes a hard abort by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArincStatus {
    Accepted,
    InProgress,
    CompletedOk,
    Rejected,
    Unknown(u16),
}

impl ArincStatus {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => ArincStatus::Accepted,
            0x0002 => ArincStatus::InProgress,
            0x0003 => ArincStatus::CompletedOk,
            0x1000 => ArincStatus::Rejected,
            other => ArincStatus::Unknown(other),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ArincStatus::Accepted => 0x0001,
            ArincStatus::InProgress => 0x0002,
            ArincStatus::CompletedOk => 0x0003,
            ArincStatus::Rejected => 0x1000,
            ArincStatus::Unknown(v) => *v,
        }
    }

    /// Fixed lowercase `"0xhhhh"` rendering used in logs.
    pub fn as_hex(&self) -> String {
        format!("{:#06x}", self.as_u16())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArincStatus::Accepted => "Accepted",
            ArincStatus::InProgress => "In Progress",
            ArincStatus::CompletedOk => "Completed OK",
            ArincStatus::Rejected => "Rejected",
            ArincStatus::Unknown(_) => "Unknown",
        }
    }

    /// `true` for the status values Step 1 treats as success.
    pub fn is_accepted_or_completed(&self) -> bool {
        matches!(self, ArincStatus::Accepted | ArincStatus::CompletedOk)
    }
}

const LUI_HEADER_LEN: usize = 9; // file_length(4) + protocol_version(2) + status_code(2) + desc_length(1)
const LUS_TRAILER_LEN: usize = 3; // ASCII "000".."100"

/// A parsed or to-be-built LUI record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuiRecord {
    pub file_length: u32,
    pub protocol_version: String,
    pub status_code: u16,
    pub description: String,
}

impl LuiRecord {
    pub fn status(&self) -> ArincStatus {
        ArincStatus::from_u16(self.status_code)
    }
}

/// A parsed or to-be-built LUS record: a LUI body plus a trailing
/// 3-ASCII-digit progress field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LusRecord {
    pub lui: LuiRecord,
    pub progress_pct: u8,
}

fn ascii_bytes(s: &str, field: &'static str) -> Result<&[u8]> {
    if !s.is_ascii() {
        return Err(CoreError::InvalidField {
            field,
            reason: "not strict ASCII".to_string(),
        });
    }
    Ok(s.as_bytes())
}

/// Build a LUI payload. `protocol_version` must be exactly 2 ASCII bytes;
/// `description` must be ASCII and no longer than 255 bytes.
pub fn build_lui(
    protocol_version: &str,
    status_code: u16,
    description: &str,
) -> Result<Vec<u8>> {
    let version_bytes = ascii_bytes(protocol_version, "protocol_version")?;
    if version_bytes.len() != 2 {
        return Err(CoreError::InvalidProtocolVersion);
    }
    let desc_bytes = ascii_bytes(description, "description")?;
    if desc_bytes.len() > 255 {
        return Err(CoreError::InvalidField {
            field: "description",
            reason: "exceeds 255 bytes".to_string(),
        });
    }

    let file_length = (LUI_HEADER_LEN + desc_bytes.len()) as u32;
    let mut buf = Vec::with_capacity(file_length as usize);
    buf.extend_from_slice(&file_length.to_be_bytes());
    buf.extend_from_slice(version_bytes);
    buf.extend_from_slice(&status_code.to_be_bytes());
    buf.push(desc_bytes.len() as u8);
    buf.extend_from_slice(desc_bytes);
    Ok(buf)
}

/// Build a LUS payload: a LUI body followed by a 3-ASCII-digit progress
/// trailer. `progress` must be `0..=100`.
pub fn build_lus(protocol_version: &str, status_code: u16, description: &str, progress: u8) -> Result<Vec<u8>> {
    if progress > 100 {
        return Err(CoreError::ProgressOutOfRange);
    }
    let mut buf = build_lui(protocol_version, status_code, description)?;
    // file_length in the header only covers the LUI body; the progress
    // trailer rides along as additional payload (the last 3 octets of
    // the LUS payload).
    buf.extend_from_slice(format!("{:03}", progress).as_bytes());
    Ok(buf)
}

/// Parse a LUI payload: rejects anything shorter than the 9-byte header
/// or whose declared description length runs past the buffer.
pub fn parse_lui(buf: &[u8]) -> Result<LuiRecord> {
    if buf.len() < LUI_HEADER_LEN {
        return Err(CoreError::InsufficientData);
    }
    let file_length = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let version_raw = &buf[4..6];
    if !version_raw.is_ascii() {
        return Err(CoreError::InvalidProtocolVersion);
    }
    let protocol_version = String::from_utf8_lossy(version_raw).into_owned();
    let status_code = u16::from_be_bytes(buf[6..8].try_into().unwrap());
    let desc_length = buf[8] as usize;

    if buf.len() < LUI_HEADER_LEN + desc_length {
        return Err(CoreError::TruncatedDescription);
    }
    let desc_raw = &buf[LUI_HEADER_LEN..LUI_HEADER_LEN + desc_length];
    if !desc_raw.is_ascii() {
        return Err(CoreError::InvalidField {
            field: "description",
            reason: "not strict ASCII".to_string(),
        });
    }
    let description = String::from_utf8_lossy(desc_raw).into_owned();

    Ok(LuiRecord {
        file_length,
        protocol_version,
        status_code,
        description,
    })
}

/// Parse a LUS payload: a LUI body plus a trailing 3-ASCII-digit
/// progress field.
pub fn parse_lus(buf: &[u8]) -> Result<LusRecord> {
    let lui = parse_lui(buf)?;
    if buf.len() < LUS_TRAILER_LEN {
        return Err(CoreError::InsufficientData);
    }
    let trailer = &buf[buf.len() - LUS_TRAILER_LEN..];
    if !trailer.iter().all(u8::is_ascii_digit) {
        return Err(CoreError::InvalidProgress);
    }
    let digits = std::str::from_utf8(trailer).expect("validated ASCII digits");
    let progress: u32 = digits.parse().expect("validated ASCII digits");
    if progress > 100 {
        return Err(CoreError::ProgressOutOfRange);
    }
    Ok(LusRecord {
        lui,
        progress_pct: progress as u8,
    })
}

/// A parsed or to-be-built LUR record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LurRecord {
    pub file_length: u32,
    pub filename: String,
    pub part_number: String,
}

/// Build a LUR payload naming the image file and the part number.
/// Deterministic: identical inputs produce identical bytes.
pub fn build_lur(filename: &str, part_number: &str) -> Result<Vec<u8>> {
    if filename.is_empty() {
        return Err(CoreError::InvalidField {
            field: "filename",
            reason: "must not be empty".to_string(),
        });
    }
    if part_number.is_empty() {
        return Err(CoreError::InvalidField {
            field: "part_number",
            reason: "must not be empty".to_string(),
        });
    }
    let filename_bytes = ascii_bytes(filename, "filename")?;
    let part_bytes = ascii_bytes(part_number, "part_number")?;
    if filename_bytes.len() > 255 {
        return Err(CoreError::InvalidField {
            field: "filename",
            reason: "exceeds 255 bytes".to_string(),
        });
    }
    if part_bytes.len() > 255 {
        return Err(CoreError::InvalidField {
            field: "part_number",
            reason: "exceeds 255 bytes".to_string(),
        });
    }

    let file_length = (4 + 2 + 2 + 1 + filename_bytes.len() + 1 + part_bytes.len()) as u32;
    let mut buf = Vec::with_capacity(file_length as usize);
    buf.extend_from_slice(&file_length.to_be_bytes());
    buf.extend_from_slice(b"A4");
    buf.extend_from_slice(&2u16.to_be_bytes()); // num_headers
    buf.push(filename_bytes.len() as u8);
    buf.extend_from_slice(filename_bytes);
    buf.push(part_bytes.len() as u8);
    buf.extend_from_slice(part_bytes);
    Ok(buf)
}

/// Parse a LUR payload built by [`build_lur`]. Exposed mainly for tests
/// and for the TFTP server side that answers a LUR readback.
pub fn parse_lur(buf: &[u8]) -> Result<LurRecord> {
    if buf.len() < 9 {
        return Err(CoreError::InsufficientData);
    }
    let file_length = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let version = &buf[4..6];
    if version != b"A4" {
        return Err(CoreError::InvalidProtocolVersion);
    }
    let num_headers = u16::from_be_bytes(buf[6..8].try_into().unwrap());
    if num_headers != 2 {
        return Err(CoreError::InvalidField {
            field: "num_headers",
            reason: format!("expected 2, got {num_headers}"),
        });
    }

    let mut offset = 8;
    let mut read_header = |buf: &[u8], offset: &mut usize| -> Result<String> {
        if *offset >= buf.len() {
            return Err(CoreError::InsufficientData);
        }
        let len = buf[*offset] as usize;
        *offset += 1;
        if buf.len() < *offset + len {
            return Err(CoreError::InsufficientData);
        }
        let raw = &buf[*offset..*offset + len];
        *offset += len;
        if !raw.is_ascii() {
            return Err(CoreError::InvalidField {
                field: "header",
                reason: "not strict ASCII".to_string(),
            });
        }
        Ok(String::from_utf8_lossy(raw).into_owned())
    };

    let filename = read_header(buf, &mut offset)?;
    let part_number = read_header(buf, &mut offset)?;

    Ok(LurRecord {
        file_length,
        filename,
        part_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lui_round_trips_for_every_known_status() {
        for status in [0x0001u16, 0x0002, 0x0003, 0x1000] {
            let built = build_lui("A4", status, "hello").unwrap();
            let parsed = parse_lui(&built).unwrap();
            assert_eq!(parsed.status_code, status);
            assert_eq!(parsed.protocol_version, "A4");
            assert_eq!(parsed.description, "hello");
            assert_eq!(parsed.file_length as usize, built.len());
        }
    }

    #[test]
    fn lui_nine_bytes_with_zero_desc_length_is_valid() {
        let built = build_lui("A4", 0x0001, "").unwrap();
        assert_eq!(built.len(), 9);
        let parsed = parse_lui(&built).unwrap();
        assert_eq!(parsed.description, "");
    }

    #[test]
    fn lui_eight_bytes_fails_insufficient_data() {
        let buf = [0u8; 8];
        assert!(matches!(parse_lui(&buf), Err(CoreError::InsufficientData)));
    }

    #[test]
    fn lui_desc_length_255_is_valid() {
        let description = "x".repeat(255);
        let built = build_lui("A4", 0x0001, &description).unwrap();
        let parsed = parse_lui(&built).unwrap();
        assert_eq!(parsed.description.len(), 255);
    }

    #[test]
    fn lus_round_trips_progress() {
        for p in [0u8, 50, 100] {
            let built = build_lus("A4", 0x0002, "", p).unwrap();
            let parsed = parse_lus(&built).unwrap();
            assert_eq!(parsed.progress_pct, p);
        }
    }

    #[test]
    fn lus_rejects_non_digit_progress() {
        let mut built = build_lus("A4", 0x0002, "", 0).unwrap();
        let len = built.len();
        built[len - 3..].copy_from_slice(b"1x0");
        assert!(matches!(parse_lus(&built), Err(CoreError::InvalidProgress)));
    }

    #[test]
    fn lus_rejects_out_of_range_progress() {
        let mut built = build_lus("A4", 0x0002, "", 0).unwrap();
        let len = built.len();
        built[len - 3..].copy_from_slice(b"150");
        assert!(matches!(
            parse_lus(&built),
            Err(CoreError::ProgressOutOfRange)
        ));
    }

    #[test]
    fn lur_is_deterministic_and_file_length_matches() {
        let a = build_lur("GSE-HEADER", "EMB-123456").unwrap();
        let b = build_lur("GSE-HEADER", "EMB-123456").unwrap();
        assert_eq!(a, b);
        let parsed = parse_lur(&a).unwrap();
        assert_eq!(parsed.file_length as usize, a.len());
        assert_eq!(parsed.filename, "GSE-HEADER");
        assert_eq!(parsed.part_number, "EMB-123456");
    }

    #[test]
    fn lur_rejects_empty_fields() {
        assert!(build_lur("", "EMB-1").is_err());
        assert!(build_lur("file.bin", "").is_err());
    }

    #[test]
    fn status_unknown_for_unrecognized_codes() {
        assert_eq!(ArincStatus::from_u16(0x00aa).name(), "Unknown");
        assert_eq!(ArincStatus::from_u16(0x0001).name(), "Accepted");
    }
}
