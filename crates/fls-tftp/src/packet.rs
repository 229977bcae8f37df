//! RFC 1350 packet framing: opcodes, the five packet shapes, and the
//! filename sanitiser applied before any outbound RRQ/WRQ.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TftpError};

pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_REMOTE_PORT: u16 = 69;
pub const DEFAULT_RECV_TIMEOUT_SECS: u64 = 60;
pub const FINAL_LUS_TIMEOUT_SECS: u64 = 120;
pub const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Rrq = 1,
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl Opcode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Opcode::Rrq),
            2 => Some(Opcode::Wrq),
            3 => Some(Opcode::Data),
            4 => Some(Opcode::Ack),
            5 => Some(Opcode::Error),
            _ => None,
        }
    }
}

/// Transfer mode. The core only ever serialises `"octet"`.
pub const OCTET_MODE: &str = "octet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq { filename: String, mode: String },
    Wrq { filename: String, mode: String },
    Data { block: u16, payload: Vec<u8> },
    Ack { block: u16 },
    Error { code: u16, message: String },
}

impl Packet {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            Packet::Rrq { filename, mode } => {
                buf.put_u16(Opcode::Rrq as u16);
                buf.put(filename.as_bytes());
                buf.put_u8(0);
                buf.put(mode.as_bytes());
                buf.put_u8(0);
            }
            Packet::Wrq { filename, mode } => {
                buf.put_u16(Opcode::Wrq as u16);
                buf.put(filename.as_bytes());
                buf.put_u8(0);
                buf.put(mode.as_bytes());
                buf.put_u8(0);
            }
            Packet::Data { block, payload } => {
                buf.put_u16(Opcode::Data as u16);
                buf.put_u16(*block);
                buf.put(payload.as_slice());
            }
            Packet::Ack { block } => {
                buf.put_u16(Opcode::Ack as u16);
                buf.put_u16(*block);
            }
            Packet::Error { code, message } => {
                buf.put_u16(Opcode::Error as u16);
                buf.put_u16(*code);
                buf.put(message.as_bytes());
                buf.put_u8(0);
            }
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(TftpError::ProtocolViolation {
                expected: "at least 2 bytes (opcode)".to_string(),
                got: format!("{} bytes", data.len()),
            });
        }
        let mut bytes = BytesMut::from(data);
        let opcode_raw = bytes.get_u16();
        let opcode = Opcode::from_u16(opcode_raw).ok_or_else(|| TftpError::ProtocolViolation {
            expected: "a known opcode".to_string(),
            got: format!("{opcode_raw}"),
        })?;

        match opcode {
            Opcode::Rrq | Opcode::Wrq => {
                let filename = read_cstring(&mut bytes)?;
                let mode = read_cstring(&mut bytes)?;
                if opcode == Opcode::Rrq {
                    Ok(Packet::Rrq { filename, mode })
                } else {
                    Ok(Packet::Wrq { filename, mode })
                }
            }
            Opcode::Data => {
                if bytes.len() < 2 {
                    return Err(TftpError::ProtocolViolation {
                        expected: "DATA block number".to_string(),
                        got: "truncated".to_string(),
                    });
                }
                let block = bytes.get_u16();
                let payload = bytes.to_vec();
                Ok(Packet::Data { block, payload })
            }
            Opcode::Ack => {
                if bytes.len() < 2 {
                    return Err(TftpError::ProtocolViolation {
                        expected: "ACK block number".to_string(),
                        got: "truncated".to_string(),
                    });
                }
                let block = bytes.get_u16();
                Ok(Packet::Ack { block })
            }
            Opcode::Error => {
                if bytes.len() < 2 {
                    return Err(TftpError::ProtocolViolation {
                        expected: "ERROR code".to_string(),
                        got: "truncated".to_string(),
                    });
                }
                let code = bytes.get_u16();
                let message = String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\0')
                    .to_string();
                Ok(Packet::Error { code, message })
            }
        }
    }
}

fn read_cstring(bytes: &mut BytesMut) -> Result<String> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| TftpError::ProtocolViolation {
            expected: "NUL-terminated field".to_string(),
            got: "no terminator found".to_string(),
        })?;
    let raw = bytes.split_to(nul);
    bytes.advance(1); // skip the NUL
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Sanitise a filename before building any RRQ/WRQ:
/// normalise separators, keep only the final path segment, reject `..`,
/// map any character outside `[A-Za-z0-9._-@+]` to `_`, reject empty
/// results. Idempotent when it does not raise.
pub fn sanitize_filename(raw: &str) -> Result<String> {
    let normalized = raw.replace('\\', "/");
    let last_segment = normalized.rsplit('/').next().unwrap_or("");
    if last_segment.contains("..") {
        return Err(TftpError::InvalidFilename(raw.to_string()));
    }
    let sanitized: String = last_segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        return Err(TftpError::InvalidFilename(raw.to_string()));
    }
    Ok(sanitized)
}
