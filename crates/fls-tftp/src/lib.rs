//! RFC 1350 TFTP transport used as the carrier for the ARINC 615A
//! handshake (component C2).

pub mod endpoint;
pub mod error;
pub mod packet;

pub use endpoint::{TftpEndpoint, default_recv_timeout};
pub use error::{Result, TftpError};
pub use packet::{
    DEFAULT_RECV_TIMEOUT_SECS, DEFAULT_REMOTE_PORT, FINAL_LUS_TIMEOUT_SECS, MAX_RETRIES, Opcode,
    Packet, sanitize_filename,
};
