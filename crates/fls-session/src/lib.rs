//! The ARINC 615A session state machine (C3), its background worker
//! (C4), and the Wi-Fi pre-flight gate (C5).

pub mod audit;
pub mod error;
pub mod session;
pub mod wifi;
pub mod worker;

pub use error::{Result, SessionError};
pub use session::{ArincSession, SessionState};
pub use wifi::check_wifi;
pub use worker::{Event, EventReceiver, SessionConfig, start_session};
