//! Session worker (component C4): runs one upload on a background task
//! and bridges the session's `log`/`progress` callbacks to observers
//! through a channel, guaranteeing socket teardown on every exit path.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use fls_tftp::{DEFAULT_REMOTE_PORT, TftpEndpoint};

use crate::error::SessionError;
use crate::session::ArincSession;

pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Observer signals, mirroring the GUI's progress/log/completion
/// callbacks over a thread-safe channel instead of
/// toolkit-specific signal/slot emissions.
#[derive(Debug, Clone)]
pub enum Event {
    Log(String),
    Progress(u8),
    Completed(bool),
    TransferStarted(Ipv4Addr),
    FileDetailsReady { part_number: String, path: PathBuf },
}

/// Everything `start_session` needs to construct the endpoint and drive
/// one `run_upload_flow` invocation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target_ip: Ipv4Addr,
    pub remote_port: u16,
    pub image_path: PathBuf,
    pub part_number: String,
    pub recv_timeout: Duration,
    pub final_lus_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub handshake: Option<(Vec<u8>, Vec<u8>)>,
}

impl SessionConfig {
    /// Convenience constructor targeting the canonical TFTP port, with
    /// the transport's built-in defaults for retries and the final-LUS
    /// timeout.
    pub fn new(target_ip: Ipv4Addr, image_path: PathBuf, part_number: String, recv_timeout: Duration) -> Self {
        Self {
            target_ip,
            remote_port: DEFAULT_REMOTE_PORT,
            image_path,
            part_number,
            recv_timeout,
            final_lus_timeout: None,
            max_retries: None,
            handshake: None,
        }
    }
}

/// Spawns the background task that owns the endpoint for the lifetime
/// of one session and returns its join handle plus the receiving end of
/// the observer channel.
pub fn start_session(config: SessionConfig) -> (JoinHandle<()>, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(config, tx));
    (handle, rx)
}

async fn run(config: SessionConfig, tx: mpsc::UnboundedSender<Event>) {
    let session_id = crate::audit::new_session_id();
    crate::audit::session_started(&session_id, config.target_ip, &config.part_number).log();

    let _ = tx.send(Event::TransferStarted(config.target_ip));
    let _ = tx.send(Event::FileDetailsReady {
        part_number: config.part_number.clone(),
        path: config.image_path.clone(),
    });

    let mut endpoint =
        match TftpEndpoint::open_to(config.target_ip, config.remote_port, config.recv_timeout).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            let err = SessionError::TransportInitFailure(e.to_string());
            error!(error = %err, "failed to open TFTP endpoint");
            crate::audit::session_aborted(&session_id, &err.to_string()).log();
            let _ = tx.send(Event::Log(format!("transport init failed: {err}")));
            let _ = tx.send(Event::Completed(false));
            return;
        }
    };
    if let Some(max_retries) = config.max_retries {
        endpoint.set_max_retries(max_retries);
    }

    let tx_log = tx.clone();
    let tx_progress = tx.clone();
    let mut session = ArincSession::new(
        &mut endpoint,
        move |line: &str| {
            info!(%line, "session log");
            let _ = tx_log.send(Event::Log(line.to_string()));
        },
        move |pct: u8| {
            let _ = tx_progress.send(Event::Progress(pct));
        },
    );
    if let Some((gse_key, expected_bc_key)) = config.handshake.clone() {
        session = session.with_handshake(gse_key, expected_bc_key);
    }
    if let Some(final_lus_timeout) = config.final_lus_timeout {
        session = session.with_final_lus_timeout(final_lus_timeout);
    }

    let result = session.run_upload_flow(&config.image_path, &config.part_number).await;
    drop(session);
    drop(endpoint);

    match result {
        Ok(()) => {
            info!("upload flow completed");
            crate::audit::session_completed(&session_id).log();
            let _ = tx.send(Event::Completed(true));
        }
        Err(e) => {
            error!(error = %e, "upload flow aborted");
            crate::audit::session_aborted(&session_id, &e.to_string()).log();
            let _ = tx.send(Event::Log(format!("aborted: {e}")));
            let _ = tx.send(Event::Completed(false));
        }
    }
}
