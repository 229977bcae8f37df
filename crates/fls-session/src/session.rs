//! The five-step ARINC 615A exchange (component C3): LUI, initial LUS,
//! LUR, image + hash trailer, then the two progress LUS frames.

use std::path::Path;
use std::time::Duration;

use fls_core::{ArincStatus, build_lur, parse_lui, parse_lus, sha256};
use fls_tftp::{FINAL_LUS_TIMEOUT_SECS, TftpEndpoint};
use tracing::warn;

use crate::error::{Result, SessionError};

const LUI_FILENAME: &str = "system.LUI";
const LUR_FILENAME: &str = "test.LUR";

/// States of the protocol sequence. Failure anywhere moves to `Aborted`;
/// the state itself is only useful for logging — the driver below never
/// branches back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Step1ReadLui,
    Step2AwaitLusInit,
    Step3SendLur,
    Step4ServeImage,
    Step5AwaitLusProgress,
    Completed,
    Aborted,
}

/// Borrows the endpoint for the duration of one `run_upload_flow` call
/// and never outlives the worker that owns it.
pub struct ArincSession<'a> {
    endpoint: &'a mut TftpEndpoint,
    log: Box<dyn FnMut(&str) + Send + 'a>,
    progress: Box<dyn FnMut(u8) + Send + 'a>,
    state: SessionState,
    handshake: Option<(Vec<u8>, Vec<u8>)>,
    final_lus_timeout: Duration,
}

impl<'a> ArincSession<'a> {
    pub fn new(
        endpoint: &'a mut TftpEndpoint,
        log_cb: impl FnMut(&str) + Send + 'a,
        progress_cb: impl FnMut(u8) + Send + 'a,
    ) -> Self {
        Self {
            endpoint,
            log: Box::new(log_cb),
            progress: Box::new(progress_cb),
            state: SessionState::Idle,
            handshake: None,
            final_lus_timeout: Duration::from_secs(FINAL_LUS_TIMEOUT_SECS),
        }
    }

    /// Enables the optional static-key pre-exchange, run once
    /// before Step 1. Disabled by default — the default flow skips it.
    pub fn with_handshake(mut self, gse_key: Vec<u8>, expected_bc_key: Vec<u8>) -> Self {
        self.handshake = Some((gse_key, expected_bc_key));
        self
    }

    /// Overrides the extended receive timeout used while awaiting the
    /// two final progress LUS frames. Defaults to 120 s; tests shrink it
    /// to keep the final-LUS-timeout scenario fast.
    pub fn with_final_lus_timeout(mut self, timeout: Duration) -> Self {
        self.final_lus_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the full upload sequence. `part_number` must be non-empty;
    /// `file_path` must be readable. Any transport error aborts the
    /// session unchanged (C3 never retries a step — retries are owned
    /// by C2).
    pub async fn run_upload_flow(&mut self, file_path: &Path, part_number: &str) -> Result<()> {
        if part_number.is_empty() {
            return Err(SessionError::InvalidArguments(
                "part_number must not be empty".to_string(),
            ));
        }

        let result = self.drive(file_path, part_number).await;
        self.state = if result.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Aborted
        };
        result
    }

    async fn drive(&mut self, file_path: &Path, part_number: &str) -> Result<()> {
        if let Some((gse_key, expected_bc_key)) = self.handshake.clone() {
            (self.log)("running static-key handshake");
            self.endpoint.verify_static_key(&gse_key, &expected_bc_key).await?;
        }

        self.state = SessionState::Step1ReadLui;
        self.step1_read_lui().await?;

        self.state = SessionState::Step2AwaitLusInit;
        self.step2_await_lus_init().await?;

        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SessionError::InvalidArguments("image path has no filename".to_string()))?
            .to_string();

        self.state = SessionState::Step3SendLur;
        self.step3_send_lur(&filename, part_number).await?;

        self.state = SessionState::Step4ServeImage;
        self.step4_serve_image(file_path, &filename).await?;

        self.state = SessionState::Step5AwaitLusProgress;
        self.step5_await_lus_progress().await?;

        Ok(())
    }

    async fn step1_read_lui(&mut self) -> Result<()> {
        let buf = self.endpoint.read_file(LUI_FILENAME).await?;
        let lui = parse_lui(&buf)?;
        let status = lui.status();
        if !status.is_accepted_or_completed() {
            warn!(status = %status.as_hex(), name = %status.name(), "LUI status not accepted/completed, proceeding anyway");
            (self.log)(&format!(
                "LUI status {} ({}) — continuing",
                status.as_hex(),
                status.name()
            ));
        }
        (self.progress)(10);
        Ok(())
    }

    async fn step2_await_lus_init(&mut self) -> Result<()> {
        let buf = self.endpoint.receive_wrq_and_data().await?;
        let _lus = parse_lus(&buf)?;
        (self.progress)(25);
        Ok(())
    }

    async fn step3_send_lur(&mut self, filename: &str, part_number: &str) -> Result<()> {
        let lur_bytes = build_lur(filename, part_number)?;
        self.endpoint.write_file(LUR_FILENAME, &lur_bytes).await?;
        (self.progress)(40);
        Ok(())
    }

    async fn step4_serve_image(&mut self, file_path: &Path, filename: &str) -> Result<()> {
        let image_bytes = std::fs::read(file_path)?;
        let digest = sha256(&image_bytes).map_err(|e| SessionError::Hash(e.to_string()))?;

        let progress = &mut self.progress;
        self.endpoint
            .serve_file_on_rrq(filename, &image_bytes, &digest, move |pct| {
                let mapped = 40 + ((pct as u32 * 30) / 100) as u8;
                progress(mapped.min(70));
            })
            .await?;
        (self.progress)(70);
        Ok(())
    }

    /// Awaits the LUS-50 and LUS-100 frames under an extended receive
    /// timeout (up to 120 s, to accommodate target flash time); the
    /// pre-existing timeout is restored on every exit path, including
    /// error.
    async fn step5_await_lus_progress(&mut self) -> Result<()> {
        let original_timeout = self.endpoint.recv_timeout();
        self.endpoint.set_recv_timeout(self.final_lus_timeout);
        let result = self.await_progress_frames().await;
        self.endpoint.set_recv_timeout(original_timeout);

        if let Err(SessionError::Transport(fls_tftp::TftpError::Timeout)) = &result {
            (self.log)("timed out awaiting the final progress LUS");
        }
        result
    }

    async fn await_progress_frames(&mut self) -> Result<()> {
        let buf = self.endpoint.receive_wrq_and_data().await?;
        let lus = parse_lus(&buf)?;
        if lus.progress_pct != 50 {
            warn!(progress = lus.progress_pct, "expected 50%% progress LUS, got different value");
        }
        (self.progress)(85);

        let buf = self.endpoint.receive_wrq_and_data().await?;
        let lus = parse_lus(&buf)?;
        if lus.progress_pct != 100 {
            warn!(progress = lus.progress_pct, "expected 100%% progress LUS, got different value");
        }
        (self.progress)(100);
        Ok(())
    }
}
