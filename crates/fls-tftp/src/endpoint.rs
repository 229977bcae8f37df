//! RFC 1350 transport (component C2): a single endpoint that plays both
//! roles of the ARINC 615A exchange — TFTP client (RRQ/WRQ initiator)
//! and micro-server (answering an RRQ/WRQ from the target on an
//! ephemeral TID).

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Result, TftpError};
use crate::packet::{
    DEFAULT_RECV_TIMEOUT_SECS, DEFAULT_REMOTE_PORT, MAX_RETRIES, OCTET_MODE, Packet,
    sanitize_filename,
};

const BLOCK_SIZE: usize = 512;
const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

fn backoff_delay(attempt: u32) -> Duration {
    let secs = 0.25_f64 * 2f64.powi(attempt as i32 - 1);
    Duration::from_secs_f64(secs.min(2.0))
}

/// Owns the primary UDP socket for one ARINC 615A session. Created at
/// session start, closed on session termination or error.
pub struct TftpEndpoint {
    socket: UdpSocket,
    remote_ip: Ipv4Addr,
    remote_port: u16,
    recv_timeout: Duration,
    server_tid: Option<u16>,
    max_retries: u32,
}

impl TftpEndpoint {
    /// Bind the primary socket on an OS-assigned ephemeral port, talking
    /// to the canonical TFTP port 69 on `remote_ip`.
    pub async fn open(remote_ip: Ipv4Addr, recv_timeout: Duration) -> Result<Self> {
        Self::open_to(remote_ip, DEFAULT_REMOTE_PORT, recv_timeout).await
    }

    /// As [`Self::open`], but against an arbitrary remote port. Used by
    /// tests to stand up a loopback target without binding the
    /// privileged well-known port.
    pub async fn open_to(remote_ip: Ipv4Addr, remote_port: u16, recv_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        debug!(local_addr = ?socket.local_addr()?, %remote_ip, remote_port, "TFTP endpoint opened");
        Ok(Self {
            socket,
            remote_ip,
            remote_port,
            recv_timeout,
            server_tid: None,
            max_retries: MAX_RETRIES,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote_ip.into(), self.remote_port)
    }

    /// The OS-assigned local address of the primary socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    pub fn set_recv_timeout(&mut self, t: Duration) {
        self.recv_timeout = t;
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn set_max_retries(&mut self, n: u32) {
        self.max_retries = n;
    }

    fn learned_addr(&self) -> Option<SocketAddr> {
        self.server_tid
            .map(|port| SocketAddr::new(self.remote_ip.into(), port))
    }

    async fn recv_packet(&self, t: Duration) -> Result<(Packet, SocketAddr)> {
        let mut buf = vec![0u8; BLOCK_SIZE + 4 + 32];
        let (len, from) = timeout(t, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| TftpError::Timeout)??;
        let pkt = Packet::decode(&buf[..len])?;
        Ok((pkt, from))
    }

    async fn send_packet(&self, pkt: &Packet, to: SocketAddr) -> Result<()> {
        self.socket.send_to(&pkt.encode(), to).await?;
        Ok(())
    }

    /// RRQ client operation: read a file from the target.
    pub async fn read_file(&mut self, filename: &str) -> Result<Vec<u8>> {
        self.server_tid = None;
        let filename = sanitize_filename(filename)?;
        let rrq = Packet::Rrq {
            filename: filename.clone(),
            mode: OCTET_MODE.to_string(),
        };
        self.send_packet(&rrq, self.remote_addr()).await?;

        let mut buffer = Vec::new();
        let mut expected_block: u16 = 1;
        let mut retries: u32 = 0;

        loop {
            match self.recv_packet(self.recv_timeout).await {
                Ok((pkt, from)) => match pkt {
                    Packet::Error { code, message } => {
                        return Err(TftpError::Remote { code, message });
                    }
                    Packet::Data { block, payload } => {
                        if from.ip() != std::net::IpAddr::V4(self.remote_ip) {
                            warn!(?from, expected_ip = %self.remote_ip, "UNKNOWN_TID: discarding datagram from unexpected address");
                            continue;
                        }
                        if self.server_tid.is_none() {
                            self.server_tid = Some(from.port());
                        } else if Some(from.port()) != self.server_tid {
                            warn!(?from, "UNKNOWN_TID: discarding datagram from unexpected source");
                            continue;
                        }

                        if block != expected_block {
                            let ack = Packet::Ack {
                                block: expected_block.wrapping_sub(1),
                            };
                            self.send_packet(&ack, from).await?;
                            continue;
                        }

                        let is_final = payload.len() < BLOCK_SIZE;
                        buffer.extend_from_slice(&payload);
                        self.send_packet(&Packet::Ack { block }, from).await?;
                        expected_block = expected_block.wrapping_add(1);
                        retries = 0;

                        if is_final {
                            return Ok(buffer);
                        }
                    }
                    other => {
                        warn!(?other, "unexpected opcode while reading file, ignoring");
                    }
                },
                Err(TftpError::Timeout) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TftpError::TransferFailure { attempts: retries });
                    }
                    if expected_block == 1 {
                        self.send_packet(&rrq, self.remote_addr()).await?;
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// WRQ client operation: write a file to the target.
    pub async fn write_file(&mut self, filename: &str, data: &[u8]) -> Result<()> {
        self.server_tid = None;
        let filename = sanitize_filename(filename)?;
        let wrq = Packet::Wrq {
            filename,
            mode: OCTET_MODE.to_string(),
        };
        self.send_packet(&wrq, self.remote_addr()).await?;

        // Wait for ACK(0), latching the server TID.
        let mut retries = 0;
        loop {
            match self.recv_packet(self.recv_timeout).await {
                Ok((Packet::Ack { block: 0 }, from)) => {
                    if from.ip() != std::net::IpAddr::V4(self.remote_ip) {
                        warn!(?from, expected_ip = %self.remote_ip, "UNKNOWN_TID: discarding ACK from unexpected address");
                        continue;
                    }
                    self.server_tid = Some(from.port());
                    break;
                }
                Ok((Packet::Error { code, message }, _)) => {
                    return Err(TftpError::Remote { code, message });
                }
                Ok((other, _)) => {
                    return Err(TftpError::ProtocolViolation {
                        expected: "ACK 0".to_string(),
                        got: format!("{other:?}"),
                    });
                }
                Err(TftpError::Timeout) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TftpError::TransferFailure { attempts: retries });
                    }
                    self.send_packet(&wrq, self.remote_addr()).await?;
                }
                Err(other) => return Err(other),
            }
        }

        // write_file terminates at the last chunk, short or not — unlike
        // serve_file_on_rrq it never sends a trailing zero-length block
        // when data.len() is an exact multiple of BLOCK_SIZE.
        let mut block: u16 = 1;
        let mut offset = 0usize;
        loop {
            let end = (offset + BLOCK_SIZE).min(data.len());
            let chunk = &data[offset..end];
            self.send_and_await_ack(block, chunk).await?;
            offset = end;
            if offset >= data.len() {
                return Ok(());
            }
            block = block.wrapping_add(1);
        }
    }

    async fn send_and_await_ack(&self, block: u16, chunk: &[u8]) -> Result<()> {
        let to = self.learned_addr().expect("server TID must be latched before sending DATA");
        let data_pkt = Packet::Data {
            block,
            payload: chunk.to_vec(),
        };
        let mut retries = 0;
        loop {
            self.send_packet(&data_pkt, to).await?;
            match self.recv_packet(self.recv_timeout).await {
                Ok((Packet::Ack { block: acked }, from)) => {
                    if from != to {
                        warn!(?from, "UNKNOWN_TID: discarding ACK from unexpected source");
                        continue;
                    }
                    if acked == block {
                        return Ok(());
                    }
                }
                Ok((Packet::Error { code, message }, _)) => {
                    return Err(TftpError::Remote { code, message });
                }
                Ok(_) => continue,
                Err(TftpError::Timeout) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TftpError::TransferFailure { attempts: retries });
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Server-role operation: answer a RRQ from the target, serving the
    /// image followed by a single trailer DATA block carrying the
    /// SHA-256 hash.
    pub async fn serve_file_on_rrq(
        &self,
        expected_filename: &str,
        file_bytes: &[u8],
        hash_bytes: &[u8; 32],
        mut progress_cb: impl FnMut(u8),
    ) -> Result<()> {
        let (pkt, _from) = self.recv_packet(self.recv_timeout).await?;
        let requested = match pkt {
            Packet::Rrq { filename, .. } => filename,
            other => {
                return Err(TftpError::ProtocolViolation {
                    expected: "RRQ".to_string(),
                    got: format!("{other:?}"),
                });
            }
        };
        if requested != expected_filename {
            return Err(TftpError::FilenameMismatch {
                expected: expected_filename.to_string(),
                got: requested,
            });
        }

        // Re-receive on a fresh ephemeral socket; bind to any source
        // port but otherwise speak to the target's requesting address.
        // The original RRQ was observed on the primary socket above, so
        // we already know the peer; a second socket is opened purely so
        // the primary socket remains free for any unrelated traffic.
        let serve_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let peer = SocketAddr::new(self.remote_ip.into(), _from.port());

        let total_bytes = file_bytes.len();
        let mut offset = 0usize;
        let mut block: u16 = 1;

        while offset < total_bytes {
            let end = (offset + BLOCK_SIZE).min(total_bytes);
            let chunk = &file_bytes[offset..end];
            Self::send_data_and_wait_ack(&serve_socket, block, chunk, peer, self.max_retries, self.recv_timeout)
                .await?;
            offset = end;
            let pct = ((offset as f64 / total_bytes as f64) * 100.0) as u8;
            progress_cb(pct.clamp(0, 100));
            block = block.wrapping_add(1);
        }

        if total_bytes > 0 && total_bytes % BLOCK_SIZE == 0 {
            Self::send_data_and_wait_ack(&serve_socket, block, &[], peer, self.max_retries, self.recv_timeout)
                .await?;
            block = block.wrapping_add(1);
        }

        // HASH trailer block: no progress callback.
        Self::send_data_and_wait_ack(
            &serve_socket,
            block,
            hash_bytes.as_slice(),
            peer,
            self.max_retries,
            self.recv_timeout,
        )
        .await?;

        Ok(())
    }

    async fn send_data_and_wait_ack(
        socket: &UdpSocket,
        block: u16,
        payload: &[u8],
        peer: SocketAddr,
        max_retries: u32,
        ack_timeout: Duration,
    ) -> Result<()> {
        let data_pkt = Packet::Data {
            block,
            payload: payload.to_vec(),
        };
        let mut retries: u32 = 0;
        loop {
            socket.send_to(&data_pkt.encode(), peer).await?;
            let mut buf = vec![0u8; BLOCK_SIZE + 4];
            match timeout(ack_timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    if from != peer {
                        warn!(?from, %peer, "ignoring ACK from unexpected address");
                        continue;
                    }
                    match Packet::decode(&buf[..len])? {
                        Packet::Ack { block: acked } if acked == block => return Ok(()),
                        Packet::Ack { .. } => continue,
                        Packet::Error { code, message } => {
                            return Err(TftpError::Remote { code, message });
                        }
                        other => {
                            warn!(?other, "unexpected packet while awaiting ACK, ignoring");
                        }
                    }
                }
                Ok(Err(e)) => return Err(TftpError::Io(e)),
                Err(_) => {
                    retries += 1;
                    if retries >= max_retries {
                        return Err(TftpError::TransferFailure { attempts: retries });
                    }
                    tokio::time::sleep(backoff_delay(retries)).await;
                }
            }
        }
    }

    /// Server-role operation: receive a WRQ and its single DATA(1) block
    /// (used for the initial LUS and the progress LUS frames).
    pub async fn receive_wrq_and_data(&self) -> Result<Vec<u8>> {
        let (pkt, from) = self.recv_packet(self.recv_timeout).await?;
        match pkt {
            Packet::Wrq { .. } => {}
            other => {
                return Err(TftpError::ProtocolViolation {
                    expected: "WRQ".to_string(),
                    got: format!("{other:?}"),
                });
            }
        }
        self.send_packet(&Packet::Ack { block: 0 }, from).await?;

        let (pkt, data_from) = self.recv_packet(self.recv_timeout).await?;
        if data_from.port() != from.port() {
            return Err(TftpError::ProtocolViolation {
                expected: format!("DATA from TID {}", from.port()),
                got: format!("TID {}", data_from.port()),
            });
        }
        match pkt {
            Packet::Data { block: 1, payload } => {
                self.send_packet(&Packet::Ack { block: 1 }, data_from).await?;
                Ok(payload)
            }
            other => Err(TftpError::ProtocolViolation {
                expected: "DATA block 1".to_string(),
                got: format!("{other:?}"),
            }),
        }
    }

    /// Optional static-key handshake: disabled by default,
    /// gated behind a session-level feature flag. Restores the receive
    /// timeout on every exit path.
    pub async fn verify_static_key(&mut self, gse_key: &[u8], expected_bc_key: &[u8]) -> Result<()> {
        let original_timeout = self.recv_timeout;
        self.recv_timeout = Duration::from_secs(HANDSHAKE_TIMEOUT_SECS);
        let result = self.run_static_key_handshake(gse_key, expected_bc_key).await;
        self.recv_timeout = original_timeout;
        result
    }

    async fn run_static_key_handshake(&self, gse_key: &[u8], expected_bc_key: &[u8]) -> Result<()> {
        let to = self.remote_addr();
        self.send_packet(
            &Packet::Data {
                block: 1,
                payload: gse_key.to_vec(),
            },
            to,
        )
        .await?;

        let (pkt, from) = self.recv_packet(self.recv_timeout).await?;
        match pkt {
            Packet::Ack { block: 1 } => {}
            other => {
                return Err(TftpError::ProtocolViolation {
                    expected: "ACK 1".to_string(),
                    got: format!("{other:?}"),
                });
            }
        }

        let (pkt, _) = self.recv_packet(self.recv_timeout).await?;
        match pkt {
            Packet::Data { block: 1, payload } => {
                if payload != expected_bc_key {
                    return Err(TftpError::ProtocolViolation {
                        expected: "matching static key".to_string(),
                        got: "mismatched key".to_string(),
                    });
                }
                self.send_packet(&Packet::Ack { block: 1 }, from).await?;
                Ok(())
            }
            other => Err(TftpError::ProtocolViolation {
                expected: "DATA block 1 carrying the target's key".to_string(),
                got: format!("{other:?}"),
            }),
        }
    }
}

pub fn default_recv_timeout() -> Duration {
    Duration::from_secs(DEFAULT_RECV_TIMEOUT_SECS)
}
