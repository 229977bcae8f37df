//! Process-wide configuration for the `fls-gse` binary: target address,
//! image to serve, part number, expected maintenance SSID, and the
//! handful of timing knobs the protocol engine exposes. This is CLI /
//! process wiring, not protocol state — it has no counterpart in
//! `fls-core` or `fls-tftp`.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GseError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GseConfig {
    /// IPv4 address of the target LRU.
    pub target_ip: Ipv4Addr,

    /// Remote TFTP port. Almost always 69; overridable for test rigs
    /// that cannot bind the well-known port.
    pub remote_port: u16,

    /// Path to the FLS image to upload. Its basename is embedded in the
    /// LUR frame and served back to the target on RRQ.
    pub image_path: PathBuf,

    /// Part number, expected to match `EMB-...`.
    pub part_number: String,

    /// SSID the host must already be associated with before a session
    /// is allowed to start.
    pub expected_ssid: String,

    /// Per-receive timeout for the primary socket (default 60 s).
    pub recv_timeout_secs: u64,

    /// Extended timeout while awaiting the two final progress LUS
    /// frames, to accommodate target flash time (default 120 s).
    pub final_lus_timeout_secs: u64,

    /// Retry budget owned by the TFTP endpoint (default 5).
    pub max_retries: u32,

    /// Optional static-key handshake, disabled by default. When
    /// enabled, both keys must also be set.
    pub handshake: HandshakeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub enabled: bool,
    /// Hex-encoded GSE static key, sent first.
    pub gse_key_hex: Option<String>,
    /// Hex-encoded key expected back from the target.
    pub expected_bc_key_hex: Option<String>,
}

impl Default for GseConfig {
    fn default() -> Self {
        Self {
            target_ip: Ipv4Addr::new(192, 168, 4, 1),
            remote_port: fls_tftp::DEFAULT_REMOTE_PORT,
            image_path: PathBuf::new(),
            part_number: String::new(),
            expected_ssid: String::new(),
            recv_timeout_secs: fls_tftp::DEFAULT_RECV_TIMEOUT_SECS,
            final_lus_timeout_secs: fls_tftp::FINAL_LUS_TIMEOUT_SECS,
            max_retries: fls_tftp::MAX_RETRIES,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl GseConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: GseConfig = toml::from_str(&text)
            .map_err(|e| GseError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.part_number.is_empty() {
            return Err(GseError::Config("part_number must not be empty".to_string()));
        }
        if !self.part_number.starts_with("EMB-") {
            return Err(GseError::Config(
                "part_number must match EMB-...".to_string(),
            ));
        }
        if self.image_path.as_os_str().is_empty() {
            return Err(GseError::Config("image_path must be set".to_string()));
        }
        if self.expected_ssid.is_empty() {
            return Err(GseError::Config("expected_ssid must not be empty".to_string()));
        }
        if self.recv_timeout_secs == 0 {
            return Err(GseError::Config("recv_timeout_secs must be non-zero".to_string()));
        }
        if self.final_lus_timeout_secs == 0 {
            return Err(GseError::Config(
                "final_lus_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(GseError::Config("max_retries must be non-zero".to_string()));
        }
        if self.handshake.enabled
            && (self.handshake.gse_key_hex.is_none() || self.handshake.expected_bc_key_hex.is_none())
        {
            return Err(GseError::Config(
                "handshake.enabled requires both gse_key_hex and expected_bc_key_hex".to_string(),
            ));
        }
        Ok(())
    }

    /// Decodes the configured handshake keys, if the handshake is
    /// enabled. Returns `None` when disabled.
    pub fn handshake_keys(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        if !self.handshake.enabled {
            return Ok(None);
        }
        let gse_key = hex::decode(self.handshake.gse_key_hex.as_deref().unwrap_or_default())
            .map_err(|e| GseError::Config(format!("invalid gse_key_hex: {e}")))?;
        let expected_bc_key =
            hex::decode(self.handshake.expected_bc_key_hex.as_deref().unwrap_or_default())
                .map_err(|e| GseError::Config(format!("invalid expected_bc_key_hex: {e}")))?;
        Ok(Some((gse_key, expected_bc_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_until_filled_in() {
        let config = GseConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn filled_in_config_validates() {
        let config = GseConfig {
            image_path: PathBuf::from("/tmp/image.bin"),
            part_number: "EMB-0001-021-045".to_string(),
            expected_ssid: "MAINT-WIFI".to_string(),
            ..GseConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn part_number_must_match_emb_prefix() {
        let config = GseConfig {
            image_path: PathBuf::from("/tmp/image.bin"),
            part_number: "WRONG-0001".to_string(),
            expected_ssid: "MAINT-WIFI".to_string(),
            ..GseConfig::default()
        };
        assert!(matches!(config.validate(), Err(GseError::Config(_))));
    }

    #[test]
    fn handshake_enabled_requires_both_keys() {
        let config = GseConfig {
            image_path: PathBuf::from("/tmp/image.bin"),
            part_number: "EMB-0001-021-045".to_string(),
            expected_ssid: "MAINT-WIFI".to_string(),
            handshake: HandshakeConfig {
                enabled: true,
                gse_key_hex: Some("aabb".to_string()),
                expected_bc_key_hex: None,
            },
            ..GseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
