//! Pre-flight Wi-Fi SSID gate (component C5): a single-shot check that
//! the host is joined to the maintenance network before a session is
//! allowed to start.

use std::process::Command;

use tracing::warn;

use crate::error::{Result, SessionError};

/// Queries the OS for the currently-associated SSID and compares it to
/// `ssid_expected`. Warns and returns success on platforms with no known
/// query mechanism — this check is non-blocking by design.
pub fn check_wifi(ssid_expected: &str, mut log_cb: impl FnMut(&str)) -> Result<()> {
    match current_ssid() {
        Ok(Some(ssid)) if ssid == ssid_expected => {
            log_cb(&format!("Wi-Fi SSID matches expected network {ssid_expected}"));
            Ok(())
        }
        Ok(Some(got)) => Err(SessionError::WifiMismatch {
            expected: ssid_expected.to_string(),
            got,
        }),
        Ok(None) => Err(SessionError::WifiDisconnected),
        Err(WifiQueryError::UnsupportedPlatform) => {
            warn!("Wi-Fi SSID check is not supported on this platform, skipping");
            log_cb("Wi-Fi SSID check skipped: unsupported platform");
            Ok(())
        }
        Err(WifiQueryError::CommandFailed(reason)) => Err(SessionError::WifiCheckFailure(reason)),
    }
}

enum WifiQueryError {
    UnsupportedPlatform,
    CommandFailed(String),
}

/// Returns `Ok(Some(ssid))` when associated, `Ok(None)` when the
/// adapter reports no association, `Err` when the platform tool could
/// not be invoked at all.
fn current_ssid() -> std::result::Result<Option<String>, WifiQueryError> {
    #[cfg(target_os = "linux")]
    {
        linux_ssid()
    }
    #[cfg(target_os = "macos")]
    {
        macos_ssid()
    }
    #[cfg(target_os = "windows")]
    {
        windows_ssid()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(WifiQueryError::UnsupportedPlatform)
    }
}

#[cfg(target_os = "linux")]
fn linux_ssid() -> std::result::Result<Option<String>, WifiQueryError> {
    let output = Command::new("nmcli")
        .args(["-t", "-f", "active,ssid", "dev", "wifi"])
        .output()
        .map_err(|e| WifiQueryError::CommandFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(WifiQueryError::CommandFailed(format!(
            "nmcli exited with status {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(ssid) = line.strip_prefix("yes:") {
            return Ok(Some(ssid.to_string()));
        }
    }
    Ok(None)
}

#[cfg(target_os = "macos")]
fn macos_ssid() -> std::result::Result<Option<String>, WifiQueryError> {
    let airport = "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";
    let output = Command::new(airport)
        .arg("-I")
        .output()
        .map_err(|e| WifiQueryError::CommandFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(WifiQueryError::CommandFailed(format!(
            "airport exited with status {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(ssid) = line.trim().strip_prefix("SSID: ") {
            return Ok(Some(ssid.to_string()));
        }
    }
    Ok(None)
}

#[cfg(target_os = "windows")]
fn windows_ssid() -> std::result::Result<Option<String>, WifiQueryError> {
    let output = Command::new("netsh")
        .args(["wlan", "show", "interfaces"])
        .output()
        .map_err(|e| WifiQueryError::CommandFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(WifiQueryError::CommandFailed(format!(
            "netsh exited with status {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        let trimmed = line.trim();
        if let Some(ssid) = trimmed.strip_prefix("SSID") {
            if let Some((_, value)) = ssid.split_once(':') {
                return Ok(Some(value.trim().to_string()));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_error_message_names_both_networks() {
        let err = SessionError::WifiMismatch {
            expected: "MAINT-WIFI".to_string(),
            got: "GUEST".to_string(),
        };
        assert!(err.to_string().contains("MAINT-WIFI"));
        assert!(err.to_string().contains("GUEST"));
    }

    #[test]
    fn disconnected_error_message_is_stable() {
        assert_eq!(
            SessionError::WifiDisconnected.to_string(),
            "Wi-Fi adapter is not associated with any network"
        );
    }
}
