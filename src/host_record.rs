use std::net::IpAddr;

use bincode::{Decode, Encode};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Hostname recorded when reverse resolution fails or times out
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// One known-hosts log entry.
///
/// `hostname` is never empty: a failed, timed-out or blank lookup is
/// recorded as [`UNKNOWN_HOSTNAME`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct HostRecord {
    /// Milliseconds since the Unix epoch when the host was first seen
    pub timestamp: i64,
    pub host: IpAddr,
    pub hostname: String,
}

impl HostRecord {
    pub fn new(host: IpAddr, hostname: impl Into<String>) -> Self {
        Self::with_timestamp(Utc::now().timestamp_millis(), host, hostname)
    }

    pub fn with_timestamp(timestamp: i64, host: IpAddr, hostname: impl Into<String>) -> Self {
        Self {
            timestamp,
            host,
            hostname: normalize_hostname(hostname.into()),
        }
    }

    pub fn unresolved(host: IpAddr) -> Self {
        Self::new(host, UNKNOWN_HOSTNAME)
    }

    pub fn is_resolved(&self) -> bool {
        self.hostname != UNKNOWN_HOSTNAME
    }

    pub fn seen_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Trim whitespace and a trailing root dot; blank names become the sentinel.
pub fn normalize_hostname(name: String) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        UNKNOWN_HOSTNAME.to_string()
    } else if trimmed.len() == name.len() {
        name
    } else {
        trimmed.to_string()
    }
}
