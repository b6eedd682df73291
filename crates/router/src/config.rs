//! Router configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default protocol timeout, matching what browsers tolerate for slow
/// commands such as `Page.printToPDF`.
pub const DEFAULT_PROTOCOL_TIMEOUT_MS: u64 = 180_000;

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Label used in log spans
    pub id: String,
    pub ws_url: String,
    /// `None` disables command timeouts
    pub protocol_timeout_ms: Option<u64>,
    /// Delay applied before each inbound message is processed
    pub slow_mo_ms: u64,
    /// Events buffered per session while its attach is in flight
    pub early_event_limit: usize,
    pub bus_capacity: usize,
    pub max_pending_calls: Option<usize>,
    /// Torn-down session ids remembered so late use reports `SessionClosed`
    pub detached_session_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            ws_url: "ws://localhost:9222/devtools/browser".to_string(),
            protocol_timeout_ms: Some(DEFAULT_PROTOCOL_TIMEOUT_MS),
            slow_mo_ms: 0,
            early_event_limit: 1024,
            bus_capacity: 1024,
            max_pending_calls: None,
            detached_session_limit: 1024,
        }
    }
}

impl RouterConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_protocol_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.protocol_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_slow_mo(mut self, delay: Duration) -> Self {
        self.slow_mo_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_early_event_limit(mut self, limit: usize) -> Self {
        self.early_event_limit = limit;
        self
    }

    pub fn with_max_pending_calls(mut self, max: Option<usize>) -> Self {
        self.max_pending_calls = max;
        self
    }

    pub fn with_detached_session_limit(mut self, limit: usize) -> Self {
        self.detached_session_limit = limit;
        self
    }

    pub fn protocol_timeout(&self) -> Option<Duration> {
        self.protocol_timeout_ms.map(Duration::from_millis)
    }

    pub fn slow_mo(&self) -> Option<Duration> {
        (self.slow_mo_ms > 0).then(|| Duration::from_millis(self.slow_mo_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(
            config.protocol_timeout(),
            Some(Duration::from_millis(DEFAULT_PROTOCOL_TIMEOUT_MS))
        );
        assert_eq!(config.slow_mo(), None);
        assert!(!config.id.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RouterConfig::from_json_str(
            r#"{"ws_url":"ws://127.0.0.1:9333/devtools/browser/abc","protocol_timeout_ms":null}"#,
        )
        .unwrap();
        assert_eq!(config.ws_url, "ws://127.0.0.1:9333/devtools/browser/abc");
        assert_eq!(config.protocol_timeout(), None);
        assert_eq!(config.early_event_limit, 1024);
        assert_eq!(config.detached_session_limit, 1024);
    }

    #[test]
    fn test_builders() {
        let config = RouterConfig::default()
            .with_protocol_timeout(Some(Duration::from_secs(5)))
            .with_slow_mo(Duration::from_millis(20))
            .with_max_pending_calls(Some(8));
        assert_eq!(config.protocol_timeout_ms, Some(5000));
        assert_eq!(config.slow_mo(), Some(Duration::from_millis(20)));
        assert_eq!(config.max_pending_calls, Some(8));
    }
}
