//! Peer health reports.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of one health probe. Never an error: failures are `Unhealthy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub peer: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthReport {
    pub fn healthy(peer: impl Into<String>, response_time_ms: u64, http_status: u16) -> Self {
        Self {
            peer: peer.into(),
            status: HealthStatus::Healthy,
            response_time_ms,
            http_status: Some(http_status),
            reason: None,
        }
    }

    pub fn unhealthy(
        peer: impl Into<String>,
        response_time_ms: u64,
        http_status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            peer: peer.into(),
            status: HealthStatus::Unhealthy,
            response_time_ms,
            http_status,
            reason: Some(reason.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_empty_fields() {
        let report = HealthReport::healthy("delivery", 12, 200);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["http_status"], 200);
        assert!(json.get("reason").is_none());
    }
}
