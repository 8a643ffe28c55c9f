//! Metric records and request payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::{ValidationError, required_field};

/// Store-generated record identifier
///
/// Rendered on the wire as a hyphenated lowercase UUID. Parsing rejects
/// anything else, so a malformed id never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(Uuid);

impl MetricId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MetricId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MetricId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for MetricId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| ValidationError::InvalidId(s.to_string()))
    }
}

/// A stored team-member record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub name: String,
    pub team: String,
    pub role: String,
    /// Server time of the write that produced this state
    pub timestamp: DateTime<Utc>,
}

/// Body of a create or update request
///
/// Every field is optional at the serde level so that a missing field is
/// reported as a validation error naming it, instead of a generic decode
/// failure. Unknown fields (including `id` and `timestamp`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl MetricPayload {
    pub fn new(name: impl Into<String>, team: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            team: Some(team.into()),
            role: Some(role.into()),
        }
    }

    /// Check required fields and produce the mutable part of a record
    pub fn validate(&self) -> Result<MetricFields, ValidationError> {
        Ok(MetricFields {
            name: required_field("name", self.name.as_deref())?,
            team: required_field("team", self.team.as_deref())?,
            role: required_field("role", self.role.as_deref())?,
        })
    }
}

/// The client-settable fields of a record, already validated and trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricFields {
    pub name: String,
    pub team: String,
    pub role: String,
}

impl MetricFields {
    /// Attach store-assigned identity and time
    pub fn into_metric(self, id: MetricId, timestamp: DateTime<Utc>) -> Metric {
        Metric {
            id,
            name: self.name,
            team: self.team,
            role: self.role,
            timestamp,
        }
    }
}

impl From<&Metric> for MetricPayload {
    fn from(metric: &Metric) -> Self {
        Self::new(&metric.name, &metric.team, &metric.role)
    }
}

/// Acknowledgment returned by a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub message: String,
    pub id: MetricId,
}

impl DeleteAck {
    pub fn new(id: MetricId) -> Self {
        Self {
            message: "Metric deleted successfully".to_string(),
            id,
        }
    }
}

/// Generic metric shape from earlier revisions of the API
///
/// Kept for reference only. No endpoint accepts or returns it, and it is
/// never converted into a [`Metric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetric {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_display() {
        let id = MetricId::new();
        let parsed: MetricId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_invalid_id_rejected() {
        for bad in ["", "42", "not-a-uuid", "65a1b2c3d4e5f60718293a4b"] {
            let result = bad.parse::<MetricId>();
            assert!(matches!(result, Err(ValidationError::InvalidId(_))), "{bad}");
        }
    }

    #[test]
    fn test_payload_ignores_client_identity() {
        let payload: MetricPayload = serde_json::from_str(
            r#"{"id":"x","timestamp":"2020-01-01T00:00:00Z","name":"Ada","team":"Eng","role":"SWE"}"#,
        )
        .unwrap();
        assert_eq!(payload, MetricPayload::new("Ada", "Eng", "SWE"));
    }

    #[test]
    fn test_payload_missing_field() {
        let payload = MetricPayload {
            name: Some("Ada".into()),
            team: None,
            role: Some("SWE".into()),
        };
        let err = payload.validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("team")));
    }

    #[test]
    fn test_payload_blank_field_is_missing() {
        let payload = MetricPayload::new("Ada", "Eng", "   ");
        let err = payload.validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("role")));
    }

    #[test]
    fn test_payload_fields_trimmed() {
        let fields = MetricPayload::new(" Ada ", "Eng\n", "SWE").validate().unwrap();
        assert_eq!(fields.name, "Ada");
        assert_eq!(fields.team, "Eng");
    }

    #[test]
    fn test_metric_wire_shape() {
        let metric = MetricPayload::new("Ada", "Eng", "SWE")
            .validate()
            .unwrap()
            .into_metric(MetricId::new(), Utc::now());
        let value = serde_json::to_value(&metric).unwrap();
        assert!(value["id"].is_string());
        assert!(value["timestamp"].is_string());
        assert_eq!(value["team"], "Eng");
    }
}
