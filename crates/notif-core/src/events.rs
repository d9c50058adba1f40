//! Notification event model.
//!
//! An [`Event`] is either a *job event*, owned by exactly one end-user, or a
//! *client event*, owned by the whole fleet. The same JSON shape is used on
//! the broker queue, on WebSocket frames, and (flattened) in query responses:
//!
//! ```text
//! {"kind":"job","username":"alice","job_id":"J1","job_status":"completed","job_type":"scrape"}
//! {"kind":"client","client_id":"C1","client_name":"Acme","priority":"high"}
//! ```
//!
//! Unknown fields are ignored on decode. The camelCase names emitted by older
//! publishers (`jobId`, `status`, `type`, `clientId`, `clientName`) are
//! accepted as aliases, as is their `notificationType` discriminant. Those
//! publishers also send `null` for every field that does not apply to the
//! event kind; a `null` is treated as an absent field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Discriminant field used by older publishers in place of `kind`.
const LEGACY_KIND_FIELD: &str = "notificationType";

/// A notification payload, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Job progress for a single end-user (unicast).
    Job(JobEvent),
    /// Client-record change relevant to every user (broadcast).
    Client(ClientEvent),
}

/// Job-scoped event fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Owner of the job; the only recipient of the event.
    pub username: String,
    #[serde(alias = "jobId")]
    pub job_id: String,
    #[serde(alias = "status")]
    pub job_status: JobStatus,
    #[serde(alias = "type")]
    pub job_type: JobType,
}

/// Client-scoped event fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEvent {
    #[serde(alias = "clientId")]
    pub client_id: String,
    /// Display name; may be empty, a broadcast is still meaningful.
    #[serde(alias = "clientName", default)]
    pub client_name: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Job,
    Client,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Job => "job",
            EventKind::Client => "client",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "job" => Ok(EventKind::Job),
            "client" => Ok(EventKind::Client),
            other => Err(Error::InvalidInput(format!("unknown event kind: {other}"))),
        }
    }
}

/// Lifecycle state of a scrape/match job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown job status: {other}"))),
        }
    }
}

/// Kind of external workflow a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Scrape,
    Match,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scrape => "scrape",
            JobType::Match => "match",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scrape" => Ok(JobType::Scrape),
            "match" => Ok(JobType::Match),
            other => Err(Error::InvalidInput(format!("unknown job type: {other}"))),
        }
    }
}

/// Client event priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidInput(format!("unknown priority: {other}"))),
        }
    }
}

impl Event {
    /// Decode a broker frame body.
    ///
    /// Fails with [`Error::Serialization`] when the body is not UTF-8 JSON of
    /// the expected shape (including missing required fields).
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
        if let Some(fields) = value.as_object_mut() {
            fields.retain(|_, v| !v.is_null());
            if !fields.contains_key("kind") {
                if let Some(kind) = fields.remove(LEGACY_KIND_FIELD) {
                    fields.insert("kind".to_string(), kind);
                }
            }
        }
        serde_json::from_value(value).map_err(Error::from)
    }

    /// Encode as a WebSocket text frame payload.
    pub fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Job(_) => EventKind::Job,
            Event::Client(_) => EventKind::Client,
        }
    }

    /// The single recipient of a job event; `None` for broadcast events.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Event::Job(job) => Some(job.username.as_str()),
            Event::Client(_) => None,
        }
    }

    /// Check the event model invariants.
    ///
    /// A job event must name a non-empty `username`, otherwise it is
    /// undeliverable. Client events are always well-formed.
    pub fn validate(&self) -> Result<()> {
        match self {
            Event::Job(job) if job.username.trim().is_empty() => Err(Error::InvalidEvent(
                format!("job event {} has no username", job.job_id),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(username: &str) -> Event {
        Event::Job(JobEvent {
            username: username.to_string(),
            job_id: "J1".to_string(),
            job_status: JobStatus::Completed,
            job_type: JobType::Scrape,
        })
    }

    #[test]
    fn test_decode_job_event() {
        let body = br#"{"kind":"job","username":"alice","job_id":"J1","job_status":"completed","job_type":"scrape"}"#;
        let event = Event::from_slice(body).unwrap();
        assert_eq!(event, job("alice"));
        assert_eq!(event.kind(), EventKind::Job);
        assert_eq!(event.recipient(), Some("alice"));
    }

    #[test]
    fn test_decode_client_event() {
        let body = br#"{"kind":"client","client_id":"C1","client_name":"Acme","priority":"high"}"#;
        let event = Event::from_slice(body).unwrap();
        match &event {
            Event::Client(c) => {
                assert_eq!(c.client_id, "C1");
                assert_eq!(c.client_name, "Acme");
                assert_eq!(c.priority, Priority::High);
                assert!(c.title.is_none());
            }
            other => panic!("expected client event, got {other:?}"),
        }
        assert_eq!(event.recipient(), None);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let body = br#"{"kind":"client","client_id":"C1","client_name":"Acme","priority":"low","extra":{"nested":1}}"#;
        assert!(Event::from_slice(body).is_ok());
    }

    #[test]
    fn test_decode_accepts_legacy_field_names() {
        let body = br#"{"kind":"job","username":"bob","jobId":"J9","status":"failed","type":"match"}"#;
        let event = Event::from_slice(body).unwrap();
        match event {
            Event::Job(j) => {
                assert_eq!(j.job_id, "J9");
                assert_eq!(j.job_status, JobStatus::Failed);
                assert_eq!(j.job_type, JobType::Match);
            }
            other => panic!("expected job event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_legacy_publisher_payload() {
        let body = br#"{"notificationType":"client","username":null,"jobId":null,"status":null,"type":null,"clientId":"C1","clientName":"Acme;Acme Corp","priority":"high","title":"Q3 results","source":"reuters"}"#;
        let event = Event::from_slice(body).unwrap();
        match event {
            Event::Client(c) => {
                assert_eq!(c.client_id, "C1");
                assert_eq!(c.client_name, "Acme;Acme Corp");
                assert_eq!(c.title.as_deref(), Some("Q3 results"));
                assert_eq!(c.source.as_deref(), Some("reuters"));
            }
            other => panic!("expected client event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_null_client_name_is_empty() {
        let body = br#"{"notificationType":"client","clientId":"C1","clientName":null,"priority":"low"}"#;
        match Event::from_slice(body).unwrap() {
            Event::Client(c) => assert_eq!(c.client_name, ""),
            other => panic!("expected client event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_null_required_field_fails() {
        let body = br#"{"kind":"job","username":"alice","job_id":null,"job_status":"pending","job_type":"scrape"}"#;
        assert!(Event::from_slice(body).is_err());
    }

    #[test]
    fn test_decode_non_object_fails() {
        assert!(Event::from_slice(br#""job""#).is_err());
        assert!(Event::from_slice(b"[]").is_err());
    }

    #[test]
    fn test_decode_missing_required_field_fails() {
        let body = br#"{"kind":"job","username":"alice","job_status":"completed","job_type":"scrape"}"#;
        let err = Event::from_slice(body).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_enum_value() {
        let body = br#"{"kind":"client","client_id":"C1","client_name":"Acme","priority":"urgent"}"#;
        assert!(Event::from_slice(body).is_err());
    }

    #[test]
    fn test_decode_malformed_json_fails() {
        assert!(Event::from_slice(b"{ not json").is_err());
    }

    #[test]
    fn test_client_name_may_be_absent() {
        let body = br#"{"kind":"client","client_id":"C1","priority":"medium"}"#;
        let event = Event::from_slice(body).unwrap();
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_username() {
        let err = job("").validate().unwrap_err();
        assert!(err.is_invalid());
        assert!(job("   ").validate().is_err());
        assert!(job("alice").validate().is_ok());
    }

    #[test]
    fn test_frame_is_tagged_json() {
        let frame = job("alice").to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["kind"], "job");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["job_status"], "completed");
        assert_eq!(value["job_type"], "scrape");
    }

    #[test]
    fn test_client_frame_omits_absent_extras() {
        let event = Event::Client(ClientEvent {
            client_id: "C1".to_string(),
            client_name: "Acme".to_string(),
            priority: Priority::High,
            title: None,
            source: Some("bloomberg".to_string()),
        });
        let frame = event.to_frame().unwrap();
        assert!(!frame.contains("title"));
        assert!(frame.contains(r#""source":"bloomberg""#));
    }

    #[test]
    fn test_enum_string_forms_match_wire() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status)
            );
        }
        assert_eq!("match".parse::<JobType>().unwrap(), JobType::Match);
        assert_eq!("medium".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("HIGH".parse::<Priority>().is_err());
        assert_eq!("client".parse::<EventKind>().unwrap(), EventKind::Client);
    }
}
