//! Release health session types.

use std::fmt;
use std::str;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::{opt_ts_seconds_float, ts_seconds_float};

/// The status of a release health session.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session is healthy.
    ///
    /// This does not necessarily indicate that the session is still active.
    Ok,
    /// The session terminated normally.
    Exited,
    /// The session resulted in an application crash.
    Crashed,
    /// The session had an unexpected abrupt termination (not crashing).
    Abnormal,
}

impl SessionStatus {
    /// Whether the session can no longer transition to another status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Crashed | SessionStatus::Abnormal)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Ok
    }
}

/// An error used when parsing `SessionStatus`.
#[derive(Debug, Error)]
#[error("invalid session status")]
pub struct ParseSessionStatusError;

impl str::FromStr for SessionStatus {
    type Err = ParseSessionStatusError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(match string {
            "ok" => SessionStatus::Ok,
            "crashed" => SessionStatus::Crashed,
            "abnormal" => SessionStatus::Abnormal,
            "exited" => SessionStatus::Exited,
            _ => return Err(ParseSessionStatusError),
        })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SessionStatus::Ok => write!(f, "ok"),
            SessionStatus::Crashed => write!(f, "crashed"),
            SessionStatus::Abnormal => write!(f, "abnormal"),
            SessionStatus::Exited => write!(f, "exited"),
        }
    }
}

/// Additional attributes for sessions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionAttributes {
    /// The release version string.
    pub release: String,
    /// The environment identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// The ip address of the user. This data is not persisted but used for filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// The user agent of the user. This data is not persisted but used for filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn is_false(val: &bool) -> bool {
    !val
}

/// A release health session.
///
/// The record is serialized as a session update; the `init` flag marks the
/// initial transmission of the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The session identifier.
    #[serde(rename = "sid", default = "Uuid::new_v4")]
    pub session_id: Uuid,
    /// The distinct identifier. Should be device or user ID.
    #[serde(rename = "did", default, skip_serializing_if = "Option::is_none")]
    pub distinct_id: Option<String>,
    /// A logical clock, derived from the update timestamp in milliseconds.
    #[serde(rename = "seq", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// The timestamp of when the session change was created.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_ts_seconds_float"
    )]
    pub timestamp: Option<SystemTime>,
    /// The timestamp of when the session itself started.
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub started: SystemTime,
    /// A flag that indicates that this is the initial transmission of the session.
    #[serde(default, skip_serializing_if = "is_false")]
    pub init: bool,
    /// An optional duration of the session so far, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// The status of the session.
    #[serde(default)]
    pub status: SessionStatus,
    /// The number of errors that occurred.
    #[serde(default)]
    pub errors: u64,
    /// The mechanism that moved the session into the `Abnormal` status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abnormal_mechanism: Option<String>,
    /// The session attributes.
    #[serde(rename = "attrs")]
    pub attributes: SessionAttributes,
}

impl Session {
    /// Whether the session can no longer transition to another status.
    pub fn is_terminated(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in ["ok", "exited", "crashed", "abnormal"] {
            let parsed: SessionStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
        assert!("dead".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SessionStatus::Ok.is_terminal());
        assert!(!SessionStatus::Exited.is_terminal());
        assert!(SessionStatus::Crashed.is_terminal());
        assert!(SessionStatus::Abnormal.is_terminal());
    }

    #[test]
    fn test_session_terminated_follows_status() {
        let mut session = session_fixture();
        assert!(!session.is_terminated());
        session.status = SessionStatus::Exited;
        assert!(!session.is_terminated());
        session.status = SessionStatus::Crashed;
        assert!(session.is_terminated());
    }

    #[test]
    fn test_session_serialization_uses_short_names() {
        let session = session_fixture();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["did"], "user-1");
        assert_eq!(json["seq"], 42);
        assert_eq!(json["attrs"]["release"], "app@1.0.0");
        assert_eq!(json["init"], true);
    }

    fn session_fixture() -> Session {
        Session {
            session_id: Uuid::nil(),
            distinct_id: Some("user-1".into()),
            sequence: Some(42),
            timestamp: None,
            started: SystemTime::UNIX_EPOCH,
            init: true,
            duration: None,
            status: SessionStatus::Ok,
            errors: 0,
            abnormal_mechanism: None,
            attributes: SessionAttributes {
                release: "app@1.0.0".into(),
                ..Default::default()
            },
        }
    }
}
