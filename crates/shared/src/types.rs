use serde::{Deserialize, Serialize};

// ============================================================================
// Request lifecycle
// ============================================================================

/// Lifecycle state of a meet-up request.
///
/// A request is created as `Pending` and moves at most once, to `Accepted`
/// or `Rejected`. There is no path back out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown request status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// One meet-up request as it appears on the API surface.
///
/// `from_name`/`from_email` and `to_name`/`to_email` are snapshots taken at
/// send time; they are never re-derived from the sender's profile later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetRequest {
    pub id: String,
    pub from_user_id: String,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub to_name: Option<String>,
    pub to_email: String,
    pub date: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub place: String,
    pub note: Option<String>,
    pub status: RequestStatus,
    pub created_at: Option<String>,
}

/// Body accepted by the two notification endpoints.
///
/// Every field is optional on the wire; `to_email` is the only one the
/// handlers insist on, and they check it themselves so that its absence maps
/// to a 400 rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyPayload {
    pub to_email: Option<String>,
    pub to_name: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<u32>,
    pub place: Option<String>,
    pub note: Option<String>,
    /// Overrides the configured site base URL when building callback links.
    pub site_url: Option<String>,
}

/// `/notify-reply` body: the common payload plus the decided status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyNotifyPayload {
    #[serde(flatten)]
    pub request: NotifyPayload,
    pub status: Option<RequestStatus>,
}

// ============================================================================
// Identity
// ============================================================================

/// The signed-in identity as the rest of the app sees it.
///
/// `email` is nullable on purpose: "no session" and "session without an
/// email" are distinct states and views treat them differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
        ] {
            assert_eq!(s.as_str().parse::<RequestStatus>().unwrap(), s);
        }
        assert!("cancelled".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn notify_payload_tolerates_missing_fields() {
        let p: NotifyPayload = serde_json::from_str(r#"{"toEmail":"a@x.com"}"#).unwrap();
        assert_eq!(p.to_email.as_deref(), Some("a@x.com"));
        assert!(p.note.is_none());

        let r: ReplyNotifyPayload =
            serde_json::from_str(r#"{"toEmail":"a@x.com","status":"accepted"}"#).unwrap();
        assert_eq!(r.status, Some(RequestStatus::Accepted));
        assert_eq!(r.request.to_email.as_deref(), Some("a@x.com"));
    }
}
