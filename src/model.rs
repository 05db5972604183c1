//! Data models for DogSquad.
//!
//! # Lifecycle Guarantees
//!
//! The types here encode the report lifecycle as closed enums rather than
//! free strings, so an illegal status can never be constructed in memory:
//!
//! - `IssueType` is fixed at creation and never changes afterwards.
//! - `ReportStatus` only moves along the transitions listed on
//!   [`ReportStatus::can_transition_to`].
//! - `AlertStatus` only moves forward from `Sent` to a terminal outcome.
//!
//! Timestamps are always server-assigned (UTC), never taken from clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of welfare issue being reported.
///
/// This is a closed set. It is chosen by the reporter at submission time and
/// is immutable for the lifetime of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Dog with a visible injury needing medical attention.
    Injured,
    /// Lost pet sighting.
    Lost,
    /// Dogs needing a feeding volunteer.
    Feeding,
    /// Aggressive dog posing a risk to people nearby.
    Aggressive,
    /// Litter of puppies found.
    Puppies,
    /// Suspected abuse or cruelty.
    Abuse,
    /// Dog suitable for adoption.
    Adoption,
    /// Anything else.
    Other,
}

impl IssueType {
    /// Storage form of the issue type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Injured => "injured",
            IssueType::Lost => "lost",
            IssueType::Feeding => "feeding",
            IssueType::Aggressive => "aggressive",
            IssueType::Puppies => "puppies",
            IssueType::Abuse => "abuse",
            IssueType::Adoption => "adoption",
            IssueType::Other => "other",
        }
    }

    /// Parse the storage form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "injured" => Some(IssueType::Injured),
            "lost" => Some(IssueType::Lost),
            "feeding" => Some(IssueType::Feeding),
            "aggressive" => Some(IssueType::Aggressive),
            "puppies" => Some(IssueType::Puppies),
            "abuse" => Some(IssueType::Abuse),
            "adoption" => Some(IssueType::Adoption),
            "other" => Some(IssueType::Other),
            _ => None,
        }
    }
}

/// Where a report sits in its lifecycle.
///
/// Reports are never deleted; `Closed` is the terminal soft-delete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Freshly submitted, no volunteer working on it yet.
    Pending,
    /// A volunteer has picked the report up.
    InProgress,
    /// The issue was handled; resolution fields are populated.
    Resolved,
    /// Terminal state. Reachable from any state as an administrative override.
    Closed,
}

impl ReportStatus {
    /// Storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Closed => "closed",
        }
    }

    /// Parse the storage form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReportStatus::Pending),
            "in_progress" => Some(ReportStatus::InProgress),
            "resolved" => Some(ReportStatus::Resolved),
            "closed" => Some(ReportStatus::Closed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// Legal moves:
    /// - `pending` → `in_progress`
    /// - `in_progress` → `resolved`
    /// - `resolved` → `closed`
    /// - any non-closed state → `closed` (administrative override)
    ///
    /// Everything else, including any move out of `closed`, is rejected.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::InProgress)
                | (ReportStatus::InProgress, ReportStatus::Resolved)
                | (ReportStatus::Pending, ReportStatus::Closed)
                | (ReportStatus::InProgress, ReportStatus::Closed)
                | (ReportStatus::Resolved, ReportStatus::Closed)
        )
    }
}

/// Outcome state of a volunteer alert.
///
/// Transitions only move forward: `Sent` → one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Dispatched to the volunteer, awaiting a response.
    Sent,
    /// Volunteer accepted the callout.
    Accepted,
    /// Volunteer declined.
    Declined,
    /// No response before the dispatch window elapsed.
    Expired,
}

impl AlertStatus {
    /// Storage form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Sent => "sent",
            AlertStatus::Accepted => "accepted",
            AlertStatus::Declined => "declined",
            AlertStatus::Expired => "expired",
        }
    }

    /// Parse the storage form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(AlertStatus::Sent),
            "accepted" => Some(AlertStatus::Accepted),
            "declined" => Some(AlertStatus::Declined),
            "expired" => Some(AlertStatus::Expired),
            _ => None,
        }
    }

    /// Whether this status is a valid outcome for a `Sent` alert.
    pub fn is_outcome(&self) -> bool {
        !matches!(self, AlertStatus::Sent)
    }
}

/// A user-submitted record of a stray-dog welfare issue.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Opaque unique identifier, assigned by the store.
    pub id: i64,

    /// Identifier of the reporting user.
    pub user_id: String,

    /// Kind of issue. Immutable after creation.
    pub issue_type: IssueType,

    /// Short headline, always non-empty.
    pub title: String,

    /// Free-text description of what was observed.
    pub description: Option<String>,

    /// Latitude in decimal degrees. Required; a report cannot exist without it.
    pub latitude: f64,

    /// Longitude in decimal degrees. Required; a report cannot exist without it.
    pub longitude: f64,

    /// Human-readable address, if the reporter supplied one.
    pub location_address: Option<String>,

    /// Public URL of the uploaded photo, if the upload succeeded.
    pub image_url: Option<String>,

    /// Lifecycle status. Always `pending` on a fresh row.
    pub status: ReportStatus,

    /// Volunteer currently assigned, if any. Weak reference by identifier.
    pub assigned_volunteer_id: Option<String>,

    /// When the reporter observed the issue. Defaults to submission time.
    pub observed_at: DateTime<Utc>,

    /// Notes recorded at resolution time.
    pub resolution_notes: Option<String>,

    /// Photo recorded at resolution time.
    pub resolution_image_url: Option<String>,

    /// When the report was resolved. Set together with the notes above.
    pub resolved_at: Option<DateTime<Utc>>,

    /// Server-assigned creation time (UTC).
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}

/// One immutable audit-log line attached to a report.
///
/// Entries are append-only: once written they are never mutated or deleted,
/// and no such operation exists anywhere in the crate.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    /// Opaque unique identifier.
    pub id: i64,

    /// The owning report.
    pub report_id: i64,

    /// Who performed the action.
    pub user_id: String,

    /// What happened, e.g. "Report submitted".
    pub action: String,

    /// Optional free-text detail.
    pub notes: Option<String>,

    /// Optional photo attached to this entry.
    pub image_url: Option<String>,

    /// Server-assigned creation time (UTC).
    pub created_at: DateTime<Utc>,
}

/// A notification-and-response record linking a report to a candidate
/// volunteer. At most one alert exists per (report, volunteer) pair.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Opaque unique identifier.
    pub id: i64,

    /// The report the volunteer was alerted about.
    pub report_id: i64,

    /// The volunteer who was alerted.
    pub volunteer_id: String,

    /// Outcome state. Starts at `sent`.
    pub status: AlertStatus,

    /// When the alert was dispatched.
    pub sent_at: DateTime<Utc>,

    /// When the volunteer responded (or the alert expired), if it has.
    pub responded_at: Option<DateTime<Utc>>,

    /// Free-text note recorded with the response.
    pub response_notes: Option<String>,
}

/// Validated input for creating a report row.
///
/// Built by the submission flow after validation; by the time one of these
/// exists, coordinates and title are known to be present.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: String,
    pub issue_type: IssueType,
    pub title: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub location_address: Option<String>,
    pub image_url: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Resolution details recorded when a report transitions to `resolved`.
///
/// The store writes these together with `resolved_at` in a single update, so
/// a report never ends up with a resolution timestamp but no notes.
#[derive(Debug, Clone, Default)]
pub struct ResolutionInput {
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

/// An image attached to a report submission, carried as raw bytes.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// Original filename, used to derive the object key.
    pub filename: String,

    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

/// Request body for `POST /reports`.
///
/// Latitude and longitude are optional here only so that their absence can be
/// rejected with a proper [`LocationRequired`](crate::error::StoreError)
/// instead of a generic deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    /// Identifier of the signed-in reporter. Must be non-empty.
    pub user_id: String,

    /// Kind of issue. Carried as the raw string and parsed by the handler
    /// with [`IssueType::parse`], so a value outside the closed set is
    /// rejected with this field named rather than as an opaque body error.
    pub issue_type: String,

    /// Short headline. Must be non-empty.
    pub title: String,

    /// Free-text description of what was observed.
    #[serde(default)]
    pub description: Option<String>,

    /// Latitude in decimal degrees, from the device's location capture.
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees, from the device's location capture.
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Free-text address, manual entry fallback.
    #[serde(default)]
    pub location_address: Option<String>,

    /// When the issue was observed. Defaults to submission time.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,

    /// Base64-encoded photo bytes, if the reporter attached one.
    #[serde(default)]
    pub image_base64: Option<String>,

    /// Filename for the attached photo.
    #[serde(default)]
    pub image_filename: Option<String>,
}

/// Response body for a successful `POST /reports`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReportResponse {
    /// Identifier of the newly created report.
    pub report_id: i64,

    /// Always `pending` for a fresh report.
    pub status: ReportStatus,

    /// Public URL of the uploaded photo. Null when no image was attached or
    /// the upload failed (upload failure does not block report creation).
    pub image_url: Option<String>,
}

/// Request body for `PATCH /reports/:id/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    /// Who is making the change.
    pub actor_id: String,

    /// Target status.
    pub status: ReportStatus,

    /// Resolution notes; only meaningful when `status` is `resolved`.
    #[serde(default)]
    pub resolution_notes: Option<String>,

    /// Resolution photo; only meaningful when `status` is `resolved`.
    #[serde(default)]
    pub resolution_image_url: Option<String>,
}

/// Request body for `POST /reports/:id/alerts`.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchAlertsRequest {
    /// Candidate volunteers chosen by the (external) dispatcher.
    pub volunteer_ids: Vec<String>,
}

/// Request body for `POST /alerts/:id/response`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertResponseRequest {
    /// The outcome: `accepted`, `declined`, or `expired`.
    pub status: AlertStatus,

    /// Optional note from the volunteer.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response body for `GET /reports/:id/timeline`.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    pub report_id: i64,
    /// Entries ordered oldest first.
    pub entries: Vec<TimelineEntry>,
}

/// Response body for `GET /reports/:id/alerts`.
#[derive(Debug, Clone, Serialize)]
pub struct AlertsResponse {
    pub report_id: i64,
    pub alerts: Vec<Alert>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_transitions() {
        assert!(ReportStatus::Pending.can_transition_to(ReportStatus::InProgress));
        assert!(ReportStatus::InProgress.can_transition_to(ReportStatus::Resolved));
        assert!(ReportStatus::Resolved.can_transition_to(ReportStatus::Closed));
    }

    #[test]
    fn test_status_close_from_anywhere() {
        assert!(ReportStatus::Pending.can_transition_to(ReportStatus::Closed));
        assert!(ReportStatus::InProgress.can_transition_to(ReportStatus::Closed));
        assert!(ReportStatus::Resolved.can_transition_to(ReportStatus::Closed));
    }

    #[test]
    fn test_status_backward_transitions_rejected() {
        assert!(!ReportStatus::Resolved.can_transition_to(ReportStatus::Pending));
        assert!(!ReportStatus::Resolved.can_transition_to(ReportStatus::InProgress));
        assert!(!ReportStatus::InProgress.can_transition_to(ReportStatus::Pending));
    }

    #[test]
    fn test_status_skipping_rejected() {
        assert!(!ReportStatus::Pending.can_transition_to(ReportStatus::Resolved));
    }

    #[test]
    fn test_closed_is_terminal() {
        assert!(!ReportStatus::Closed.can_transition_to(ReportStatus::Pending));
        assert!(!ReportStatus::Closed.can_transition_to(ReportStatus::InProgress));
        assert!(!ReportStatus::Closed.can_transition_to(ReportStatus::Resolved));
        assert!(!ReportStatus::Closed.can_transition_to(ReportStatus::Closed));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::InProgress,
            ReportStatus::Resolved,
        ] {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_issue_type_round_trip() {
        for issue in [
            IssueType::Injured,
            IssueType::Lost,
            IssueType::Feeding,
            IssueType::Aggressive,
            IssueType::Puppies,
            IssueType::Abuse,
            IssueType::Adoption,
            IssueType::Other,
        ] {
            assert_eq!(IssueType::parse(issue.as_str()), Some(issue));
        }
        assert_eq!(IssueType::parse("hungry"), None);
    }

    #[test]
    fn test_alert_outcomes() {
        assert!(!AlertStatus::Sent.is_outcome());
        assert!(AlertStatus::Accepted.is_outcome());
        assert!(AlertStatus::Declined.is_outcome());
        assert!(AlertStatus::Expired.is_outcome());
    }

    #[test]
    fn test_wire_forms_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&IssueType::Puppies).unwrap(),
            "\"puppies\""
        );
        assert_eq!(
            serde_json::to_string(&AlertStatus::Declined).unwrap(),
            "\"declined\""
        );
    }
}
