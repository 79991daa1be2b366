//! Row and request shapes exchanged with the hosted backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AttendanceId, Event, EventDraft, EventId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEventRow {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub location: String,
    pub venue: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub category: String,
    pub user_id: UserId,
}

impl NewEventRow {
    pub fn new(owner: UserId, draft: EventDraft) -> Self {
        Self {
            name: draft.name,
            description: draft.description,
            image_url: draft.image_url,
            location: draft.location,
            venue: draft.venue,
            event_date: draft.event_date,
            event_time: draft.event_time,
            category: draft.category,
            user_id: owner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPatchRow {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub location: String,
    pub venue: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub category: String,
    pub updated_at: DateTime<Utc>,
}

impl EventPatchRow {
    pub fn new(draft: EventDraft, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: draft.name,
            description: draft.description,
            image_url: draft.image_url,
            location: draft.location,
            venue: draft.venue,
            event_date: draft.event_date,
            event_time: draft.event_time,
            category: draft.category,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AttendanceId>,
    pub event_id: EventId,
    pub user_id: UserId,
}

/// Attendance row joined with its event, as returned by
/// `select=event_id,events(*)`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendingEventRow {
    pub event_id: EventId,
    #[serde(default)]
    pub events: Option<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub data: SignUpMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordGrantRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSessionResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    pub user: AuthUser,
}

/// Backend error body; either `message` or `msg` depending on the service.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl BackendErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.msg).or(self.error_description)
    }
}
