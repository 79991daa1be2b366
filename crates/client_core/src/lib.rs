use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Event, EventDraft, EventId, Profile, UserId};

pub mod attendance;
pub mod config;
pub mod editor;
pub mod error;
pub mod event_list;
pub mod feed;
pub mod forms;
pub mod local;
pub mod profile;
pub mod rest;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use attendance::{AttendanceError, AttendanceGuard, AttendanceSnapshot, MountedGuard, SessionWatch};
pub use config::{load_settings, ClientSettings, SettingsError};
pub use editor::{EditorError, EventEditor};
pub use error::{Notice, NoticeCategory, NoticeContext};
pub use event_list::{EventListController, FilterState, PAGE_SIZE};
pub use feed::{EventFeed, FeedStatus};
pub use local::LocalBackend;
pub use profile::{ProfileError, ProfileTab, ProfileView};
pub use rest::RestBackend;
pub use session::{AuthError, Authenticator, SessionEvent, SessionHub};

/// Read side of the event catalogue.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Every event, ascending by date. All-or-nothing.
    async fn fetch_all_events(&self) -> Result<Vec<Event>>;
    async fn fetch_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>>;
    async fn fetch_attending_events(&self, user_id: UserId) -> Result<Vec<Event>>;
}

/// The (event, user) attendance relation held by the backend.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn fetch_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<bool>;
    async fn fetch_attendee_count(&self, event_id: EventId) -> Result<u64>;
    /// Safe to retry; a duplicate insert is resolved by the backend.
    async fn insert_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()>;
    async fn delete_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()>;
}

/// Event writes. The backend is the authority on ownership and must reject
/// writes from anyone but the owner.
#[async_trait]
pub trait EventMutations: Send + Sync {
    async fn create_event(&self, owner: UserId, draft: EventDraft) -> Result<Event>;
    async fn update_event(&self, event_id: EventId, draft: EventDraft) -> Result<Event>;
    async fn delete_event(&self, event_id: EventId) -> Result<()>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL.
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, mime_type: &str) -> Result<String>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserId>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId>;
    async fn sign_out(&self) -> Result<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>>;
    async fn insert_profile(&self, profile: &Profile) -> Result<()>;
}
