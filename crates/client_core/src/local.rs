//! Backend traits over a local SQLite store, acting as one user at a time.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{Event, EventDraft, EventId, Profile, UserId},
    error::ApiException,
};
use storage::Storage;
use tokio::sync::RwLock;

use crate::{AttendanceStore, EventMutations, EventSource, ProfileStore};

pub struct LocalBackend {
    storage: Arc<Storage>,
    actor: RwLock<Option<UserId>>,
}

impl LocalBackend {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            actor: RwLock::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub async fn set_actor(&self, actor: Option<UserId>) {
        *self.actor.write().await = actor;
    }

    async fn require_actor(&self, user_id: UserId) -> Result<()> {
        if *self.actor.read().await != Some(user_id) {
            return Err(ApiException::forbidden(format!("cannot act on behalf of user {user_id}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for LocalBackend {
    async fn fetch_all_events(&self) -> Result<Vec<Event>> {
        self.storage.list_events().await
    }

    async fn fetch_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>> {
        self.storage.list_events_by_owner(owner).await
    }

    async fn fetch_attending_events(&self, user_id: UserId) -> Result<Vec<Event>> {
        self.storage.list_attending_events(user_id).await
    }
}

#[async_trait]
impl AttendanceStore for LocalBackend {
    async fn fetch_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        self.storage.attendance_exists(event_id, user_id).await
    }

    async fn fetch_attendee_count(&self, event_id: EventId) -> Result<u64> {
        self.storage.attendee_count(event_id).await
    }

    async fn insert_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        self.require_actor(user_id).await?;
        self.storage.insert_attendance(event_id, user_id).await
    }

    async fn delete_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        self.require_actor(user_id).await?;
        self.storage.delete_attendance(event_id, user_id).await?;
        Ok(())
    }
}

#[async_trait]
impl EventMutations for LocalBackend {
    async fn create_event(&self, owner: UserId, draft: EventDraft) -> Result<Event> {
        self.require_actor(owner).await?;
        self.storage.insert_event(Some(owner), &draft).await
    }

    async fn update_event(&self, event_id: EventId, draft: EventDraft) -> Result<Event> {
        let actor = *self.actor.read().await;
        self.storage.update_event(actor, event_id, &draft).await
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let actor = *self.actor.read().await;
        self.storage.delete_event(actor, event_id).await
    }
}

#[async_trait]
impl ProfileStore for LocalBackend {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>> {
        self.storage.profile(user_id).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.storage.insert_profile(profile).await
    }
}
