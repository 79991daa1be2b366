use std::sync::Arc;

use chrono::Utc;
use shared::domain::{owner_matches, Event, EventId, UserId};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    error::{Notice, NoticeContext},
    forms::{EditEventForm, FormError, ImageUpload, NewEventForm},
    session::SessionHub,
    EventMutations, ImageStore,
};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("sign in to manage events")]
    Unauthenticated,
    #[error("event {0} belongs to another user")]
    NotOwner(EventId),
    #[error(transparent)]
    Validation(#[from] FormError),
    #[error("{0}")]
    Backend(Notice),
}

/// Create, edit and delete events for the signed-in user.
///
/// Nothing is cached here; callers refresh the affected collection after a
/// successful call.
pub struct EventEditor {
    mutations: Arc<dyn EventMutations>,
    images: Arc<dyn ImageStore>,
    hub: Arc<SessionHub>,
}

impl EventEditor {
    pub fn new(
        mutations: Arc<dyn EventMutations>,
        images: Arc<dyn ImageStore>,
        hub: Arc<SessionHub>,
    ) -> Self {
        Self {
            mutations,
            images,
            hub,
        }
    }

    pub fn can_modify(&self, event: &Event) -> bool {
        owner_matches(self.hub.current(), event.user_id)
    }

    pub async fn create(
        &self,
        form: &NewEventForm,
        image: Option<&ImageUpload>,
    ) -> Result<Event, EditorError> {
        let owner = self.hub.current().ok_or(EditorError::Unauthenticated)?;
        let image = image.ok_or(FormError::MissingImage)?;
        let mut draft = form.validate()?;
        draft.image_url = self.upload(image).await?;

        let created = self
            .mutations
            .create_event(owner, draft)
            .await
            .map_err(|err| {
                warn!(user_id = %owner, error = %err, "editor: create failed");
                EditorError::Backend(Notice::from_error(NoticeContext::CreateEvent, &err))
            })?;
        info!(event_id = %created.id, user_id = %owner, "editor: event created");
        Ok(created)
    }

    /// Without a new image the stored image URL is kept.
    pub async fn update(
        &self,
        event: &Event,
        form: &EditEventForm,
        image: Option<&ImageUpload>,
    ) -> Result<Event, EditorError> {
        let viewer = self.ensure_owner(event)?;
        let mut draft = form.to_draft(&event.image_url)?;
        if let Some(image) = image {
            draft.image_url = self.upload(image).await?;
        }

        let updated = self
            .mutations
            .update_event(event.id, draft)
            .await
            .map_err(|err| {
                warn!(event_id = %event.id, error = %err, "editor: update failed");
                EditorError::Backend(Notice::from_error(NoticeContext::UpdateEvent, &err))
            })?;
        info!(event_id = %event.id, user_id = %viewer, "editor: event updated");
        Ok(updated)
    }

    pub async fn delete(&self, event: &Event) -> Result<(), EditorError> {
        let viewer = self.ensure_owner(event)?;
        self.mutations.delete_event(event.id).await.map_err(|err| {
            warn!(event_id = %event.id, error = %err, "editor: delete failed");
            EditorError::Backend(Notice::from_error(NoticeContext::DeleteEvent, &err))
        })?;
        info!(event_id = %event.id, user_id = %viewer, "editor: event deleted");
        Ok(())
    }

    fn ensure_owner(&self, event: &Event) -> Result<UserId, EditorError> {
        let viewer = self.hub.current().ok_or(EditorError::Unauthenticated)?;
        if !owner_matches(Some(viewer), event.user_id) {
            return Err(EditorError::NotOwner(event.id));
        }
        Ok(viewer)
    }

    async fn upload(&self, image: &ImageUpload) -> Result<String, EditorError> {
        let path = image.storage_path(Utc::now().timestamp_millis());
        self.images
            .upload_image(&path, image.bytes.clone(), &image.mime_type())
            .await
            .map_err(|err| {
                warn!(path = %path, error = %err, "editor: image upload failed");
                EditorError::Backend(Notice::from_error(NoticeContext::UploadImage, &err))
            })
    }
}
