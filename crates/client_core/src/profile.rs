use std::{fmt, str::FromStr, sync::Arc};

use shared::domain::{Event, Profile, UserId};
use thiserror::Error;
use tracing::warn;

use crate::{
    error::{Notice, NoticeContext},
    session::SessionHub,
    EventSource, ProfileStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileTab {
    #[default]
    Attending,
    Created,
}

impl fmt::Display for ProfileTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attending => "attending",
            Self::Created => "created",
        })
    }
}

impl FromStr for ProfileTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attending" => Ok(Self::Attending),
            "created" => Ok(Self::Created),
            other => Err(format!("unknown profile tab '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("sign in to view your profile")]
    SignedOut,
    #[error("{0}")]
    Backend(Notice),
}

/// The signed-in user's profile page.
pub struct ProfileView {
    source: Arc<dyn EventSource>,
    profiles: Arc<dyn ProfileStore>,
    hub: Arc<SessionHub>,
    tab: ProfileTab,
    profile: Option<Profile>,
    events: Vec<Event>,
}

impl ProfileView {
    pub fn new(
        source: Arc<dyn EventSource>,
        profiles: Arc<dyn ProfileStore>,
        hub: Arc<SessionHub>,
    ) -> Self {
        Self {
            source,
            profiles,
            hub,
            tab: ProfileTab::default(),
            profile: None,
            events: Vec::new(),
        }
    }

    /// Loads the profile row and the default tab.
    pub async fn open(&mut self) -> Result<(), ProfileError> {
        let user_id = self.viewer()?;
        self.profile = self
            .profiles
            .fetch_profile(user_id)
            .await
            .map_err(|err| self.backend_error(user_id, err))?;
        self.tab = ProfileTab::default();
        self.refresh().await
    }

    pub async fn select_tab(&mut self, tab: ProfileTab) -> Result<(), ProfileError> {
        self.tab = tab;
        self.refresh().await
    }

    /// Reloads the events of the current tab.
    pub async fn refresh(&mut self) -> Result<(), ProfileError> {
        let user_id = self.viewer()?;
        let fetched = match self.tab {
            ProfileTab::Attending => self.source.fetch_attending_events(user_id).await,
            ProfileTab::Created => self.source.fetch_events_by_owner(user_id).await,
        };
        self.events = fetched.map_err(|err| self.backend_error(user_id, err))?;
        Ok(())
    }

    pub fn tab(&self) -> ProfileTab {
        self.tab
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.profile.as_ref().map(Profile::display_name)
    }

    fn viewer(&self) -> Result<UserId, ProfileError> {
        self.hub.current().ok_or(ProfileError::SignedOut)
    }

    fn backend_error(&self, user_id: UserId, err: anyhow::Error) -> ProfileError {
        warn!(user_id = %user_id, tab = %self.tab, error = %err, "profile: load failed");
        ProfileError::Backend(Notice::from_error(NoticeContext::Profile, &err))
    }
}
