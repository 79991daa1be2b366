//! Fetch state around the home-page event list.

use std::sync::Arc;

use shared::domain::Event;
use tracing::{info, warn};

use crate::{
    error::{Notice, NoticeContext},
    event_list::EventListController,
    EventSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Loading,
    Ready,
    Failed(Notice),
}

pub struct EventFeed {
    source: Arc<dyn EventSource>,
    list: EventListController,
    status: FeedStatus,
}

impl EventFeed {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            list: EventListController::new(),
            status: FeedStatus::Loading,
        }
    }

    /// Loads every event. On failure the previous contents stay in place and
    /// calling this again retries.
    pub async fn refresh(&mut self) -> Result<usize, Notice> {
        self.status = FeedStatus::Loading;
        match self.source.fetch_all_events().await {
            Ok(events) => {
                let loaded = events.len();
                self.list.load(events);
                self.status = FeedStatus::Ready;
                info!(loaded, "feed: events loaded");
                Ok(loaded)
            }
            Err(err) => {
                warn!(error = %err, "feed: fetching events failed");
                let notice = Notice::from_error(NoticeContext::FetchEvents, &err);
                self.status = FeedStatus::Failed(notice.clone());
                Err(notice)
            }
        }
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn notice(&self) -> Option<&Notice> {
        match &self.status {
            FeedStatus::Failed(notice) => Some(notice),
            _ => None,
        }
    }

    /// Hides the failure notice; the stale list stays visible.
    pub fn dismiss_notice(&mut self) {
        if matches!(self.status, FeedStatus::Failed(_)) {
            self.status = FeedStatus::Ready;
        }
    }

    pub fn list(&self) -> &EventListController {
        &self.list
    }

    pub fn set_category(&mut self, category: Option<String>) {
        self.list.set_category(category);
    }

    pub fn load_more(&mut self) {
        self.list.load_more();
    }

    pub fn visible(&self) -> Vec<&Event> {
        self.list.visible()
    }

    /// "No events found".
    pub fn is_empty_result(&self) -> bool {
        self.status == FeedStatus::Ready && self.list.visible().is_empty()
    }
}
