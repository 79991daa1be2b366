//! Per-event ownership check and attendance toggle for the detail view.
//!
//! A guard is scoped to one displayed event. Viewing a different event means
//! mounting a new guard; a session change is applied in place through
//! [`AttendanceGuard::watch_session`].
//!
//! Local attendance state changes only after the backend confirms a toggle,
//! so a failed call never needs a rollback.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use shared::domain::{owner_matches, Event, EventId, UserId};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{Notice, NoticeContext},
    session::SessionHub,
    AttendanceStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceSnapshot {
    pub is_attending: bool,
    pub attendee_count: u64,
    /// Both initial fetches have completed for the current viewer.
    pub synced: bool,
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("sign in to attend events")]
    Unauthenticated,
    #[error("an attendance update is already in progress")]
    ToggleInFlight,
    #[error("attendance is still loading")]
    NotSynced,
    #[error("{0}")]
    Backend(Notice),
}

struct GuardState {
    viewer: Option<UserId>,
    snapshot: AttendanceSnapshot,
    /// Bumped on every viewer change; results captured under an older epoch
    /// are dropped.
    epoch: u64,
    /// Bumped on every confirmed toggle; a sync that started before it is
    /// dropped.
    toggles: u64,
}

pub struct AttendanceGuard {
    store: Arc<dyn AttendanceStore>,
    event_id: EventId,
    owner: Option<UserId>,
    reconcile_count: bool,
    state: Mutex<GuardState>,
    toggle_in_flight: AtomicBool,
}

/// Clears the in-flight flag when the toggle finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MountedGuard {
    pub guard: Arc<AttendanceGuard>,
    pub watch: SessionWatch,
    pub initial_sync: Result<AttendanceSnapshot, Notice>,
}

/// Session subscription of a mounted guard; unsubscribes on drop.
pub struct SessionWatch {
    task: JoinHandle<()>,
}

impl SessionWatch {
    pub fn unsubscribe(self) {}
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl AttendanceGuard {
    pub fn new(store: Arc<dyn AttendanceStore>, event: &Event, viewer: Option<UserId>) -> Arc<Self> {
        Arc::new(Self {
            store,
            event_id: event.id,
            owner: event.user_id,
            reconcile_count: true,
            state: Mutex::new(GuardState {
                viewer,
                snapshot: AttendanceSnapshot::default(),
                epoch: 0,
                toggles: 0,
            }),
            toggle_in_flight: AtomicBool::new(false),
        })
    }

    /// Like [`AttendanceGuard::new`], but keeps the locally adjusted count
    /// after a toggle instead of re-reading it from the backend.
    pub fn without_count_reconciliation(
        store: Arc<dyn AttendanceStore>,
        event: &Event,
        viewer: Option<UserId>,
    ) -> Arc<Self> {
        let mut guard = Self::new(store, event, viewer);
        if let Some(inner) = Arc::get_mut(&mut guard) {
            inner.reconcile_count = false;
        }
        guard
    }

    /// Builds the guard from the current session, subscribes it to session
    /// changes and runs the initial sync.
    pub async fn mount(
        store: Arc<dyn AttendanceStore>,
        event: &Event,
        hub: &SessionHub,
    ) -> MountedGuard {
        let guard = Self::new(store, event, None);
        // Subscribe before reading the snapshot so no change is missed.
        let watch = guard.watch_session(hub);
        guard.set_viewer(hub.current()).await;
        let initial_sync = guard.sync().await;
        MountedGuard {
            guard,
            watch,
            initial_sync,
        }
    }

    pub async fn viewer(&self) -> Option<UserId> {
        self.state.lock().await.viewer
    }

    /// Advisory only; the backend still rejects writes from non-owners.
    pub async fn can_modify(&self) -> bool {
        owner_matches(self.state.lock().await.viewer, self.owner)
    }

    pub async fn snapshot(&self) -> AttendanceSnapshot {
        self.state.lock().await.snapshot
    }

    pub fn is_toggling(&self) -> bool {
        self.toggle_in_flight.load(Ordering::Acquire)
    }

    /// Applies a session change. Returns false when the viewer is unchanged.
    pub async fn set_viewer(&self, viewer: Option<UserId>) -> bool {
        let mut state = self.state.lock().await;
        if state.viewer == viewer && state.epoch > 0 {
            return false;
        }
        state.viewer = viewer;
        state.epoch += 1;
        state.snapshot.is_attending = false;
        state.snapshot.synced = false;
        true
    }

    /// Re-reads attendance and the attendee count. The two reads run
    /// concurrently; without a viewer only the count is fetched.
    pub async fn sync(&self) -> Result<AttendanceSnapshot, Notice> {
        let (viewer, epoch, toggles) = {
            let state = self.state.lock().await;
            (state.viewer, state.epoch, state.toggles)
        };

        let attending = async {
            match viewer {
                Some(user_id) => {
                    self.store
                        .fetch_attendance_record(self.event_id, user_id)
                        .await
                }
                None => Ok(false),
            }
        };
        let count = self.store.fetch_attendee_count(self.event_id);
        let (attending, count) = tokio::join!(attending, count);

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(event_id = %self.event_id, "attendance: discarding stale sync result");
            return Ok(state.snapshot);
        }
        if state.toggles != toggles {
            debug!(event_id = %self.event_id, "attendance: toggle confirmed during sync; keeping it");
            return Ok(state.snapshot);
        }

        let mut failure = None;
        match attending {
            Ok(is_attending) => state.snapshot.is_attending = is_attending,
            Err(err) => failure = Some(err),
        }
        match count {
            Ok(attendee_count) => state.snapshot.attendee_count = attendee_count,
            Err(err) => failure = failure.or(Some(err)),
        }

        match failure {
            None => {
                state.snapshot.synced = true;
                Ok(state.snapshot)
            }
            Some(err) => {
                warn!(event_id = %self.event_id, error = %err, "attendance: sync failed");
                state.snapshot.synced = false;
                Err(Notice::from_error(NoticeContext::FetchAttendance, &err))
            }
        }
    }

    /// Flips the viewer's attendance. Rejected without a backend call when
    /// signed out, before the first sync for the viewer, or while another
    /// toggle is pending.
    pub async fn toggle_attendance(&self) -> Result<AttendanceSnapshot, AttendanceError> {
        let _in_flight =
            InFlight::acquire(&self.toggle_in_flight).ok_or(AttendanceError::ToggleInFlight)?;
        let (viewer, snapshot, epoch) = {
            let state = self.state.lock().await;
            (state.viewer, state.snapshot, state.epoch)
        };
        let viewer = viewer.ok_or(AttendanceError::Unauthenticated)?;
        if !snapshot.synced {
            return Err(AttendanceError::NotSynced);
        }
        let was_attending = snapshot.is_attending;

        let result = if was_attending {
            self.store
                .delete_attendance_record(self.event_id, viewer)
                .await
        } else {
            self.store
                .insert_attendance_record(self.event_id, viewer)
                .await
        };

        if let Err(err) = result {
            warn!(
                event_id = %self.event_id,
                user_id = %viewer,
                error = %err,
                "attendance: toggle failed"
            );
            return Err(AttendanceError::Backend(Notice::from_error(
                NoticeContext::ToggleAttendance,
                &err,
            )));
        }

        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                debug!(event_id = %self.event_id, "attendance: viewer changed during toggle");
                return Ok(state.snapshot);
            }
            state.toggles += 1;
            state.snapshot.is_attending = !was_attending;
            state.snapshot.attendee_count = if was_attending {
                state.snapshot.attendee_count.saturating_sub(1)
            } else {
                state.snapshot.attendee_count + 1
            };
            info!(
                event_id = %self.event_id,
                user_id = %viewer,
                attending = state.snapshot.is_attending,
                "attendance: toggled"
            );
        }

        if self.reconcile_count {
            self.reconcile_count(epoch).await;
        }

        Ok(self.snapshot().await)
    }

    async fn reconcile_count(&self, epoch: u64) {
        match self.store.fetch_attendee_count(self.event_id).await {
            Ok(count) => {
                let mut state = self.state.lock().await;
                if state.epoch == epoch {
                    state.snapshot.attendee_count = count;
                }
            }
            Err(err) => {
                debug!(event_id = %self.event_id, error = %err, "attendance: keeping local count");
            }
        }
    }

    /// Follows session changes until the returned watch is dropped.
    pub fn watch_session(self: &Arc<Self>, hub: &SessionHub) -> SessionWatch {
        let mut events = hub.subscribe();
        let guard: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                let viewer = match events.recv().await {
                    Ok(event) => event.viewer(),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "attendance: session events lagged; skipping to newer ones");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(guard) = guard.upgrade() else {
                    break;
                };
                if guard.set_viewer(viewer).await {
                    if let Err(notice) = guard.sync().await {
                        warn!(notice = %notice, "attendance: resync after session change failed");
                    }
                }
            }
        });
        SessionWatch { task }
    }
}

#[cfg(test)]
#[path = "tests/attendance_tests.rs"]
mod tests;
