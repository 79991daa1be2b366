//! In-memory collaborators shared by the unit test suites.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    domain::{owner_matches, Event, EventDraft, EventId, Profile, UserId},
    error::ApiException,
};
use tokio::sync::{Mutex, Semaphore};

use crate::{AttendanceStore, AuthProvider, EventMutations, EventSource, ImageStore, ProfileStore};

pub fn event(id: i64, category: &str, owner: Option<UserId>) -> Event {
    let at: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().expect("timestamp");
    Event {
        id: EventId(id),
        name: format!("event-{id}"),
        description: format!("description {id}"),
        image_url: format!("https://img.example/{id}.png"),
        location: "Austin, TX".to_string(),
        venue: String::new(),
        event_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date")
            + chrono::Duration::days(id),
        event_time: "08:00 PM".to_string(),
        category: category.to_string(),
        user_id: owner,
        created_at: at,
        updated_at: at,
    }
}

pub fn events_with_categories(categories: &[&str]) -> Vec<Event> {
    categories
        .iter()
        .enumerate()
        .map(|(index, category)| event(index as i64 + 1, category, None))
        .collect()
}

#[derive(Default)]
struct FakeState {
    events: Vec<Event>,
    attendance: HashSet<(EventId, UserId)>,
    profiles: HashMap<UserId, Profile>,
    uploads: Vec<String>,
    next_event_id: i64,
}

/// Backend double. `fail_*` switches make the matching calls error out;
/// `hold_toggles` parks insert/delete calls until `release_toggle`;
/// `hold_record_reads` answers record reads from the state at call time but
/// only returns after `release_record_read`.
pub struct FakeBackend {
    state: Mutex<FakeState>,
    pub actor: Mutex<Option<UserId>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_attendance_fetch: Mutex<bool>,
    pub fail_toggle: Mutex<bool>,
    pub fail_count: Mutex<bool>,
    pub fail_mutations: Mutex<bool>,
    toggle_gate: Option<Semaphore>,
    record_gate: Option<Semaphore>,
    pub fetch_calls: AtomicUsize,
    pub record_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    pub toggle_calls: AtomicUsize,
    pub mutation_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new(events: Vec<Event>) -> Self {
        let next_event_id = events.iter().map(|event| event.id.0).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(FakeState {
                events,
                next_event_id,
                ..FakeState::default()
            }),
            actor: Mutex::new(None),
            fail_fetch: Mutex::new(false),
            fail_attendance_fetch: Mutex::new(false),
            fail_toggle: Mutex::new(false),
            fail_count: Mutex::new(false),
            fail_mutations: Mutex::new(false),
            toggle_gate: None,
            record_gate: None,
            fetch_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            toggle_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
        }
    }

    pub fn hold_toggles(mut self) -> Self {
        self.toggle_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_toggle(&self) {
        if let Some(gate) = &self.toggle_gate {
            gate.add_permits(1);
        }
    }

    pub fn hold_record_reads(mut self) -> Self {
        self.record_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_record_read(&self) {
        if let Some(gate) = &self.record_gate {
            gate.add_permits(1);
        }
    }

    pub async fn has_attendee(&self, event_id: EventId, user_id: UserId) -> bool {
        self.state.lock().await.attendance.contains(&(event_id, user_id))
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub async fn add_attendee(&self, event_id: EventId, user_id: UserId) {
        self.state.lock().await.attendance.insert((event_id, user_id));
    }

    pub async fn set_events(&self, events: Vec<Event>) {
        self.state.lock().await.events = events;
    }

    pub async fn uploads(&self) -> Vec<String> {
        self.state.lock().await.uploads.clone()
    }

    pub async fn profile(&self, user_id: UserId) -> Option<Profile> {
        self.state.lock().await.profiles.get(&user_id).cloned()
    }

    pub async fn stored_event(&self, event_id: EventId) -> Option<Event> {
        self.state
            .lock()
            .await
            .events
            .iter()
            .find(|event| event.id == event_id)
            .cloned()
    }

    async fn wait_for_gate(gate: Option<&Semaphore>) {
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    async fn ensure_writable(&self, event_id: EventId) -> Result<()> {
        if *self.fail_mutations.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        let actor = *self.actor.lock().await;
        let state = self.state.lock().await;
        let event = state
            .events
            .iter()
            .find(|event| event.id == event_id)
            .ok_or_else(|| ApiException::not_found(format!("event {event_id} not found")))?;
        if !owner_matches(actor, event.user_id) {
            return Err(ApiException::forbidden("only the owner may modify this event").into());
        }
        Ok(())
    }
}

fn apply_draft(event: &mut Event, draft: EventDraft) {
    event.name = draft.name;
    event.description = draft.description;
    event.image_url = draft.image_url;
    event.location = draft.location;
    event.venue = draft.venue;
    event.event_date = draft.event_date;
    event.event_time = draft.event_time;
    event.category = draft.category;
}

#[async_trait]
impl EventSource for FakeBackend {
    async fn fetch_all_events(&self) -> Result<Vec<Event>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fetch.lock().await {
            return Err(anyhow!("connection refused"));
        }
        let mut events = self.state.lock().await.events.clone();
        events.sort_by_key(|event| event.event_date);
        Ok(events)
    }

    async fn fetch_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>> {
        let events = self.fetch_all_events().await?;
        Ok(events
            .into_iter()
            .filter(|event| event.user_id == Some(owner))
            .collect())
    }

    async fn fetch_attending_events(&self, user_id: UserId) -> Result<Vec<Event>> {
        let events = self.fetch_all_events().await?;
        let state = self.state.lock().await;
        Ok(events
            .into_iter()
            .filter(|event| state.attendance.contains(&(event.id, user_id)))
            .collect())
    }
}

#[async_trait]
impl AttendanceStore for FakeBackend {
    async fn fetch_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        if *self.fail_attendance_fetch.lock().await {
            self.record_calls.fetch_add(1, Ordering::SeqCst);
            return Err(anyhow!("request timed out"));
        }
        let attending = self.has_attendee(event_id, user_id).await;
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        Self::wait_for_gate(self.record_gate.as_ref()).await;
        Ok(attending)
    }

    async fn fetch_attendee_count(&self, event_id: EventId) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_count.lock().await || *self.fail_attendance_fetch.lock().await {
            return Err(anyhow!("request timed out"));
        }
        let state = self.state.lock().await;
        Ok(state
            .attendance
            .iter()
            .filter(|(attended, _)| *attended == event_id)
            .count() as u64)
    }

    async fn insert_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        Self::wait_for_gate(self.toggle_gate.as_ref()).await;
        if *self.fail_toggle.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        self.state.lock().await.attendance.insert((event_id, user_id));
        Ok(())
    }

    async fn delete_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        Self::wait_for_gate(self.toggle_gate.as_ref()).await;
        if *self.fail_toggle.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        self.state.lock().await.attendance.remove(&(event_id, user_id));
        Ok(())
    }
}

#[async_trait]
impl EventMutations for FakeBackend {
    async fn create_event(&self, owner: UserId, draft: EventDraft) -> Result<Event> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_mutations.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        let mut state = self.state.lock().await;
        let id = state.next_event_id;
        state.next_event_id += 1;
        let mut created = event(id, &draft.category, Some(owner));
        apply_draft(&mut created, draft);
        state.events.push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, event_id: EventId, draft: EventDraft) -> Result<Event> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_writable(event_id).await?;
        let mut state = self.state.lock().await;
        let stored = state
            .events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| ApiException::not_found("event vanished"))?;
        apply_draft(stored, draft);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_writable(event_id).await?;
        let mut state = self.state.lock().await;
        state.events.retain(|event| event.id != event_id);
        state.attendance.retain(|(attended, _)| *attended != event_id);
        Ok(())
    }
}

#[async_trait]
impl ImageStore for FakeBackend {
    async fn upload_image(&self, path: &str, _bytes: Vec<u8>, _mime_type: &str) -> Result<String> {
        if *self.fail_mutations.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        self.state.lock().await.uploads.push(path.to_string());
        Ok(format!("https://cdn.example/event-images/{path}"))
    }
}

#[async_trait]
impl AuthProvider for FakeBackend {
    async fn sign_up(&self, _name: &str, email: &str, _password: &str) -> Result<UserId> {
        if email.starts_with("taken") {
            return Err(anyhow!("User already registered"));
        }
        let user_id = UserId::new_random();
        *self.actor.lock().await = Some(user_id);
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId> {
        let state = self.state.lock().await;
        let profile = state
            .profiles
            .values()
            .find(|profile| profile.email == email)
            .filter(|_| password == "correct horse")
            .ok_or_else(|| anyhow!("Invalid login credentials"))?;
        let user_id = profile.id;
        drop(state);
        *self.actor.lock().await = Some(user_id);
        Ok(user_id)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.actor.lock().await = None;
        if *self.fail_mutations.lock().await {
            return Err(anyhow!("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FakeBackend {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>> {
        Ok(self.state.lock().await.profiles.get(&user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.id, profile.clone());
        Ok(())
    }
}
