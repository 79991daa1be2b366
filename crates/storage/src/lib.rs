use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{owner_matches, Event, EventDraft, EventId, Profile, UserId},
    error::ApiException,
};

const EVENT_COLUMNS: &str = "e.id, e.name, e.description, e.image_url, e.location, e.venue, \
     e.event_date, e.event_time, e.category, e.user_id, e.created_at, e.updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates (or returns the existing) account for `email`.
    pub async fn create_user(&self, email: &str, name: &str) -> Result<UserId> {
        if let Some(existing) = self.user_for_email(email).await? {
            return Ok(existing);
        }
        let user_id = UserId::new_random();
        self.insert_profile(&Profile {
            id: user_id,
            name: name.to_string(),
            email: email.to_string(),
        })
        .await?;
        Ok(user_id)
    }

    pub async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query("INSERT INTO profiles (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(profile.id.to_string())
            .bind(&profile.name)
            .bind(&profile.email)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert profile for {}", profile.email))?;
        Ok(())
    }

    pub async fn user_for_email(&self, email: &str) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT id FROM profiles WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| parse_user_id(&r.try_get::<String, _>(0)?))
            .transpose()
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT id, name, email FROM profiles WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(Profile {
                id: parse_user_id(&r.try_get::<String, _>(0)?)?,
                name: r.try_get(1)?,
                email: r.try_get(2)?,
            })
        })
        .transpose()
    }

    /// Removes the account; events it owned stay behind without an owner.
    pub async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_event(&self, owner: Option<UserId>, draft: &EventDraft) -> Result<Event> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO events
                (name, description, image_url, location, venue, event_date, event_time, category, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.image_url)
        .bind(&draft.location)
        .bind(&draft.venue)
        .bind(draft.event_date)
        .bind(&draft.event_time)
        .bind(&draft.category)
        .bind(owner.map(|id| id.to_string()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert event '{}'", draft.name))?;
        let event_id = EventId(rec.try_get::<i64, _>(0)?);
        self.event(event_id)
            .await?
            .ok_or_else(|| ApiException::not_found(format!("event {event_id} vanished")).into())
    }

    pub async fn event(&self, event_id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?"))
            .bind(event_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    /// Replaces every editable field. Only the owner may update.
    pub async fn update_event(
        &self,
        actor: Option<UserId>,
        event_id: EventId,
        draft: &EventDraft,
    ) -> Result<Event> {
        self.ensure_owner(actor, event_id).await?;
        sqlx::query(
            "UPDATE events
             SET name = ?, description = ?, image_url = ?, location = ?, venue = ?,
                 event_date = ?, event_time = ?, category = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.image_url)
        .bind(&draft.location)
        .bind(&draft.venue)
        .bind(draft.event_date)
        .bind(&draft.event_time)
        .bind(&draft.category)
        .bind(Utc::now())
        .bind(event_id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update event {event_id}"))?;
        self.event(event_id)
            .await?
            .ok_or_else(|| ApiException::not_found(format!("event {event_id} not found")).into())
    }

    /// Deletes the event and its attendance. Only the owner may delete.
    pub async fn delete_event(&self, actor: Option<UserId>, event_id: EventId) -> Result<()> {
        self.ensure_owner(actor, event_id).await?;
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete event {event_id}"))?;
        Ok(())
    }

    async fn ensure_owner(&self, actor: Option<UserId>, event_id: EventId) -> Result<()> {
        let event = self
            .event(event_id)
            .await?
            .ok_or_else(|| ApiException::not_found(format!("event {event_id} not found")))?;
        if !owner_matches(actor, event.user_id) {
            return Err(ApiException::forbidden(format!(
                "only the owner may modify event {event_id}"
            ))
            .into());
        }
        Ok(())
    }

    /// All events ascending by date; ties keep insertion order.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e ORDER BY e.event_date ASC, e.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn list_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e
             WHERE e.user_id = ?
             ORDER BY e.event_date ASC, e.id ASC"
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn list_attending_events(&self, user_id: UserId) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e
             INNER JOIN event_attendees a ON a.event_id = e.id
             WHERE a.user_id = ?
             ORDER BY a.id ASC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn attendance_exists(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM event_attendees WHERE event_id = ? AND user_id = ?")
            .bind(event_id.0)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn attendee_count(&self, event_id: EventId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_attendees WHERE event_id = ?")
            .bind(event_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Idempotent: a second insert for the same pair is a no-op.
    pub async fn insert_attendance(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        if self.event(event_id).await?.is_none() {
            return Err(ApiException::not_found(format!("event {event_id} not found")).into());
        }
        sqlx::query(
            "INSERT INTO event_attendees (event_id, user_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT(event_id, user_id) DO NOTHING",
        )
        .bind(event_id.0)
        .bind(user_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to record attendance for event {event_id}"))?;
        Ok(())
    }

    pub async fn delete_attendance(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM event_attendees WHERE event_id = ? AND user_id = ?")
            .bind(event_id.0)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove attendance for event {event_id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    let user_id = row
        .try_get::<Option<String>, _>(9)?
        .map(|raw| parse_user_id(&raw))
        .transpose()?;
    Ok(Event {
        id: EventId(row.try_get::<i64, _>(0)?),
        name: row.try_get(1)?,
        description: row.try_get(2)?,
        image_url: row.try_get(3)?,
        location: row.try_get(4)?,
        venue: row.try_get(5)?,
        event_date: row.try_get::<NaiveDate, _>(6)?,
        event_time: row.try_get(7)?,
        category: row.try_get(8)?,
        user_id,
        created_at: row.try_get::<DateTime<Utc>, _>(10)?,
        updated_at: row.try_get::<DateTime<Utc>, _>(11)?,
    })
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    raw.parse::<UserId>()
        .with_context(|| format!("stored user id '{raw}' is not a uuid"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
