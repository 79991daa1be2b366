//! HTTP client for the hosted backend: a PostgREST data API plus the auth and
//! object storage services that sit next to it.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use shared::{
    domain::{Event, EventDraft, EventId, Profile, UserId},
    error::{ApiException, ErrorCode},
    protocol::{
        AttendanceRow, AttendingEventRow, AuthSessionResponse, AuthUser, BackendErrorBody,
        EventPatchRow, NewEventRow, PasswordGrantRequest, ProfileRow, SignUpMetadata,
        SignUpRequest,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::ClientSettings, AttendanceStore, AuthProvider, EventMutations, EventSource,
    ImageStore, ProfileStore,
};

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSessionResponse),
    User(AuthUser),
}

pub struct RestBackend {
    http: Client,
    settings: ClientSettings,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            settings,
            access_token: RwLock::new(None),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn public_image_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.settings.backend_url, self.settings.image_bucket
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.backend_url)
    }

    /// Signed-in requests carry the user's token, everything else the anon key.
    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.read().await.clone();
        let bearer = token.as_deref().unwrap_or(&self.settings.anon_key);
        builder
            .header("apikey", &self.settings.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
    }

    async fn get_rows<T>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = self.http.get(self.url(&format!("rest/v1/{table}"))).query(query);
        let response = self.authorized(request).await.send().await?;
        let rows = ensure_success(response, table).await?.json().await?;
        Ok(rows)
    }

    async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }
}

/// Turns a non-2xx response into an [`ApiException`] carrying the backend
/// message.
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<BackendErrorBody>(&body)
        .ok()
        .and_then(BackendErrorBody::into_message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.clone()
            }
        });
    debug!(%status, what, message = %message, "rest: request rejected");
    Err(anyhow::Error::new(ApiException::new(
        ErrorCode::from_status(status.as_u16()),
        message,
    ))
    .context(format!("{what} request failed with status {status}")))
}

/// Total from a `Content-Range` header such as `0-24/57` or `*/0`.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn single_row(mut rows: Vec<Event>, event_id: EventId) -> Result<Event> {
    if rows.is_empty() {
        // Row-level security filters rows the caller may not touch.
        return Err(ApiException::forbidden(format!(
            "event {event_id} was not modified; only its owner may change it"
        ))
        .into());
    }
    Ok(rows.swap_remove(0))
}

#[async_trait]
impl EventSource for RestBackend {
    async fn fetch_all_events(&self) -> Result<Vec<Event>> {
        self.get_rows(
            "events",
            &[("select", "*".into()), ("order", "event_date.asc".into())],
        )
        .await
    }

    async fn fetch_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>> {
        self.get_rows(
            "events",
            &[
                ("select", "*".into()),
                ("user_id", eq(owner)),
                ("order", "event_date.asc".into()),
            ],
        )
        .await
    }

    async fn fetch_attending_events(&self, user_id: UserId) -> Result<Vec<Event>> {
        let rows: Vec<AttendingEventRow> = self
            .get_rows(
                "event_attendees",
                &[("select", "event_id,events(*)".into()), ("user_id", eq(user_id))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|row| row.events).collect())
    }
}

#[async_trait]
impl AttendanceStore for RestBackend {
    async fn fetch_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let rows: Vec<serde_json::Value> = self
            .get_rows(
                "event_attendees",
                &[
                    ("select", "id".into()),
                    ("event_id", eq(event_id)),
                    ("user_id", eq(user_id)),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn fetch_attendee_count(&self, event_id: EventId) -> Result<u64> {
        let request = self
            .http
            .head(self.url("rest/v1/event_attendees"))
            .query(&[("select", "*".to_string()), ("event_id", eq(event_id))])
            .header("Prefer", "count=exact");
        let response = self.authorized(request).await.send().await?;
        let response = ensure_success(response, "event_attendees").await?;
        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("attendee count response had no Content-Range header"))?;
        content_range_total(range)
            .ok_or_else(|| anyhow!("malformed Content-Range header '{range}'"))
    }

    async fn insert_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let row = AttendanceRow {
            id: None,
            event_id,
            user_id,
        };
        let request = self
            .http
            .post(self.url("rest/v1/event_attendees"))
            .query(&[("on_conflict", "event_id,user_id")])
            .header("Prefer", "resolution=ignore-duplicates")
            .json(&row);
        let response = self.authorized(request).await.send().await?;
        ensure_success(response, "event_attendees").await?;
        Ok(())
    }

    async fn delete_attendance_record(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let request = self
            .http
            .delete(self.url("rest/v1/event_attendees"))
            .query(&[("event_id", eq(event_id)), ("user_id", eq(user_id))]);
        let response = self.authorized(request).await.send().await?;
        ensure_success(response, "event_attendees").await?;
        Ok(())
    }
}

#[async_trait]
impl EventMutations for RestBackend {
    async fn create_event(&self, owner: UserId, draft: EventDraft) -> Result<Event> {
        let request = self
            .http
            .post(self.url("rest/v1/events"))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&NewEventRow::new(owner, draft));
        let response = self.authorized(request).await.send().await?;
        let mut rows: Vec<Event> = ensure_success(response, "events").await?.json().await?;
        if rows.is_empty() {
            return Err(anyhow!("backend returned no row for the created event"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update_event(&self, event_id: EventId, draft: EventDraft) -> Result<Event> {
        let request = self
            .http
            .patch(self.url("rest/v1/events"))
            .query(&[("id", eq(event_id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&EventPatchRow::new(draft, Utc::now()));
        let response = self.authorized(request).await.send().await?;
        let rows: Vec<Event> = ensure_success(response, "events").await?.json().await?;
        single_row(rows, event_id)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let request = self
            .http
            .delete(self.url("rest/v1/events"))
            .query(&[("id", eq(event_id))])
            .header("Prefer", RETURN_REPRESENTATION);
        let response = self.authorized(request).await.send().await?;
        let rows: Vec<Event> = ensure_success(response, "events").await?.json().await?;
        single_row(rows, event_id).map(|_| ())
    }
}

#[async_trait]
impl ImageStore for RestBackend {
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, mime_type: &str) -> Result<String> {
        let request = self
            .http
            .post(self.url(&format!(
                "storage/v1/object/{}/{path}",
                self.settings.image_bucket
            )))
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes);
        let response = self.authorized(request).await.send().await?;
        ensure_success(response, "storage").await?;
        Ok(self.public_image_url(path))
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserId> {
        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            data: SignUpMetadata {
                name: name.to_string(),
            },
        };
        let request = self.http.post(self.url("auth/v1/signup")).json(&body);
        let response = self.authorized(request).await.send().await?;
        let response: SignUpResponse = ensure_success(response, "signup").await?.json().await?;
        let user_id = match response {
            SignUpResponse::Session(session) => {
                self.set_access_token(session.access_token).await;
                session.user.id
            }
            SignUpResponse::User(user) => user.id,
        };
        info!(user_id = %user_id, "rest: account created");
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId> {
        let body = PasswordGrantRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = self
            .http
            .post(self.url("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&body);
        let response = self.authorized(request).await.send().await?;
        let session: AuthSessionResponse = ensure_success(response, "token").await?.json().await?;
        let access_token = session
            .access_token
            .ok_or_else(|| anyhow!("sign-in response carried no access token"))?;
        self.set_access_token(Some(access_token)).await;
        Ok(session.user.id)
    }

    async fn sign_out(&self) -> Result<()> {
        let request = self.http.post(self.url("auth/v1/logout"));
        let result = self.authorized(request).await.send().await;
        self.set_access_token(None).await;
        ensure_success(result?, "logout").await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RestBackend {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>> {
        let rows: Vec<ProfileRow> = self
            .get_rows("profiles", &[("select", "*".into()), ("id", eq(user_id))])
            .await?;
        Ok(rows.into_iter().next().map(|row| Profile {
            id: row.id,
            name: row.name,
            email: row.email,
        }))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        let row = ProfileRow {
            id: profile.id,
            name: profile.name.clone(),
            email: profile.email.clone(),
        };
        let request = self.http.post(self.url("rest/v1/profiles")).json(&row);
        let response = self.authorized(request).await.send().await?;
        ensure_success(response, "profiles").await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
