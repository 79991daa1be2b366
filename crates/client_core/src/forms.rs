//! Create/edit form models and the selected event image.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, NaiveTime};
use shared::domain::{Event, EventDraft};
use thiserror::Error;
use uuid::Uuid;

/// Categories offered by the form. Stored data may carry others.
pub const CATEGORY_CHOICES: [&str; 15] = [
    "Rock",
    "Jazz",
    "Electronic",
    "Indie",
    "Hip Hop",
    "Country",
    "Blues",
    "Classical",
    "Reggae",
    "Metal",
    "Folk",
    "Latin",
    "R&B",
    "Pop",
    "Punk",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Please select an image for the event")]
    MissingImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Am,
    #[default]
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        })
    }
}

impl std::str::FromStr for Period {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            _ => Err(FormError::InvalidTime(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewEventForm {
    pub name: String,
    pub description: String,
    pub location: String,
    /// `YYYY-MM-DD`
    pub event_date: String,
    /// `HH:MM`
    pub event_time: String,
    pub period: Period,
    pub category: String,
}

impl NewEventForm {
    /// The returned draft has no image yet; the editor fills it in after
    /// the upload.
    pub fn validate(&self) -> Result<EventDraft, FormError> {
        let name = required("name", &self.name)?;
        let description = required("description", &self.description)?;
        let location = required("location", &self.location)?;
        let event_date = parse_date(&self.event_date)?;
        let time = required("time", &self.event_time)?;
        let time = NaiveTime::parse_from_str(&time, "%H:%M")
            .map_err(|_| FormError::InvalidTime(time.clone()))?;
        let category = required("category", &self.category)?;

        Ok(EventDraft {
            name,
            description,
            image_url: String::new(),
            location,
            venue: String::new(),
            event_date,
            event_time: format!("{} {}", time.format("%H:%M"), self.period),
            category,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditEventForm {
    pub name: String,
    pub description: String,
    pub location: String,
    pub venue: String,
    pub event_date: String,
    /// Free text, kept as stored.
    pub event_time: String,
    pub category: String,
}

impl EditEventForm {
    pub fn from_event(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            venue: event.venue.clone(),
            event_date: event.event_date.format("%Y-%m-%d").to_string(),
            event_time: event.event_time.clone(),
            category: event.category.clone(),
        }
    }

    pub fn to_draft(&self, image_url: &str) -> Result<EventDraft, FormError> {
        Ok(EventDraft {
            name: required("name", &self.name)?,
            description: required("description", &self.description)?,
            image_url: image_url.to_string(),
            location: required("location", &self.location)?,
            venue: required("venue", &self.venue)?,
            event_date: parse_date(&self.event_date)?,
            event_time: required("time", &self.event_time)?,
            category: required("category", &self.category)?,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Missing(field));
    }
    Ok(value.to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, FormError> {
    let value = required("date", value)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| FormError::InvalidDate(value))
}

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }

    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }

    /// `<millis>-<7 random chars>.<ext>`
    pub fn storage_path(&self, now_millis: i64) -> String {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
        match self.extension() {
            Some(ext) => format!("{now_millis}-{suffix}.{ext}"),
            None => format!("{now_millis}-{suffix}"),
        }
    }
}
