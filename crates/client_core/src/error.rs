//! User-facing notices for failed backend calls.

use std::fmt;

use shared::error::{error_code_of, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    FetchEvents,
    FetchAttendance,
    ToggleAttendance,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    UploadImage,
    SignIn,
    SignUp,
    SignOut,
    Profile,
}

impl NoticeContext {
    fn headline(self) -> &'static str {
        match self {
            Self::FetchEvents => "Failed to fetch events",
            Self::FetchAttendance => "Failed to load attendance",
            Self::ToggleAttendance => "Failed to update attendance. Please try again.",
            Self::CreateEvent => "Failed to create event",
            Self::UpdateEvent => "Failed to update event",
            Self::DeleteEvent => "Failed to delete event. Please try again.",
            Self::UploadImage => "Failed to upload image",
            Self::SignIn => "Failed to sign in",
            Self::SignUp => "Failed to create account",
            Self::SignOut => "Failed to sign out",
            Self::Profile => "Failed to load profile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Auth,
    Forbidden,
    Transport,
    Validation,
    Unknown,
}

/// A dismissible message shown near the control that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    context: NoticeContext,
    category: NoticeCategory,
    message: String,
}

impl Notice {
    pub fn from_error(context: NoticeContext, err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let category = match error_code_of(err) {
            Some(ErrorCode::Unauthorized) => NoticeCategory::Auth,
            Some(ErrorCode::Forbidden) => NoticeCategory::Forbidden,
            // Auth services report bad credentials as a plain 400.
            Some(ErrorCode::Validation | ErrorCode::Conflict) => match classify_message(&message) {
                NoticeCategory::Auth => NoticeCategory::Auth,
                _ => NoticeCategory::Validation,
            },
            Some(ErrorCode::Unavailable) => NoticeCategory::Transport,
            Some(ErrorCode::NotFound | ErrorCode::Internal) => NoticeCategory::Unknown,
            None => classify_message(&message),
        };
        Self {
            context,
            category,
            message,
        }
    }

    pub fn validation(context: NoticeContext, message: impl Into<String>) -> Self {
        Self {
            context,
            category: NoticeCategory::Validation,
            message: message.into(),
        }
    }

    pub fn context(&self) -> NoticeContext {
        self.context
    }

    pub fn category(&self) -> NoticeCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Everything but bad input can be retried as-is. A toggle carries no
    /// user input, so its failures are always retryable.
    pub fn is_retryable(&self) -> bool {
        self.context == NoticeContext::ToggleAttendance || self.category != NoticeCategory::Validation
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == NoticeCategory::Auth
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context.headline(), self.message)
    }
}

impl std::error::Error for Notice {}

fn classify_message(message: &str) -> NoticeCategory {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401")
        || lower.contains("unauthorized")
        || lower.contains("jwt")
        || lower.contains("invalid login credentials")
        || lower.contains("session expired")
    {
        NoticeCategory::Auth
    } else if lower.contains("403")
        || lower.contains("forbidden")
        || lower.contains("row-level security")
        || lower.contains("permission denied")
    {
        NoticeCategory::Forbidden
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("dns")
        || lower.contains("network")
        || lower.contains("unavailable")
    {
        NoticeCategory::Transport
    } else if lower.contains("invalid") || lower.contains("malformed") || lower.contains("required")
    {
        NoticeCategory::Validation
    } else {
        NoticeCategory::Unknown
    }
}
