use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

pub const DEFAULT_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub target_url: String,
    pub slug: String,
    pub color: String,
    /// Creation time in Unix milliseconds
    pub created_at: i64,
    /// Last owner edit in Unix milliseconds; equals `created_at` until then
    pub updated_at: i64,
}

impl QrCode {
    /// Build a new record for `user_id` from an already validated request
    pub fn new(user_id: &str, request: ValidCreateQrCode) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: request.title,
            target_url: request.target_url,
            slug: request.slug,
            color: request.color,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Body of `POST /api/qr-codes`
///
/// Any `userId` sent by the client is ignored; the owner always comes from the
/// authenticated identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrCodeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidCreateQrCode {
    pub title: String,
    pub target_url: String,
    pub slug: String,
    pub color: String,
}

impl CreateQrCodeRequest {
    pub fn validate(self) -> Result<ValidCreateQrCode, AppError> {
        let title = validate_title(&self.title)?;
        let target_url = validate_target_url(&self.target_url)?;
        validate_slug(&self.slug)?;
        let color = match self.color {
            Some(color) => validate_color(&color)?,
            None => DEFAULT_COLOR.to_string(),
        };

        Ok(ValidCreateQrCode {
            title,
            target_url,
            slug: self.slug,
            color,
        })
    }
}

/// Body of `PUT /api/qr-codes/{id}/update`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQrCodeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Mutable fields of a QR code. `None` color leaves the stored color untouched.
#[derive(Debug, Clone)]
pub struct QrCodeChanges {
    pub title: String,
    pub target_url: String,
    pub color: Option<String>,
}

impl UpdateQrCodeRequest {
    pub fn validate(self) -> Result<QrCodeChanges, AppError> {
        let title = validate_title(&self.title)?;
        let target_url = validate_target_url(&self.target_url)?;
        let color = self.color.as_deref().map(validate_color).transpose()?;

        Ok(QrCodeChanges {
            title,
            target_url,
            color,
        })
    }
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn validate_target_url(target_url: &str) -> Result<String, AppError> {
    let target_url = target_url.trim();
    if target_url.is_empty() {
        return Err(AppError::Validation("Target URL is required".to_string()));
    }

    let parsed = Url::parse(target_url)
        .map_err(|_| AppError::Validation("Must be a valid URL".to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "URL must use http or https".to_string(),
        ));
    }

    Ok(target_url.to_string())
}

pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::Validation("Slug is required".to_string()));
    }
    let valid = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        return Err(AppError::Validation(
            "Slug must be lowercase alphanumeric with hyphens".to_string(),
        ));
    }
    Ok(())
}

fn validate_color(color: &str) -> Result<String, AppError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::Validation("Must be a valid hex color".to_string()));
    }
    Ok(color.to_string())
}
