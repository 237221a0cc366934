use std::collections::HashMap;

use axum::extract::{multipart::Field, Multipart};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::storage::PendingUpload;

/// A picture received in a multipart body, not yet stored.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub ext: &'static str,
}

/// Text fields plus the optional `picture` file of a multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub picture: Option<UploadItem>,
}

impl MultipartForm {
    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();
        while let Some(field) = mp.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "picture" {
                if field.file_name().map_or(true, str::is_empty) {
                    // Browsers send an empty part when no file was chosen.
                    continue;
                }
                form.picture = read_picture(field).await?;
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Trimmed text value; empty counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

async fn read_picture(field: Field<'_>) -> Result<Option<UploadItem>, AppError> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".into());
    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| AppError::validation(format!("unsupported picture type {content_type}")))?;
    let body = field.bytes().await?;
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadItem {
        body,
        content_type,
        ext,
    }))
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Stores the picture under `<prefix>/<uuid>.<ext>`; rolled back unless the caller commits.
pub async fn stage_picture(
    st: &AppState,
    prefix: &str,
    item: UploadItem,
) -> Result<PendingUpload, AppError> {
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), item.ext);
    let pending = PendingUpload::put(st.storage.clone(), key, item.body, &item.content_type).await?;
    Ok(pending)
}

/// Removes a staged picture after the surrounding operation failed.
pub async fn discard_picture(picture: Option<PendingUpload>) {
    let Some(p) = picture else {
        return;
    };
    let key = p.key().to_string();
    if let Err(e) = p.discard().await {
        warn!(error = ?e, key = %key, "failed to remove staged picture");
    }
}
