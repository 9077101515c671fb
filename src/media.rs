use std::{collections::HashMap, path::Path};

use axum::{body::Bytes, extract::Multipart};
use tracing::info;
use uuid::Uuid;

use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        if content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A multipart form split into its text fields and its non-empty files.
#[derive(Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or("application/octet-stream").to_owned();
                    let bytes = field.bytes().await?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(name, Upload { file_name, content_type, bytes });
                }
                None => {
                    form.fields.insert(name, field.text().await?);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed text field, empty when missing.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).map(|v| v.trim().to_owned()).unwrap_or_default()
    }
}

pub fn sanitize_filename(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect()
}

/// Writes an upload under the owner's directory and returns its public url.
pub async fn store(media_dir: &Path, owner: &str, prefix: &str, upload: &Upload) -> AppResult<String> {
    let owner = sanitize_filename(owner);
    let file_name = format!("{prefix}{}-{}", Uuid::now_v7(), sanitize_filename(&upload.file_name));

    let dir = media_dir.join(&owner);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&file_name), &upload.bytes).await?;

    info!("stored {} ({} bytes) for {owner}", file_name, upload.bytes.len());
    Ok(format!("/media/{owner}/{file_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_and_video_are_media() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime("text/image/x"), None);
    }

    #[test]
    fn filenames_are_flattened() {
        assert_eq!(sanitize_filename("My Photo (1).PNG"), "my-photo--1-.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
    }

    #[tokio::test]
    async fn store_writes_under_owner_dir() {
        let dir = std::env::temp_dir().join(format!("pack-media-{}", Uuid::now_v7()));
        let upload = Upload {
            file_name: "Wolf.png".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"png"),
        };

        let url = store(&dir, "google:42", "avatar-", &upload).await.unwrap();
        assert!(url.starts_with("/media/google-42/avatar-"));
        assert!(url.ends_with("-wolf.png"));

        let on_disk = dir.join(url.trim_start_matches("/media/"));
        assert_eq!(tokio::fs::read(on_disk).await.unwrap(), b"png");
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
