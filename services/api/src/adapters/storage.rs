//! services/api/src/adapters/storage.rs
//!
//! Local filesystem implementation of the `FileStorage` port. Each bucket is a
//! directory under the storage root; files are served back under
//! `<public prefix>/<bucket>/<name>`.

use async_trait::async_trait;
use classroom_core::ports::{FileStorage, PortError, PortResult};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// The bucket that holds lesson and content uploads.
pub const LESSON_FILES_BUCKET: &str = "lesson-files";

#[derive(Clone)]
pub struct LocalFileStorage {
    root_path: PathBuf,
    url_prefix: String,
}

impl LocalFileStorage {
    pub fn new(root_path: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path,
            url_prefix,
        }
    }
}

/// Keeps a safe, readable stem of the uploaded name and prefixes a fresh id,
/// so two uploads never collide and no path components escape the bucket.
pub fn stored_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        format!("{}-{}", Uuid::new_v4(), cleaned)
    }
}

fn valid_bucket(bucket: &str) -> bool {
    !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        _content_type: &str,
        data: &[u8],
    ) -> PortResult<String> {
        if !valid_bucket(bucket) {
            return Err(PortError::Unexpected(format!("Invalid bucket name '{}'", bucket)));
        }
        let dir = self.root_path.join(bucket);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let name = stored_name(file_name);
        fs::write(dir.join(&name), data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(format!("{}/{}/{}", self.url_prefix, bucket, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_drop_path_components() {
        let name = stored_name("../../etc/passwd");
        assert!(name.ends_with("-passwd"));
        assert!(!name.contains('/'));

        let name = stored_name("Cell Diagram (v2).png");
        assert!(name.ends_with("-Cell_Diagram__v2_.png"));
    }

    #[tokio::test]
    async fn uploads_land_in_the_bucket_directory() {
        let root = std::env::temp_dir().join(format!("classroom-storage-{}", Uuid::new_v4()));
        let storage = LocalFileStorage::new(root.clone(), "/files".to_string());

        let url = storage
            .upload(LESSON_FILES_BUCKET, "notes.txt", "text/plain", b"photosynthesis")
            .await
            .unwrap();
        assert!(url.starts_with("/files/lesson-files/"));

        let name = url.rsplit('/').next().unwrap();
        let stored = fs::read(root.join(LESSON_FILES_BUCKET).join(name)).await.unwrap();
        assert_eq!(stored, b"photosynthesis");

        assert!(storage.upload("../up", "x", "text/plain", b"").await.is_err());
        let _ = fs::remove_dir_all(root).await;
    }
}
