//! Media store for profile pictures, attendance photos and lecture images.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::models::{MediaRef, Role};

/// Folder a media object is filed under, keyed by role and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Teachers,
    Coordinators,
    Heads,
    Lectures,
    TeacherAttendance,
    CoordinatorAttendance,
    HeadAttendance,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Teachers => "Teachers",
            MediaFolder::Coordinators => "Coordinators",
            MediaFolder::Heads => "Heads",
            MediaFolder::Lectures => "Lectures",
            MediaFolder::TeacherAttendance => "TeacherAttendance",
            MediaFolder::CoordinatorAttendance => "CoordinatorAttendance",
            MediaFolder::HeadAttendance => "HeadAttendance",
        }
    }

    pub fn profile(role: Role) -> Self {
        match role {
            Role::Teacher => MediaFolder::Teachers,
            Role::Coordinator => MediaFolder::Coordinators,
            Role::Head => MediaFolder::Heads,
        }
    }

    pub fn attendance(role: Role) -> Self {
        match role {
            Role::Teacher => MediaFolder::TeacherAttendance,
            Role::Coordinator => MediaFolder::CoordinatorAttendance,
            Role::Head => MediaFolder::HeadAttendance,
        }
    }
}

#[derive(Debug)]
pub enum MediaError {
    InvalidFileType,
    TooLarge,
    Io(std::io::Error),
}

/// Capability to store and delete named media objects.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` under `folder` and return a reference to it.
    async fn put(
        &self,
        folder: MediaFolder,
        fieldname: &str,
        extension: &str,
        data: Bytes,
    ) -> Result<MediaRef, MediaError>;

    /// Delete an object by key. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), MediaError>;
}

/// Normalize and check an upload's extension.
pub fn image_extension(filename: Option<&str>) -> Result<String, MediaError> {
    let ext = filename
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .trim_start_matches('.')
        .to_lowercase();
    if matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp") {
        Ok(ext)
    } else {
        Err(MediaError::InvalidFileType)
    }
}

/// Media store backed by a directory on local disk.
#[derive(Clone)]
pub struct LocalMediaStore {
    root_dir: PathBuf,
    public_base: String,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(root_dir: PathBuf, public_base: String, max_bytes: usize) -> Self {
        Self {
            root_dir,
            public_base,
            max_bytes,
        }
    }

    fn public_url(&self, key: &str) -> String {
        let base = self.public_base.trim_end_matches('/');
        format!("{}/{}", base, key)
    }

    /// Resolve a key to a path, refusing anything that escapes the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, MediaError> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(MediaError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid media key {:?}", key),
            )));
        }
        Ok(self.root_dir.join(key))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(
        &self,
        folder: MediaFolder,
        fieldname: &str,
        extension: &str,
        data: Bytes,
    ) -> Result<MediaRef, MediaError> {
        if data.len() > self.max_bytes {
            return Err(MediaError::TooLarge);
        }

        let key = format!("{}/{}.{}", folder.as_str(), Uuid::new_v4(), extension);
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::Io)?;
        }

        if let Err(err) = tokio::fs::write(&path, &data).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(MediaError::Io(err));
        }

        Ok(MediaRef {
            fieldname: fieldname.to_string(),
            path: self.public_url(&key),
            key: Some(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalMediaStore {
        LocalMediaStore::new(dir.path().to_path_buf(), "/media/".to_string(), 16)
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("IMG_01.JPG")).unwrap(), "jpg");
        assert_eq!(image_extension(Some("a.webp")).unwrap(), "webp");
        assert!(matches!(
            image_extension(Some("notes.pdf")),
            Err(MediaError::InvalidFileType)
        ));
        assert!(matches!(image_extension(None), Err(MediaError::InvalidFileType)));
    }

    #[tokio::test]
    async fn test_put_then_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let stored = store
            .put(MediaFolder::Lectures, "images", "png", Bytes::from_static(b"png-bytes"))
            .await
            .unwrap();

        let key = stored.key.clone().unwrap();
        assert!(key.starts_with("Lectures/"));
        assert_eq!(stored.path, format!("/media/{}", key));
        assert!(dir.path().join(&key).exists());

        store.delete(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        // Deleting again is not an error
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_rejects_oversized() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let result = store
            .put(MediaFolder::Teachers, "photo", "jpg", Bytes::from(vec![0u8; 17]))
            .await;
        assert!(matches!(result, Err(MediaError::TooLarge)));
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.delete("../etc/passwd").await.is_err());
    }

    #[test]
    fn test_folders_by_role() {
        assert_eq!(MediaFolder::profile(Role::Coordinator).as_str(), "Coordinators");
        assert_eq!(
            MediaFolder::attendance(Role::Teacher).as_str(),
            "TeacherAttendance"
        );
    }
}
