use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

/// Where uploaded camera/gallery captures are kept until analysis reads them.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    async fn save(&self, body: Bytes, content_type: &str) -> anyhow::Result<PathBuf>;

    /// Drop a capture once no entry refers to it. Missing files are not an error.
    async fn remove(&self, path: &Path) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct LocalCaptures {
    dir: PathBuf,
}

impl LocalCaptures {
    pub async fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create capture dir {}", dir.display()))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl CaptureStore for LocalCaptures {
    async fn save(&self, body: Bytes, content_type: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(!body.is_empty(), "empty capture");
        let ext = ext_from_mime(content_type).unwrap_or("bin");
        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write capture {}", path.display()))?;
        debug!(path = %path.display(), bytes = body.len(), "capture stored");
        Ok(path)
    }

    async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        // only files this store handed out
        if path.parent() != Some(self.dir.as_path()) {
            debug!(path = %path.display(), "not a stored capture; kept");
            return Ok(());
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "capture removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove capture {}", path.display())),
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod capture_tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = std::env::temp_dir().join(format!("nutrisnap-captures-{}", Uuid::new_v4()));
        let captures = LocalCaptures::new(&dir).await.unwrap();

        let path = captures
            .save(Bytes::from_static(b"\xff\xd8jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"\xff\xd8jpeg");

        let other = captures.save(Bytes::from_static(b"x"), "whatever/else").await.unwrap();
        assert_eq!(other.extension().and_then(|e| e.to_str()), Some("bin"));

        assert!(captures.save(Bytes::new(), "image/png").await.is_err());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_remove_only_touches_own_files() {
        let dir = std::env::temp_dir().join(format!("nutrisnap-captures-{}", Uuid::new_v4()));
        let captures = LocalCaptures::new(&dir).await.unwrap();

        let path = captures.save(Bytes::from_static(b"img"), "image/png").await.unwrap();
        captures.remove(&path).await.unwrap();
        assert!(!path.exists());
        // second removal is a no-op
        captures.remove(&path).await.unwrap();

        let outside = std::env::temp_dir().join(format!("nutrisnap-outside-{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&outside, b"keep").await.unwrap();
        captures.remove(&outside).await.unwrap();
        assert!(outside.exists());

        let _ = tokio::fs::remove_file(&outside).await;
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
