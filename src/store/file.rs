//! Filesystem document byte-store: one file per key under a root directory.
//!
//! Keys may contain `/`-separated segments, which become subdirectories.
//! Segments are limited to ASCII alphanumerics, `-`, `_` and `.`, and may
//! not be empty, `.` or `..`, so a key can never address a path outside the
//! root.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::DocStore;

pub struct FileDocStore {
    root: PathBuf,
}

impl FileDocStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create document store at {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("invalid document store key: empty");
    }
    for segment in key.split('/') {
        let allowed = segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if segment.is_empty() || segment == "." || segment == ".." || !allowed {
            bail!("invalid document store key: {:?}", key);
        }
    }
    Ok(())
}

#[async_trait]
impl DocStore for FileDocStore {
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let path = self.key_path(key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => out.push(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => out.push(None),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()))
                }
            }
        }
        Ok(out)
    }

    async fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        for (key, value) in entries {
            let path = self.key_path(key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, value)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trip_with_missing_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocStore::open(&tmp.path().join("docs")).unwrap();
        store
            .mset(&[
                ("d1".into(), b"one".to_vec()),
                ("nested/d2".into(), b"two".to_vec()),
            ])
            .await
            .unwrap();

        let got = store
            .mget(&["nested/d2".into(), "absent".into(), "d1".into()])
            .await
            .unwrap();
        assert_eq!(got, vec![Some(b"two".to_vec()), None, Some(b"one".to_vec())]);
    }

    #[tokio::test]
    async fn overwrites_existing_key() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocStore::open(tmp.path()).unwrap();
        store.mset(&[("k".into(), b"old".to_vec())]).await.unwrap();
        store.mset(&[("k".into(), b"new".to_vec())]).await.unwrap();
        assert_eq!(store.mget(&["k".into()]).await.unwrap(), vec![Some(b"new".to_vec())]);
    }

    #[test]
    fn rejects_escaping_keys() {
        for bad in ["", "../etc/passwd", "a//b", "a/./b", "/abs", "sp ace", "x/.."] {
            assert!(validate_key(bad).is_err(), "accepted {:?}", bad);
        }
        for good in ["d1", "abc-123_x.json", "wiki/page.md", "6f1c2b7e-uuid"] {
            assert!(validate_key(good).is_ok(), "rejected {:?}", good);
        }
    }
}
