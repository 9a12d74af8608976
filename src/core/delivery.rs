use crate::core::model::ConversionResult;
use crate::core::naming::{numbered, safe_file_name};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncWriteExt;

/// Where finished results go.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, result: &ConversionResult) -> anyhow::Result<PathBuf>;
}

/// Writes each result as a file in one output directory.
///
/// Names are unique per sink: a second `photo.jpg` lands as `photo (1).jpg`. A file left
/// over from an earlier run is overwritten.
pub struct DirSink {
    out_dir: PathBuf,
    /// Lowercased names already written, so case-insensitive filesystems don't collide either.
    taken: Mutex<HashSet<String>>,
}

impl DirSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), taken: Mutex::new(HashSet::new()) }
    }

    fn claim_name(&self, name: &str) -> String {
        let mut taken = self.taken.lock().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = name.to_string();
        let mut n = 0;
        while taken.contains(&candidate.to_lowercase()) {
            n += 1;
            candidate = numbered(name, n);
        }
        taken.insert(candidate.to_lowercase());
        candidate
    }
}

#[async_trait]
impl ResultSink for DirSink {
    async fn deliver(&self, result: &ConversionResult) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("create out_dir {}", self.out_dir.display()))?;

        let name = self.claim_name(&safe_file_name(&result.name));
        let target = self.out_dir.join(name);
        let partial = target.with_extension("partial");

        let mut f = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("open {:?}", partial))?;
        f.write_all(&result.data).await?;
        f.flush().await?;
        drop(f);

        if tokio::fs::metadata(&target).await.is_ok() {
            let _ = tokio::fs::remove_file(&target).await;
        }
        tokio::fs::rename(&partial, &target).await?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn writes_result_under_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirSink::new(dir.path().join("nested"));
        let result = ConversionResult {
            source_index: 0,
            name: "a/b.jpg".to_string(),
            data: Bytes::from_static(b"jpeg bytes"),
        };

        let path = sink.deliver(&result).await.unwrap();

        assert_eq!(path, dir.path().join("nested").join("ab.jpg"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg bytes");
        assert!(!path.with_extension("partial").exists());
    }

    #[tokio::test]
    async fn a_later_run_overwrites_its_earlier_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = ConversionResult {
            source_index: 0,
            name: "x.png".to_string(),
            data: Bytes::from_static(b"old"),
        };
        DirSink::new(dir.path()).deliver(&result).await.unwrap();
        result.data = Bytes::from_static(b"new");

        let path = DirSink::new(dir.path()).deliver(&result).await.unwrap();
        assert_eq!(path, dir.path().join("x.png"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn same_named_results_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirSink::new(dir.path());
        let named = |name: &str, data: &'static [u8]| ConversionResult {
            source_index: 0,
            name: name.to_string(),
            data: Bytes::from_static(data),
        };

        let a = sink.deliver(&named("photo.jpg", b"from png")).await.unwrap();
        let b = sink.deliver(&named("photo.jpg", b"from gif")).await.unwrap();
        let c = sink.deliver(&named("PHOTO.jpg", b"upper")).await.unwrap();

        assert_eq!(a, dir.path().join("photo.jpg"));
        assert_eq!(b, dir.path().join("photo (1).jpg"));
        assert_eq!(c, dir.path().join("PHOTO (2).jpg"));
        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"from png");
        assert_eq!(tokio::fs::read(&b).await.unwrap(), b"from gif");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }
}
