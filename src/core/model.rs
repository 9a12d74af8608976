use crate::core::accept::AcceptPolicy;
use crate::core::error::WorkflowError;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub type BatchId = Uuid;
pub type ItemId = Uuid;

/// Default pause between two deliveries of a bulk download.
pub const DEFAULT_DELIVERY_DELAY_MS: u64 = 300;
/// Default upper bound for video inputs (500 MiB).
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct InputFile {
    pub id: ItemId,
    pub name: String,
    pub mime: Option<String>,
    pub data: Bytes,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime,
            data: data.into(),
        }
    }

    /// Reads a file from disk; the MIME type is guessed from its extension.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .with_context(|| format!("no file name in {}", path.display()))?;
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());

        Ok(Self::new(name, mime, data))
    }

    /// Like [`load`](Self::load), but a file over the policy's size limit is refused from its
    /// metadata and never read.
    pub async fn load_checked(path: &Path, policy: &AcceptPolicy) -> anyhow::Result<Self> {
        use anyhow::Context;

        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        if let Err(reason) = policy.check_size(meta.len()) {
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            return Err(WorkflowError::RejectedInput { name, reason }.into());
        }
        Self::load(path).await
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// JPEG-style quality as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    /// Maps a 1..=100 slider value to 0.01..=1.0.
    pub fn from_percent(percent: u8) -> Self {
        Self(f32::from(percent.clamp(1, 100)) / 100.0)
    }

    /// Quality as an encoder percentage in 1..=100.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i64 {
        match self {
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = anyhow::Error;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => anyhow::bail!("rotation must be 90, 180 or 270 (got {})", other),
        }
    }
}

/// Options for one batch run. Cloned at batch start and never re-read mid-run.
#[derive(Debug, Clone, Default)]
pub struct ConversionConfig {
    pub format: Option<String>,
    pub quality: Option<Quality>,
    pub rotate: Option<Rotation>,
    pub scale: Option<f32>,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("scale must be a positive number (got {0})")]
pub struct BadScale(pub f32);

impl ConversionConfig {
    /// `scale`, if set, after checking it is finite and positive.
    pub fn checked_scale(&self) -> Result<Option<f32>, BadScale> {
        match self.scale {
            Some(s) if !(s.is_finite() && s > 0.0) => Err(BadScale(s)),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowLimits {
    pub delivery_delay: Duration,
    pub max_video_bytes: u64,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            delivery_delay: Duration::from_millis(DEFAULT_DELIVERY_DELAY_MS),
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
        }
    }
}

/// What a transform hands back for one input.
#[derive(Debug, Clone)]
pub enum TransformOutput {
    /// One blob; named by swapping the input's extension for `ext`.
    Single { data: Bytes, ext: String },
    /// One blob with a name chosen by the transform.
    Renamed { data: Bytes, name: String },
    /// One blob per page, named `<base>-page-<n>.<ext>`.
    Pages { pages: Vec<Bytes>, ext: String },
}

impl TransformOutput {
    pub fn total_size(&self) -> u64 {
        match self {
            Self::Single { data, .. } | Self::Renamed { data, .. } => data.len() as u64,
            Self::Pages { pages, .. } => pages.iter().map(|p| p.len() as u64).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub source_index: usize,
    pub name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Waiting,
    Processing,
    Done { size_bytes: u64, saved_percent: Option<u8> },
    Failed { reason: String },
}

impl ItemStatus {
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
}

/// `round((1 - out/in) * 100)`, only when the output actually shrank.
pub fn saved_percent(input_size: u64, output_size: u64) -> Option<u8> {
    if input_size == 0 {
        return None;
    }
    let saved = ((1.0 - output_size as f64 / input_size as f64) * 100.0).round();
    if saved > 0.0 { Some(saved.min(100.0) as u8) } else { None }
}
