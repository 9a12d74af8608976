use crate::core::model::InputFile;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("unsupported file type ({})", .mime.as_deref().unwrap_or("unknown"))]
    Unsupported { mime: Option<String> },

    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },
}

/// Which files a tool is willing to take.
///
/// A file passes when it matches any MIME rule or any extension rule and is not
/// bigger than `max_bytes`. A policy with no MIME or extension rules accepts any type.
#[derive(Debug, Clone, Default)]
pub struct AcceptPolicy {
    pub mime_prefixes: Vec<String>,
    pub mime_exact: Vec<String>,
    pub extensions: Vec<String>,
    pub max_bytes: Option<u64>,
    /// Shown when nothing in an incoming set was accepted.
    pub hint: String,
}

impl AcceptPolicy {
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into(), ..Default::default() }
    }

    pub fn mime_prefix(mut self, prefix: &str) -> Self {
        self.mime_prefixes.push(prefix.to_ascii_lowercase());
        self
    }

    pub fn mime(mut self, mime: &str) -> Self {
        self.mime_exact.push(mime.to_ascii_lowercase());
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.extensions
            .extend(exts.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()));
        self
    }

    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    pub fn check(&self, file: &InputFile) -> Result<(), RejectReason> {
        if !self.type_matches(file.mime.as_deref(), &file.name) {
            return Err(RejectReason::Unsupported { mime: file.mime.clone() });
        }
        self.check_size(file.size())
    }

    /// The size rule on its own, usable before the file's bytes are read.
    pub fn check_size(&self, size: u64) -> Result<(), RejectReason> {
        match self.max_bytes {
            Some(max) if size > max => Err(RejectReason::TooLarge { size, max }),
            _ => Ok(()),
        }
    }

    fn type_matches(&self, mime: Option<&str>, name: &str) -> bool {
        if self.mime_prefixes.is_empty() && self.mime_exact.is_empty() && self.extensions.is_empty() {
            return true;
        }

        if let Some(m) = mime.map(str::to_ascii_lowercase) {
            if self.mime_exact.iter().any(|e| *e == m) {
                return true;
            }
            if self.mime_prefixes.iter().any(|p| m.starts_with(p.as_str())) {
                return true;
            }
        }

        match name.rsplit_once('.') {
            Some((base, ext)) if !base.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: Option<&str>, len: usize) -> InputFile {
        InputFile::new(name, mime.map(str::to_string), vec![0u8; len])
    }

    #[test]
    fn mime_prefix_accepts_family() {
        let p = AcceptPolicy::new("images only").mime_prefix("image/");
        assert!(p.check(&file("a.png", Some("image/png"), 4)).is_ok());
        assert!(p.check(&file("a.PNG", Some("IMAGE/PNG"), 4)).is_ok());
        assert_eq!(
            p.check(&file("a.txt", Some("text/plain"), 4)),
            Err(RejectReason::Unsupported { mime: Some("text/plain".into()) })
        );
        assert!(p.check(&file("noext", None, 4)).is_err());
    }

    #[test]
    fn extension_or_exact_mime() {
        let p = AcceptPolicy::new("pdf only").mime("application/pdf").extensions(&["pdf"]);
        assert!(p.check(&file("Report.PDF", None, 1)).is_ok());
        assert!(p.check(&file("blob", Some("application/pdf"), 1)).is_ok());
        assert!(p.check(&file(".pdf", None, 1)).is_err());
        assert!(p.check(&file("x.pdf.txt", Some("text/plain"), 1)).is_err());
    }

    #[test]
    fn size_bound_rejects_oversize() {
        let p = AcceptPolicy::new("video").mime_prefix("video/").max_bytes(10);
        assert!(p.check(&file("v.mp4", Some("video/mp4"), 10)).is_ok());
        assert_eq!(
            p.check(&file("v.mp4", Some("video/mp4"), 11)),
            Err(RejectReason::TooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn empty_policy_accepts_anything() {
        assert!(AcceptPolicy::new("").check(&file("x", None, 0)).is_ok());
    }
}
