//! Output filename derivation. All helpers are pure and idempotent for a given input.

/// Strips the last dot-extension of `name` (if any) and appends `ext`.
///
/// A leading dot (`.bashrc`) or a trailing one (`file.`) does not count as an extension.
pub fn replace_extension(name: &str, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    format!("{}.{}", base_name(name), ext)
}

/// `name` without its last extension.
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => base,
        _ => name,
    }
}

pub fn prefixed(name: &str, prefix: &str) -> String {
    format!("{prefix}{name}")
}

/// `<base>-page-<n>.<ext>`, `n` is 1-based.
pub fn page_name(name: &str, page: usize, ext: &str) -> String {
    format!("{}-page-{}.{}", base_name(name), page, ext.trim_start_matches('.'))
}

/// `<base> (<n>).<ext>`, used to keep a second file with the same name apart.
pub fn numbered(name: &str, n: usize) -> String {
    let base = base_name(name);
    match name.strip_prefix(base).filter(|ext| !ext.is_empty()) {
        Some(ext) => format!("{} ({}){}", base, n, ext),
        None => format!("{} ({})", name, n),
    }
}

/// File extension for an image target given as a MIME type or a bare format name.
pub fn image_extension(format: &str) -> String {
    let f = format.trim().to_ascii_lowercase();
    let sub = f.strip_prefix("image/").unwrap_or(&f);
    match sub {
        "jpeg" | "jpg" | "pjpeg" => "jpg".to_string(),
        "tiff" | "tif" => "tiff".to_string(),
        other => other.to_string(),
    }
}

/// Makes a derived name safe to create on disk.
pub fn safe_file_name(name: &str) -> String {
    let s = sanitize_filename::sanitize(name);
    if s.is_empty() { "output.bin".to_string() } else { s }
}
