//! Storing uploaded files under a configured directory.

use std::io;
use std::path::Path;

use log::debug;
use rocket::{fs::TempFile, tokio::fs};
use unicode_normalization::UnicodeNormalization;

/// Names that refer to devices rather than files on Windows.
const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce an uploaded file's original name to a safe file name.
///
/// Accented characters are folded to ASCII (NFKD, then non-ASCII dropped),
/// path separators become spaces, runs of whitespace become a single `_`,
/// anything outside `[A-Za-z0-9._-]` is dropped, and leading/trailing `.` and
/// `_` are trimmed. A Windows device name gets a leading `_`. Returns `None`
/// if nothing usable is left.
pub fn secure_filename(raw: &str) -> Option<String> {
    let folded = raw.nfkd().filter(char::is_ascii).collect::<String>();
    let spaced = folded.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return None;
    }

    let stem = trimmed.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES.contains(&stem.to_ascii_uppercase().as_str()) {
        Some(format!("_{trimmed}"))
    } else {
        Some(trimmed.to_string())
    }
}

/// The name a temp file will be stored under, if it has a usable one.
pub fn upload_name(file: &TempFile<'_>) -> Option<String> {
    file.raw_name()
        .and_then(|name| secure_filename(name.dangerous_unsafe_unsanitized_raw().as_str()))
}

/// The file, if the client actually picked one. Browsers send an unnamed
/// part for a file input that was left blank; an empty file with a name counts.
pub fn provided<'a, 'r>(file: &'a mut Option<TempFile<'r>>) -> Option<&'a mut TempFile<'r>> {
    file.as_mut().filter(|file| upload_name(file).is_some())
}

/// Store the file in `dir` under its sanitised name, overwriting any file of
/// the same name. Returns the stored name, or `None` if the file has no usable name.
pub async fn save_upload(file: &mut TempFile<'_>, dir: &Path) -> io::Result<Option<String>> {
    let Some(name) = upload_name(file) else {
        return Ok(None);
    };
    fs::create_dir_all(dir).await?;
    let path = dir.join(&name);
    file.copy_to(&path).await?;
    debug!("Stored upload at {}", path.display());
    Ok(Some(name))
}

/// Like [`save_upload`], for an optional form field.
pub async fn save_optional(file: &mut Option<TempFile<'_>>, dir: &Path) -> io::Result<Option<String>> {
    match provided(file) {
        Some(file) => save_upload(file, dir).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_kept() {
        assert_eq!(secure_filename("ballot.png").as_deref(), Some("ballot.png"));
        assert_eq!(secure_filename("front-id_2.jpeg").as_deref(), Some("front-id_2.jpeg"));
    }

    #[test]
    fn path_components_cannot_escape() {
        assert_eq!(secure_filename("../../etc/passwd").as_deref(), Some("etc_passwd"));
        assert_eq!(secure_filename("C:\\Users\\me\\id.png").as_deref(), Some("C_Users_me_id.png"));
    }

    #[test]
    fn whitespace_and_symbols_are_normalised() {
        assert_eq!(secure_filename("my  id card.png").as_deref(), Some("my_id_card.png"));
        assert_eq!(secure_filename("hello$.png").as_deref(), Some("hello.png"));
    }

    #[test]
    fn accents_are_folded_to_ascii() {
        assert_eq!(secure_filename("héllo.png").as_deref(), Some("hello.png"));
        assert_eq!(secure_filename("Çağrı kimlik.jpg").as_deref(), Some("Cagr_kimlik.jpg"));
        assert_eq!(secure_filename("日本.png").as_deref(), Some("png"));
    }

    #[test]
    fn windows_device_names_are_prefixed() {
        assert_eq!(secure_filename("con.png").as_deref(), Some("_con.png"));
        assert_eq!(secure_filename("LPT1").as_deref(), Some("_LPT1"));
        assert_eq!(secure_filename("console.png").as_deref(), Some("console.png"));
    }

    #[test]
    fn unusable_names_are_rejected() {
        assert_eq!(secure_filename(""), None);
        assert_eq!(secure_filename("   "), None);
        assert_eq!(secure_filename("../.."), None);
        assert_eq!(secure_filename("$$$"), None);
    }
}
