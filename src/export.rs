//! Plain-text exports of the current result and the highlight notebook

use crate::error::{PanelError, PanelResult};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESULT_EXPORT_FILE: &str = "prompt-result.txt";
pub const HIGHLIGHTS_EXPORT_FILE: &str = "highlights.txt";

/// Write `text` (trimmed) to `dir/filename` as UTF-8.
///
/// `empty_message` is the user-facing error when there is nothing to
/// export; the file is not created in that case.
pub fn export_text(
    dir: &Path,
    filename: &str,
    text: &str,
    empty_message: &str,
) -> PanelResult<PathBuf> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PanelError::EmptyInput(empty_message.to_string()));
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, text)?;
    info!("💾 Exported {} bytes to {}", text.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_writes_trimmed_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_text(dir.path(), HIGHLIGHTS_EXPORT_FILE, "\n a\n\nb \n", "none").unwrap();
        assert_eq!(path.file_name().unwrap(), "highlights.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a\n\nb");
    }

    #[test]
    fn test_export_empty_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_text(dir.path(), RESULT_EXPORT_FILE, "   ", "No prompt result to export.")
            .unwrap_err();
        assert_eq!(err.to_string(), "No prompt result to export.");
        assert!(!dir.path().join(RESULT_EXPORT_FILE).exists());
    }
}
