use std::fmt;
use std::path::{Path, PathBuf};

/// A file acting as the document's front page. Detected purely by filename,
/// which is the convention the proposal folders follow.
pub fn is_cover_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".pdf") && lower.contains("cover")
}

/// Map a bare name from a manifest to an actual file in `dir`.
///
/// Tries, in order: exact match, the name with `.pdf` appended, and a
/// case-insensitive scan of the directory listing. Returns the on-disk
/// filename so later lookups use the real casing.
pub fn resolve_pdf_file(dir: &Path, name: &str) -> Option<String> {
    if dir.join(name).is_file() {
        return Some(name.to_string());
    }

    let with_pdf = if name.to_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{}.pdf", name)
    };
    if dir.join(&with_pdf).is_file() {
        return Some(with_pdf);
    }

    let wanted = with_pdf.to_lowercase();
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if !entry.path().is_file() {
            continue;
        }
        if let Some(file_name) = entry.file_name().to_str() {
            if file_name.to_lowercase() == wanted {
                return Some(file_name.to_string());
            }
        }
    }

    None
}

#[derive(Debug)]
pub enum ScanError {
    /// No manifest file (.md or .txt) exists in the directory.
    NoManifest,
    /// Directory mode found more than one file with "cover" in its name.
    MultipleCovers(Vec<String>),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NoManifest => {
                write!(f, "no manifest file (.md or .txt) found in directory")
            }
            ScanError::MultipleCovers(names) => {
                write!(
                    f,
                    "multiple cover files found ({}); keep a single file with 'cover' in its name",
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Locate the manifest in `dir`. Markdown files take precedence over txt.
/// With several candidates of the winning type the lexicographically first
/// one is used, so repeated runs pick the same file.
pub fn find_manifest_file(dir: &Path) -> Result<PathBuf, ScanError> {
    for ext in ["md", "txt"] {
        let mut candidates = files_with_extension(dir, ext);
        candidates.sort();
        if let Some(first) = candidates.into_iter().next() {
            return Ok(first);
        }
    }
    Err(ScanError::NoManifest)
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case(ext))
                    .unwrap_or(false)
        })
        .collect()
}

/// List the PDFs for directory mode: alphabetical, except that a cover file
/// is forced to the front. `exclude` filters out a previous combined output
/// so it is never merged into itself.
pub fn list_pdf_files(dir: &Path, exclude: &str) -> Result<Vec<String>, ScanError> {
    let mut names: Vec<String> = files_with_extension(dir, "pdf")
        .into_iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .filter(|n| n != exclude)
        .collect();
    names.sort();

    let covers: Vec<String> = names.iter().filter(|n| is_cover_file(n)).cloned().collect();
    if covers.len() > 1 {
        return Err(ScanError::MultipleCovers(covers));
    }
    if let Some(cover) = covers.into_iter().next() {
        names.retain(|n| *n != cover);
        names.insert(0, cover);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_cover_detection() {
        assert!(is_cover_file("Cover-intro.pdf"));
        assert!(is_cover_file("00-COVER.PDF"));
        assert!(!is_cover_file("cover.txt"));
        assert!(!is_cover_file("report.pdf"));
    }

    #[test]
    fn test_resolve_exact_and_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "intro.pdf");

        assert_eq!(
            resolve_pdf_file(tmp.path(), "intro.pdf"),
            Some("intro.pdf".to_string())
        );
        assert_eq!(
            resolve_pdf_file(tmp.path(), "intro"),
            Some("intro.pdf".to_string())
        );
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Final Report.PDF");

        assert_eq!(
            resolve_pdf_file(tmp.path(), "final report"),
            Some("Final Report.PDF".to_string())
        );
    }

    #[test]
    fn test_resolve_missing_is_none_and_idempotent() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");

        assert_eq!(resolve_pdf_file(tmp.path(), "b"), None);
        let first = resolve_pdf_file(tmp.path(), "A");
        let second = resolve_pdf_file(tmp.path(), "A");
        assert_eq!(first, second);
        assert_eq!(first, Some("a.pdf".to_string()));
    }

    #[test]
    fn test_manifest_markdown_precedence() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "files.txt");
        touch(tmp.path(), "book.md");

        let found = find_manifest_file(tmp.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "book.md");
    }

    #[test]
    fn test_manifest_deterministic_choice() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.md");
        touch(tmp.path(), "a.md");

        let found = find_manifest_file(tmp.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "a.md");
    }

    #[test]
    fn test_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            find_manifest_file(tmp.path()),
            Err(ScanError::NoManifest)
        ));
    }

    #[test]
    fn test_list_cover_first() {
        let tmp = TempDir::new().unwrap();
        for name in ["B.pdf", "A.pdf", "Cover-intro.pdf"] {
            touch(tmp.path(), name);
        }

        let names = list_pdf_files(tmp.path(), "00-Combined.pdf").unwrap();
        assert_eq!(names, vec!["Cover-intro.pdf", "A.pdf", "B.pdf"]);
    }

    #[test]
    fn test_list_multiple_covers_is_error() {
        let tmp = TempDir::new().unwrap();
        for name in ["cover-a.pdf", "Cover-b.pdf", "body.pdf"] {
            touch(tmp.path(), name);
        }

        assert!(matches!(
            list_pdf_files(tmp.path(), "00-Combined.pdf"),
            Err(ScanError::MultipleCovers(_))
        ));
    }

    #[test]
    fn test_list_excludes_previous_output() {
        let tmp = TempDir::new().unwrap();
        for name in ["00-Combined.pdf", "a.pdf"] {
            touch(tmp.path(), name);
        }

        let names = list_pdf_files(tmp.path(), "00-Combined.pdf").unwrap();
        assert_eq!(names, vec!["a.pdf"]);
    }
}
