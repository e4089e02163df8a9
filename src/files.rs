//! File lookup, text reading, previews and atomic replacement.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Maximum number of "did you mean" suggestions
const MAX_SUGGESTIONS: usize = 5;

/// Resolve a user-supplied path to an existing file.
///
/// An exact match wins. Otherwise a file in the same directory whose name
/// matches case-insensitively is used. Failing both, the error carries the
/// names of similarly named files.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let wanted = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut candidates: Vec<String> = match fs::read_dir(&parent) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    candidates.sort();

    if let Some(found) = candidates.iter().find(|c| c.to_lowercase() == wanted) {
        let resolved = path.with_file_name(found);
        tracing::debug!(requested = %path.display(), resolved = %resolved.display(), "case-insensitive match");
        return Ok(resolved);
    }

    Err(Error::FileNotFound {
        path: path.to_path_buf(),
        suggestions: similar_names(&wanted, &candidates),
    })
}

/// Names from `candidates` that look like `wanted`.
fn similar_names(wanted: &str, candidates: &[String]) -> Vec<String> {
    if wanted.is_empty() {
        return Vec::new();
    }
    let wanted_stem = wanted.split('.').next().unwrap_or(wanted);
    candidates
        .iter()
        .filter(|c| {
            let lower = c.to_lowercase();
            let stem = lower.split('.').next().unwrap_or(&lower);
            lower.contains(wanted)
                || (!wanted_stem.is_empty() && lower.contains(wanted_stem))
                || (!stem.is_empty() && wanted.contains(stem))
                || edit_distance(&lower, wanted) <= 2
        })
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

/// Read a file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput(format!("{} is not a UTF-8 text file", path.display())))
}

/// A possibly truncated view of a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview<'a> {
    pub text: &'a str,
    pub truncated: bool,
}

/// Cut `content` to at most `max_bytes`, on a char boundary.
pub fn preview(content: &str, max_bytes: usize) -> Preview<'_> {
    if content.len() <= max_bytes {
        return Preview {
            text: content,
            truncated: false,
        };
    }
    let mut end = max_bytes;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    Preview {
        text: &content[..end],
        truncated: true,
    }
}

/// Summary shown before a file is analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub bytes: usize,
    pub lines: usize,
    pub language: &'static str,
}

impl FileInfo {
    pub fn new(path: &Path, content: &str) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            bytes: content.len(),
            lines: content.lines().count(),
            language: language_hint(path),
        }
    }
}

impl std::fmt::Display for FileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "File: {}\nSize: {} bytes\nLines: {}\nType: {}",
            self.name, self.bytes, self.lines, self.language
        )
    }
}

/// Best-effort language name from the file extension.
pub fn language_hint(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" | "cxx" => "cpp",
        "java" => "java",
        "rb" => "ruby",
        "sh" | "bash" | "zsh" => "shell",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        _ => "text",
    }
}

/// Replace `target` with `bytes` so readers see either the old or the new
/// content, never a mix.
///
/// The new content goes to a temp file in the same directory, is fsynced,
/// takes over the original permissions and is renamed over the target.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".kuzco-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(target) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }

    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
