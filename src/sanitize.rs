//! Cleaning of model output before it is written to a file.
//!
//! Models asked for "only the file content" still wrap it in code fences,
//! prepend "Here's the modified file:", leave `<thinking>` blocks behind or
//! add a closing explanation. [`ArtifactStripper`] removes those artifacts.
//!
//! Cleaning looks at the file being replaced: markup the file already uses
//! (fenced code blocks, paragraphs opening with "This" or "Note") is content,
//! not an artifact.

use std::sync::LazyLock;

use regex::Regex;

/// Originals smaller than this are never rejected for shrinking
const SHRINK_CHECK_MIN_BYTES: usize = 200;

/// Turns a raw model reply into candidate file content.
pub trait Sanitizer {
    /// Clean `raw`, the reply to a request to rewrite `original`.
    fn clean(&self, raw: &str, original: &str) -> String;
}

/// Uses the reply exactly as received.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Sanitizer for Passthrough {
    fn clean(&self, raw: &str, _original: &str) -> String {
        raw.to_string()
    }
}

static THINKING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<(thinking|thoughts|reasoning|reflection|planning|analysis)>.*?</(thinking|thoughts|reasoning|reflection|planning|analysis)>",
    )
    .expect("Invalid regex")
});

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+#.-]*[ \t]*\n?(.*?)```").expect("Invalid regex"));

/// A single fence wrapping the whole reply
static OUTER_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[\w+#.-]*[ \t]*\n(.*)\n[ \t]*```\s*\z").expect("Invalid regex")
});

static FILE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*---(START|END) FILE---[ \t]*(\n|$)").expect("Invalid regex"));

static PREAMBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^(here's the .*?|here is the .*?|modified content|updated file|fixed version|edited content|the following.*?|below is.*?):[ \t]*\n+",
    )
    .expect("Invalid regex")
});

static LEADING_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*-{3,}[ \t]*\n").expect("Invalid regex"));

static TRAILING_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*-{3,}\s*\z").expect("Invalid regex"));

static TRAILING_NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n\n(This\s|The\s+above|I've\s|Note\s|Notice|Explanation:|Changes:)").expect("Invalid regex")
});

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid regex"));

/// Strips thinking blocks, code fences, file markers, explanation preambles
/// and trailing commentary.
///
/// When the original contains fenced blocks, only a fence around the whole
/// reply is removed. A paragraph opener the original also uses ("This ...")
/// never starts trailing commentary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStripper;

impl Sanitizer for ArtifactStripper {
    fn clean(&self, raw: &str, original: &str) -> String {
        let text = THINKING_RE.replace_all(raw, "");
        let text = if original.contains("```") {
            OUTER_FENCE_RE.replace(&text, "$1")
        } else {
            FENCE_RE.replace_all(&text, "$1")
        };
        let text = FILE_MARKER_RE.replace_all(&text, "");
        let text = PREAMBLE_RE.replace_all(&text, "");
        let text = LEADING_RULE_RE.replace(&text, "");
        let text = TRAILING_RULE_RE.replace(&text, "");

        let mut text = text.into_owned();
        let own_openers: Vec<String> = TRAILING_NOTE_RE
            .captures_iter(original)
            .map(|c| opener(&c[1]))
            .collect();
        let cut = TRAILING_NOTE_RE
            .captures_iter(&text)
            .find(|c| !own_openers.contains(&opener(&c[1])))
            .and_then(|c| c.get(0))
            .map(|m| m.start());
        if let Some(at) = cut {
            text.truncate(at);
        }

        BLANK_RUN_RE.replace_all(&text, "\n\n").trim().to_string()
    }
}

/// Normalized form of a commentary opener, e.g. `"the above"`.
fn opener(matched: &str) -> String {
    matched
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Check that cleaned content is plausible as a replacement for `original`.
///
/// Rejects empty output, and output that lost more than 90% of a
/// non-trivial original.
pub fn validate_content(original: &str, cleaned: &str) -> Result<(), String> {
    if cleaned.trim().is_empty() {
        return Err("the model returned no file content".to_string());
    }
    if original.len() >= SHRINK_CHECK_MIN_BYTES && cleaned.len() * 10 < original.len() {
        return Err(format!(
            "content shrank from {} to {} bytes; the reply looks truncated or over-cleaned",
            original.len(),
            cleaned.len()
        ));
    }
    Ok(())
}
