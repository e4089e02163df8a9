//! Risk classification of suggested shell commands.

/// How dangerous a command looks.
///
/// Ordered so that the higher tier wins when several rules match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskTier {
    None,
    /// Uses a privilege-elevating command such as `sudo`
    Sudo,
    /// Matches a known destructive pattern
    Destructive,
}

impl RiskTier {
    /// Sensitive commands need an explicit `yes`, even in batch mode.
    pub fn is_sensitive(self) -> bool {
        self != RiskTier::None
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::None => write!(f, "none"),
            RiskTier::Sudo => write!(f, "sudo"),
            RiskTier::Destructive => write!(f, "destructive"),
        }
    }
}

/// A shell command proposed by the model, with its assessed risk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedCommand {
    pub raw: String,
    pub risk: RiskTier,
    pub warnings: Vec<String>,
}

impl SuggestedCommand {
    pub fn is_sensitive(&self) -> bool {
        self.risk.is_sensitive()
    }
}

/// Substrings (matched case-insensitively) that mark a command destructive.
const DESTRUCTIVE_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf", "recursively force-deletes files"),
    ("rm -fr", "recursively force-deletes files"),
    ("dd if=", "copies raw data and can overwrite disks"),
    ("mkfs", "formats a filesystem"),
    ("> /dev/", "writes directly to a device"),
    ("fork()", "looks like a fork bomb"),
    (":(){ :|:& }", "is a fork bomb"),
];

/// Device files that are harmless redirect targets
const HARMLESS_DEVICES: &[&str] = &["null", "stdout", "stderr", "tty"];

/// Whether `lower` (a lowercased command) contains `pattern`.
///
/// Redirects into harmless devices such as `/dev/null` do not count as
/// writing to a device.
fn matches_pattern(lower: &str, pattern: &str) -> bool {
    if pattern != "> /dev/" {
        return lower.contains(pattern);
    }
    lower.match_indices(pattern).any(|(i, m)| {
        let device = &lower[i + m.len()..];
        !HARMLESS_DEVICES.iter().any(|d| device.starts_with(d))
    })
}

/// Characters that separate shell words: whitespace, operators, grouping,
/// substitution and quotes.
const WORD_BREAKS: &[char] = &[
    ';', '|', '&', '(', ')', '{', '}', '`', '$', '<', '>', '"', '\'', '\\',
];

/// Every shell word of a command line, without any leading directory.
///
/// Words are taken from every position, not just the first of each simple
/// command, so elevation behind wrappers (`env sudo`, `xargs sudo`,
/// `VAR=1 sudo`), inside subshells and substitutions (`(sudo ..)`,
/// `$(sudo ..)`) and inside quoted `sh -c` strings is still seen.
fn words(command: &str) -> impl Iterator<Item = &str> {
    command
        .split(|c: char| c.is_whitespace() || WORD_BREAKS.contains(&c))
        .filter(|w| !w.is_empty())
        .map(|w| w.rsplit('/').next().unwrap_or(w))
}

/// Whether `command` overwrites a file with a plain `>` redirect.
fn has_overwrite_redirect(command: &str) -> bool {
    let bytes = command.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'>' {
            return false;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        if prev == b'>' || next == b'>' || next == b'&' {
            return false;
        }
        let target = command[i + 1..].trim_start();
        !target.is_empty() && !target.starts_with("/dev/")
    })
}

/// Assess a suggested command against the configured sensitive prefixes.
pub fn classify(command: &str, sensitive_prefixes: &[String]) -> SuggestedCommand {
    let raw = command.trim().to_string();
    let mut risk = RiskTier::None;
    let mut warnings = Vec::new();

    if let Some(prefix) = words(&raw).find(|w| sensitive_prefixes.iter().any(|s| s == w))
    {
        risk = risk.max(RiskTier::Sudo);
        warnings.push(format!("Runs with elevated privileges ({}).", prefix));
    }

    let lower = raw.to_lowercase();
    for (pattern, why) in DESTRUCTIVE_PATTERNS {
        if matches_pattern(&lower, pattern) {
            risk = risk.max(RiskTier::Destructive);
            warnings.push(format!("Destructive: `{}` {}.", pattern, why));
        }
    }

    if has_overwrite_redirect(&raw) && risk != RiskTier::Destructive {
        warnings.push("Redirects output with `>` and may overwrite a file.".to_string());
    }

    SuggestedCommand {
        raw,
        risk,
        warnings,
    }
}
