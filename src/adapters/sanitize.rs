//! Log sanitization for biometric and key material.
//!
//! Applied to every formatted log line by [`SanitizingMakeWriter`]. Redacts:
//! - Email addresses
//! - Inline float arrays (embeddings, decrypted templates)
//! - Password / seal-secret assignments
//! - Long hex or base64 runs (context and ciphertext bytes)
//!
//! Types that hold sensitive data already redact themselves in `Debug`; this
//! is the fallback for anything that slips into a formatted string.
//!
//! # Performance
//!
//! `sanitize()` caps the input it scans (`FACECRYPT_SANITIZE_MAX_BYTES`,
//! default 16 KiB) and skips rewriting when a single `RegexSet` pass finds
//! nothing.

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static RULES: OnceLock<RedactionRules> = OnceLock::new();

const SANITIZE_MAX_BYTES_ENV: &str = "FACECRYPT_SANITIZE_MAX_BYTES";
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
    /// Matches for which this returns true are left as they are.
    keep: Option<fn(&str) -> bool>,
}

struct RedactionRules {
    set: RegexSet,
    rules: Vec<Rule>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var(SANITIZE_MAX_BYTES_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

/// Filesystem paths match the base64 alphabet. A run is treated as a path
/// when it is split by `/` into short segments with no `+`.
fn looks_like_path(run: &str) -> bool {
    run.contains('/')
        && !run.contains('+')
        && run.split('/').all(|segment| segment.len() <= 24)
}

fn rules() -> &'static RedactionRules {
    RULES.get_or_init(|| {
        // Order matters: contextual secrets before the generic blob rules.
        let table: [(&'static str, &'static str, Option<fn(&str) -> bool>); 5] = [
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
                None,
            ),
            (
                r"(?i)\b(?:password|passwd|seal[_-]?password|secret[_-]?context|secret)\b\s*[:=]\s*\S+",
                "[REDACTED-SECRET]",
                None,
            ),
            // Four or more comma-separated numbers inside brackets
            (
                r"\[\s*-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?(?:\s*,\s*-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?){3,}\s*,?\s*\]",
                "[REDACTED-EMBEDDING]",
                None,
            ),
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]", None),
            (
                r"[A-Za-z0-9+/]{44,}={0,2}",
                "[REDACTED-BLOB]",
                Some(looks_like_path),
            ),
        ];

        let set = RegexSet::new(table.iter().map(|(p, _, _)| *p)).expect("Valid regex set");
        let rules = table
            .into_iter()
            .map(|(pattern, replacement, keep)| Rule {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
                keep,
            })
            .collect();
        RedactionRules { set, rules }
    })
}

/// Redact sensitive patterns in `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let rules = rules();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in rules.set.matches(prefix).into_iter() {
        let rule = &rules.rules[idx];
        result = match rule.keep {
            None => rule.regex.replace_all(&result, rule.replacement).into_owned(),
            Some(keep) => rule
                .regex
                .replace_all(&result, |caps: &regex::Captures<'_>| {
                    if keep(&caps[0]) {
                        caps[0].to_string()
                    } else {
                        rule.replacement.to_string()
                    }
                })
                .into_owned(),
        };
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted line
/// before it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, raw: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(raw);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A huge line with no newline is flushed (and capped) rather than buffered forever.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sanitize_email() {
        let sanitized = sanitize("Enrolled alice (alice.smith@example.org)");
        assert!(sanitized.contains("[REDACTED-EMAIL]"));
        assert!(!sanitized.contains("example.org"));
        assert!(sanitized.contains("alice"));
    }

    #[test]
    fn test_sanitize_embedding() {
        let sanitized = sanitize("probe = [0.12, -0.5, 3.3e-2, 0.9, 0.1]");
        assert!(sanitized.contains("[REDACTED-EMBEDDING]"));
        assert!(!sanitized.contains("0.12"));
    }

    #[test]
    fn test_short_lists_are_kept() {
        let input = "steps [1, 2] done";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_sanitize_password() {
        let sanitized = sanitize("seal_password=hunter2hunter2");
        assert!(sanitized.contains("[REDACTED-SECRET]"));
        assert!(!sanitized.contains("hunter2"));
    }

    #[test]
    fn test_sanitize_key_material() {
        let sanitized = sanitize("id 0123456789abcdef0123456789abcdef0123");
        assert!(sanitized.contains("[REDACTED-KEY]"));

        let blob = "RkNUWAEBAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==";
        assert!(sanitize(blob).contains("[REDACTED-BLOB]"));
    }

    #[test]
    fn test_long_paths_survive() {
        let line = "opening user database /var/lib/facecrypt/production/users2024/archive/users.db";
        assert_eq!(sanitize(line), line);

        let slashed = "ctx q83v/+Zk1Lr9Tq0xWm4Y2b7N8sHcP5aJ0eUdFgK6iO3rTw==";
        assert!(sanitize(slashed).contains("[REDACTED-BLOB]"));
    }

    #[test]
    fn test_fingerprints_survive() {
        let input = "Generated CKKS context - fingerprint: 3fa2c1d09b7e4411";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("prefix ééééé suffix", 9);
        assert!(sanitized.ends_with(" [TRUNCATED]"));
    }

    #[test]
    fn test_writer_sanitizes_lines() {
        let mut out = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut out);
            writer.write_all(b"user bob@example.com ").expect("write");
            writer.write_all(b"enrolled\nsecond line").expect("write");
            writer.flush().expect("flush");
        }
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "user [REDACTED-EMAIL] enrolled\nsecond line");
    }
}
