//! Error types shared across the zen-lock workspace.
//!
//! Mirrors `citadel-keystore`'s layering: a flat top-level enum per concern,
//! `thiserror` derives instead of hand-rolled `Display` impls (this crate is
//! `std`-only, unlike the `no_std`-capable `zen-lock-cipher`).

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Validation failures from `ValidateInjectAnnotation` / `ValidateMountPath`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("inject annotation is empty")]
    EmptyAnnotation,
    #[error("inject annotation exceeds 253 characters")]
    AnnotationTooLong,
    #[error("inject annotation is not a valid DNS-1123 subdomain")]
    AnnotationNotDns1123,
    #[error("mount path is empty")]
    EmptyMountPath,
    #[error("mount path exceeds 1024 characters")]
    MountPathTooLong,
    #[error("mount path is not absolute")]
    MountPathNotAbsolute,
    #[error("mount path is not in canonical form")]
    MountPathNotCanonical,
    #[error("mount path `{0}` is within a reserved system directory")]
    MountPathReserved(String),
}

/// The machine-readable category of a sanitised error, matching the
/// taxonomy in spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeKind {
    Configuration,
    Request,
    Authorisation,
    Cryptographic,
    Store,
    Internal,
}

impl fmt::Display for SanitizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Request => "request",
            Self::Authorisation => "authorisation",
            Self::Cryptographic => "cryptographic",
            Self::Store => "store",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A sanitised error wrapper: preserves a machine-readable `kind` and a
/// `context` dictionary, but renders only a redacted version of the
/// underlying cause — never the raw cause string (spec.md §9 "Error context
/// wrapping").
///
/// Grounded on `citadel-keystore`'s `GenerateError(pub KeystoreError)`-style
/// per-operation wrappers, generalised here into one reusable struct since
/// every zen-lock error path needs the same tag+context+redaction shape
/// rather than one wrapper type per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedError {
    pub kind: SanitizeKind,
    pub op_label: String,
    pub context: BTreeMap<String, String>,
    redacted_cause: String,
}

impl SanitizedError {
    pub fn new(
        kind: SanitizeKind,
        op_label: impl Into<String>,
        context: BTreeMap<String, String>,
        cause: &dyn fmt::Display,
    ) -> Self {
        Self {
            kind,
            op_label: op_label.into(),
            context,
            redacted_cause: redact(&cause.to_string()),
        }
    }
}

impl fmt::Display for SanitizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.op_label, self.kind, self.redacted_cause)?;
        if !self.context.is_empty() {
            write!(f, " [")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl std::error::Error for SanitizedError {}

/// Replace absolute paths, long base64-like runs, and IPv4 literals in `s`
/// with opaque placeholders. Hand-rolled rather than a `regex` dependency —
/// none of the example pack's production crates pull in `regex` for this
/// kind of small fixed-pattern scrub.
pub fn redact(s: &str) -> String {
    let s = redact_ipv4(s);
    let s = redact_absolute_paths(&s);
    redact_base64_runs(&s)
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '.')
}

fn redact_absolute_paths(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let at_boundary = i == 0 || !is_path_char(chars[i - 1]);
        if c == '/' && at_boundary {
            let start = i;
            let mut j = i;
            while j < chars.len() && is_path_char(chars[j]) {
                j += 1;
            }
            let run: String = chars[start..j].iter().collect();
            if run.len() > 1 {
                out.push_str("<path>");
            } else {
                out.push(c);
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='
}

fn redact_base64_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if is_base64_char(chars[i]) {
            let start = i;
            let mut j = i;
            while j < chars.len() && is_base64_char(chars[j]) {
                j += 1;
            }
            let len = j - start;
            if len >= 40 {
                out.push_str("<redacted>");
            } else {
                out.extend(&chars[start..j]);
            }
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn redact_ipv4(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if let Some((literal, consumed)) = try_match_ipv4(&bytes[i..]) {
            let _ = literal;
            out.push_str("<ip>");
            i += consumed;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

fn try_match_ipv4(chars: &[char]) -> Option<(String, usize)> {
    let mut octets = Vec::with_capacity(4);
    let mut pos = 0;
    for part in 0..4 {
        let start = pos;
        while pos < chars.len() && chars[pos].is_ascii_digit() && pos - start < 3 {
            pos += 1;
        }
        if pos == start {
            return None;
        }
        let digits: String = chars[start..pos].iter().collect();
        let value: u32 = digits.parse().ok()?;
        if value > 255 {
            return None;
        }
        octets.push(digits);
        if part < 3 {
            if pos >= chars.len() || chars[pos] != '.' {
                return None;
            }
            pos += 1;
        }
    }
    if pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        return None;
    }
    Some((octets.join("."), pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_absolute_path() {
        let out = redact("failed to read /etc/zen-lock/identity.key: permission denied");
        assert!(!out.contains("/etc/zen-lock"));
        assert!(out.contains("<path>"));
    }

    #[test]
    fn redacts_ipv4_literal() {
        let out = redact("connection to 10.0.0.17 refused");
        assert!(!out.contains("10.0.0.17"));
        assert!(out.contains("<ip>"));
    }

    #[test]
    fn redacts_long_base64_run() {
        let long_b64 = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVoxMjM0NTY3ODkw";
        assert!(long_b64.len() >= 40);
        let out = redact(&format!("ciphertext was {}", long_b64));
        assert!(!out.contains(long_b64));
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn leaves_short_tokens_alone() {
        let out = redact("bundle db-creds in namespace app");
        assert_eq!(out, "bundle db-creds in namespace app");
    }

    #[test]
    fn sanitized_error_never_renders_raw_cause() {
        let mut context = BTreeMap::new();
        context.insert("namespace".to_string(), "app".to_string());
        context.insert("bundle".to_string(), "db-creds".to_string());

        let cause = "decryption failed for /secrets/db-creds.yaml at 10.0.0.5";
        let err = SanitizedError::new(SanitizeKind::Cryptographic, "fetch bundle", context, &cause);

        let rendered = format!("{}", err);
        assert!(!rendered.contains("/secrets/db-creds.yaml"));
        assert!(!rendered.contains("10.0.0.5"));
        assert!(rendered.contains("fetch bundle"));
        assert!(rendered.contains("cryptographic"));
        assert!(rendered.contains("namespace=app"));
    }
}
