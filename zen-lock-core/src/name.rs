//! NameDeriver (C3) — spec.md §4.3.
//!
//! Deterministic, bounded-length, collision-resistant materialised-secret
//! name from (namespace, pod name).

use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 253;
const SUFFIX_HEX_LEN: usize = 16;
const FALLBACK_PREFIX: &str = "zl-";

/// Derive the materialised Secret name for a pod in `namespace`.
///
/// `prefix = "zl-inject-" + namespace + "-" + pod_name + "-"`, `suffix` =
/// first 16 hex chars of `SHA-256(prefix without the trailing dash)`. If
/// `prefix + suffix` exceeds 253 chars, the prefix is truncated to fit while
/// the full suffix is preserved; if even `"zl-"` plus the suffix wouldn't
/// fit the truncated prefix, only `"zl-" + suffix` is emitted.
pub fn derive_secret_name(namespace: &str, pod_name: &str) -> String {
    let prefix = format!("zl-inject-{}-{}-", namespace, pod_name);
    let hash_input = &prefix[..prefix.len() - 1];
    let suffix = hex_suffix(hash_input);

    let full = format!("{}{}", prefix, suffix);
    if full.len() <= MAX_NAME_LEN {
        return full;
    }

    let budget_for_prefix = MAX_NAME_LEN.saturating_sub(suffix.len());
    if budget_for_prefix < FALLBACK_PREFIX.len() {
        return format!("{}{}", FALLBACK_PREFIX, suffix);
    }

    let truncated_prefix = truncate_to_char_boundary(&prefix, budget_for_prefix);
    format!("{}{}", truncated_prefix, suffix)
}

fn hex_suffix(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = hex_encode(&digest);
    hex[..SUFFIX_HEX_LEN].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        assert_eq!(derive_secret_name("app", "web-0"), derive_secret_name("app", "web-0"));
    }

    #[test]
    fn distinct_for_distinct_inputs() {
        assert_ne!(derive_secret_name("app", "web-0"), derive_secret_name("app", "web-1"));
        assert_ne!(derive_secret_name("app", "web-0"), derive_secret_name("other", "web-0"));
    }

    #[test]
    fn always_within_253_chars() {
        let long_namespace = "n".repeat(200);
        let long_pod = "p".repeat(200);
        let name = derive_secret_name(&long_namespace, &long_pod);
        assert!(name.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn matches_spec_example_shape() {
        let name = derive_secret_name("app", "web-0");
        assert!(name.starts_with("zl-inject-app-web-0-"));
        let suffix = &name[name.len() - SUFFIX_HEX_LEN..];
        assert_eq!(suffix.len(), SUFFIX_HEX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn falls_back_to_zl_prefix_when_truncated_prefix_too_short() {
        let long_namespace = "n".repeat(300);
        let name = derive_secret_name(&long_namespace, "p");
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.starts_with(FALLBACK_PREFIX));
    }

    #[test]
    fn suffix_always_present_even_when_truncated() {
        let long_namespace = "n".repeat(260);
        let name = derive_secret_name(&long_namespace, "pod");
        let suffix = &name[name.len() - SUFFIX_HEX_LEN..];
        assert_eq!(suffix.len(), SUFFIX_HEX_LEN);
    }
}
