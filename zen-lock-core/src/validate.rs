//! Validator (C4) — spec.md §4.4.

use crate::error::ValidationError;

const MAX_ANNOTATION_LEN: usize = 253;
const MAX_MOUNT_PATH_LEN: usize = 1024;

const DENY_LIST: &[&str] = &["/", "/bin", "/sbin", "/usr", "/etc", "/var", "/sys", "/proc", "/dev"];

/// Validate the `zen-lock/inject` annotation value as a DNS-1123 subdomain.
pub fn validate_inject_annotation(s: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::EmptyAnnotation);
    }
    if s.len() > MAX_ANNOTATION_LEN {
        return Err(ValidationError::AnnotationTooLong);
    }
    if !is_dns1123_subdomain(s) {
        return Err(ValidationError::AnnotationNotDns1123);
    }
    Ok(())
}

fn is_dns1123_subdomain(s: &str) -> bool {
    s.split('.').all(is_dns1123_label) && !s.is_empty()
}

fn is_dns1123_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    let starts_alnum = bytes[0].is_ascii_lowercase() || bytes[0].is_ascii_digit();
    let ends_alnum = {
        let last = bytes[bytes.len() - 1];
        last.is_ascii_lowercase() || last.is_ascii_digit()
    };
    let body_valid = bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    starts_alnum && ends_alnum && body_valid
}

/// Validate a mount-path annotation: non-empty, bounded, absolute,
/// canonical, and outside the system-directory deny-list.
pub fn validate_mount_path(p: &str) -> Result<(), ValidationError> {
    if p.is_empty() {
        return Err(ValidationError::EmptyMountPath);
    }
    if p.len() > MAX_MOUNT_PATH_LEN {
        return Err(ValidationError::MountPathTooLong);
    }
    if !p.starts_with('/') {
        return Err(ValidationError::MountPathNotAbsolute);
    }
    let canonical = canonicalize(p);
    if canonical != p {
        return Err(ValidationError::MountPathNotCanonical);
    }
    for deny in DENY_LIST {
        if canonical == *deny || is_prefixed_by(&canonical, deny) {
            return Err(ValidationError::MountPathReserved(canonical));
        }
    }
    Ok(())
}

/// Collapse `.`/`..`/duplicate-slash segments the way a canonical absolute
/// path would be written; a path that doesn't already equal its canonical
/// form is rejected (no traversal, no collapsible segments allowed through).
fn canonicalize(p: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in p.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn is_prefixed_by(path: &str, dir: &str) -> bool {
    path.starts_with(dir) && path[dir.len()..].starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_annotation() {
        assert!(validate_inject_annotation("db-creds").is_ok());
    }

    #[test]
    fn rejects_empty_annotation() {
        assert_eq!(validate_inject_annotation(""), Err(ValidationError::EmptyAnnotation));
    }

    #[test]
    fn rejects_too_long_annotation() {
        let s = "a".repeat(254);
        assert_eq!(validate_inject_annotation(&s), Err(ValidationError::AnnotationTooLong));
    }

    #[test]
    fn rejects_uppercase_annotation() {
        assert_eq!(validate_inject_annotation("DB-Creds"), Err(ValidationError::AnnotationNotDns1123));
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert_eq!(validate_inject_annotation("-db-creds"), Err(ValidationError::AnnotationNotDns1123));
    }

    #[test]
    fn accepts_dotted_subdomain() {
        assert!(validate_inject_annotation("db.creds-01").is_ok());
    }

    #[test]
    fn accepts_default_mount_path() {
        assert!(validate_mount_path("/zen-lock/secrets").is_ok());
    }

    #[test]
    fn rejects_relative_mount_path() {
        assert_eq!(validate_mount_path("zen-lock/secrets"), Err(ValidationError::MountPathNotAbsolute));
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(
            validate_mount_path("/zen-lock/../etc/secrets"),
            Err(ValidationError::MountPathNotCanonical)
        );
    }

    #[test]
    fn rejects_double_slash() {
        assert_eq!(validate_mount_path("/zen-lock//secrets"), Err(ValidationError::MountPathNotCanonical));
    }

    #[test]
    fn rejects_deny_listed_roots() {
        for path in ["/", "/bin", "/etc", "/var", "/proc"] {
            assert!(validate_mount_path(path).is_err(), "expected {} to be rejected", path);
        }
    }

    #[test]
    fn rejects_nested_under_deny_listed_root() {
        assert!(validate_mount_path("/etc/zen-lock").is_err());
    }

    #[test]
    fn allows_similarly_prefixed_but_distinct_directory() {
        // "/etcetera" is not "/etc" or a child of it.
        assert!(validate_mount_path("/etcetera").is_ok());
    }

    #[test]
    fn rejects_too_long_mount_path() {
        let p = format!("/{}", "a".repeat(1024));
        assert_eq!(validate_mount_path(&p), Err(ValidationError::MountPathTooLong));
    }
}
