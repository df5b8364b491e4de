//! Fingerprint normalization.
//!
//! The manager addresses keys by the trailing 16 hex characters of their
//! fingerprint. Callers may also hand in full 40-char fingerprints (with or
//! without spaces) or the 8-char short form, which only resolves through the
//! index's short-id map.

/// Length of the canonical fingerprint form.
pub const FP_LEN: usize = 16;

/// Length of the short form.
pub const SHORT_FP_LEN: usize = 8;

/// Outcome of normalizing caller-supplied fingerprint text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Normalized {
    /// Canonical 16-char form
    Long(String),
    /// 8-char form, needs an index lookup
    Short(String),
}

/// Uppercase, strip whitespace and an optional `0x` prefix, then cut to the
/// canonical form. Anything that is not hex or has an unusable length
/// yields `None`.
pub(crate) fn normalize(raw: &str) -> Option<Normalized> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match cleaned.len() {
        n if n > FP_LEN => Some(Normalized::Long(cleaned[n - FP_LEN..].to_string())),
        FP_LEN => Some(Normalized::Long(cleaned)),
        SHORT_FP_LEN => Some(Normalized::Short(cleaned)),
        _ => None,
    }
}

/// Trailing 16 characters of a full hex fingerprint.
pub(crate) fn long_form(full: &str) -> String {
    let upper = full.to_ascii_uppercase();
    if upper.len() > FP_LEN {
        upper[upper.len() - FP_LEN..].to_string()
    } else {
        upper
    }
}

/// Trailing 8 characters of a canonical fingerprint.
pub(crate) fn short_form(fp: &str) -> String {
    if fp.len() > SHORT_FP_LEN {
        fp[fp.len() - SHORT_FP_LEN..].to_string()
    } else {
        fp.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full() {
        let full = "A1B2 C3D4 E5F6 0718 293A  4B5C 6D7E 8F90 0016 A9CA 870A FA59";
        assert_eq!(
            normalize(full),
            Some(Normalized::Long("0016A9CA870AFA59".to_string()))
        );
    }

    #[test]
    fn test_normalize_long_and_short() {
        assert_eq!(
            normalize("0016a9ca870afa59"),
            Some(Normalized::Long("0016A9CA870AFA59".to_string()))
        );
        assert_eq!(
            normalize("0x870AFA59"),
            Some(Normalized::Short("870AFA59".to_string()))
        );
    }

    #[test]
    fn test_normalize_rejects() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("XYZ"), None);
        assert_eq!(normalize("0016A9CA870AFA5"), None); // 15 chars
        assert_eq!(normalize("870AFA5G"), None);
        assert_eq!(normalize("1234"), None);
    }

    #[test]
    fn test_normalize_is_idempotent_on_long_form() {
        for input in ["0016A9CA870AFA59", "ffffffffffffffffffffffffffffffffffffffff"] {
            let Some(Normalized::Long(once)) = normalize(input) else {
                panic!("expected long form for {input}");
            };
            assert_eq!(normalize(&once), Some(Normalized::Long(once.clone())));
        }
    }

    #[test]
    fn test_forms() {
        assert_eq!(
            long_form("a1b2c3d4e5f60718293a4b5c6d7e8f900016a9ca870afa59"),
            "0016A9CA870AFA59"
        );
        assert_eq!(short_form("0016A9CA870AFA59"), "870AFA59");
    }
}
