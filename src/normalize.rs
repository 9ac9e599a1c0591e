//! Name normalization for cross-source matching.
//!
//! Both sides of the link pass through the same pure function before any
//! comparison, so the matcher only ever sees lowercase, trimmed names.

/// Normalize a display name into its matching form: trimmed and lowercased.
///
/// A null or whitespace-only name normalizes to the empty string, which the
/// resolver treats as unmatchable.
///
/// # Examples
///
/// ```
/// use druglink::normalize::normalize_name;
/// assert_eq!(normalize_name("  Aspirin "), "aspirin");
/// assert_eq!(normalize_name("   "), "");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
