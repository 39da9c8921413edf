//! ID and timestamp helpers.
//!
//! IDs are time-ordered UUID v7 values with an entity-specific prefix
//! so a bare ID string is self-describing in logs.

use uuid::Uuid;

/// Generate a prefixed UUID v7 ID, e.g. `vec-0190…`.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}

/// Current UTC timestamp as an ISO 8601 string.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_prefix() {
        let id = generate_id("vec");
        assert!(id.starts_with("vec-"));
    }

    #[test]
    fn ids_are_unique() {
        let a = generate_id("vec");
        let b = generate_id("vec");
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_time_ordered() {
        // UUID v7 sorts lexicographically by creation time.
        let ids: Vec<String> = (0..10).map(|_| generate_id("q")).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn timestamp_is_iso() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
    }
}
