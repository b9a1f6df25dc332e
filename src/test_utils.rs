//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a single path segment (never `.` or `..`)
    pub fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_.-]{0,10}"
    }

    /// Generate an absolute virtual path with one to five segments
    pub fn virtual_path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..=5).prop_map(|parts| format!("/{}", parts.join("/")))
    }

    /// Generate a size unit suffix and its multiplier
    pub fn size_unit() -> impl Strategy<Value = (String, u64)> {
        prop_oneof![
            Just((String::new(), 1)),
            Just(("k".to_string(), 1024)),
            Just(("K".to_string(), 1024)),
            Just(("m".to_string(), 1024 * 1024)),
            Just(("M".to_string(), 1024 * 1024)),
            Just(("g".to_string(), 1024 * 1024 * 1024)),
            Just(("G".to_string(), 1024 * 1024 * 1024)),
        ]
    }

    /// Generate an environment variable name
    pub fn env_name() -> impl Strategy<Value = String> {
        "[A-Z_][A-Z0-9_]{0,15}"
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_virtual_path_generator(path in virtual_path()) {
            prop_assert!(path.starts_with('/'));
            prop_assert!(!path.contains("//"));
            prop_assert!(path.split('/').skip(1).all(|s| s != "." && s != ".."));
        }

        #[test]
        fn test_size_unit_generator((suffix, mul) in size_unit()) {
            prop_assert!(suffix.len() <= 1);
            prop_assert!(mul >= 1);
        }

        #[test]
        fn test_env_name_generator(name in env_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
        }
    }
}
