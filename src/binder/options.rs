//! Binder configuration.

use serde::{Deserialize, Serialize};

/// How record field names are compared with column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NameMatching {
    /// `Created` matches `created` and `CREATED`.
    #[default]
    CaseInsensitive,
    /// Byte-for-byte equality.
    Exact,
}

impl NameMatching {
    /// Returns the lookup key for a name under this matching mode.
    #[must_use]
    pub fn key(self, name: &str) -> String {
        match self {
            NameMatching::CaseInsensitive => name.to_lowercase(),
            NameMatching::Exact => name.to_string(),
        }
    }
}

/// Configuration for a [`Binder`](super::Binder).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BindOptions {
    /// Field-to-column name comparison.
    #[serde(default)]
    pub name_matching: NameMatching,
    /// strftime format for timestamps bound into text (RFC 3339 when unset).
    #[serde(default)]
    pub timestamp_format: Option<String>,
    /// Drop columns nobody claims instead of failing with a cardinality error.
    #[serde(default)]
    pub ignore_unclaimed_columns: bool,
}

impl BindOptions {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name matching mode.
    #[must_use]
    pub fn with_name_matching(mut self, name_matching: NameMatching) -> Self {
        self.name_matching = name_matching;
        self
    }

    /// Sets the timestamp text format.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    /// Allows rows to carry columns no destination asks for.
    #[must_use]
    pub fn with_ignore_unclaimed_columns(mut self, ignore: bool) -> Self {
        self.ignore_unclaimed_columns = ignore;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_key() {
        assert_eq!(NameMatching::CaseInsensitive.key("CreatedAt"), "createdat");
        assert_eq!(NameMatching::Exact.key("CreatedAt"), "CreatedAt");
    }

    #[test]
    fn test_builder() {
        let opts = BindOptions::new()
            .with_name_matching(NameMatching::Exact)
            .with_timestamp_format("%Y")
            .with_ignore_unclaimed_columns(true);
        assert_eq!(opts.name_matching, NameMatching::Exact);
        assert_eq!(opts.timestamp_format.as_deref(), Some("%Y"));
        assert!(opts.ignore_unclaimed_columns);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let options: BindOptions =
            serde_json::from_str(r#"{ "timestamp_format": "%Y-%m-%d" }"#).unwrap();
        assert_eq!(options.name_matching, NameMatching::CaseInsensitive);
        assert_eq!(options.timestamp_format.as_deref(), Some("%Y-%m-%d"));
        assert!(!options.ignore_unclaimed_columns);

        let empty: BindOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, BindOptions::default());
    }

    #[test]
    fn test_config_round_trip() {
        let options = BindOptions::new()
            .with_name_matching(NameMatching::Exact)
            .with_ignore_unclaimed_columns(true);
        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains(r#""name_matching":"Exact""#));
        let back: BindOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
