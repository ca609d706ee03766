//! Unit tests for rowbind.

use rowbind::binder::{conversion, Conversion, NameMatching, TargetKind, CONVERSIONS};
use rowbind::catalog::{ColumnCatalog, ColumnDescriptor};
use rowbind::types::{Value, ValueKind};
use rowbind::RowbindError;

// =============================================================================
// Error Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_argument_shape_display() {
        let err = RowbindError::ArgumentShape("second map".into());
        assert!(err.to_string().contains("Argument shape error"));
        assert!(err.to_string().contains("second map"));
    }

    #[test]
    fn test_unmatched_field_display() {
        let err = RowbindError::UnmatchedField {
            field: "User.age".into(),
            destination: "User".into(),
        };
        assert!(err.to_string().contains("User.age"));
    }

    #[test]
    fn test_cardinality_display() {
        let err = RowbindError::Cardinality {
            scalars: 3,
            columns: 5,
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_unsupported_conversion_display() {
        let err = RowbindError::UnsupportedConversion {
            column: "flag".into(),
            source_kind: "TEXT".into(),
            target: "bool".into(),
        };
        assert!(err.to_string().contains("TEXT"));
        assert!(err.to_string().contains("bool"));
        assert!(err.to_string().contains("flag"));
    }

    #[test]
    fn test_driver_error_display() {
        let err = RowbindError::Driver("connection reset".into());
        assert!(err.to_string().contains("Driver error"));
    }
}

// =============================================================================
// Types Tests
// =============================================================================

mod types_tests {
    use super::*;

    #[test]
    fn test_value_kind_names() {
        assert_eq!(ValueKind::Integer.name(), "INTEGER");
        assert_eq!(ValueKind::Timestamp.to_string(), "TIMESTAMP");
    }

    #[test]
    fn test_value_integer() {
        let value = Value::Integer(42);
        assert_eq!(value.as_integer(), Some(42));
        assert!(!value.is_null());
    }

    #[test]
    fn test_value_null() {
        let value = Value::Null;
        assert!(value.is_null());
        assert_eq!(value.kind(), ValueKind::Null);
        assert_eq!(value.as_text(), None);
    }

    #[test]
    fn test_value_serde_round_trip() {
        use chrono::{TimeZone, Utc};

        let values = vec![
            Value::Null,
            Value::Integer(-3),
            Value::Bytes(vec![0, 255]),
            Value::Text("a".into()),
            Value::Timestamp(Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_value_from_primitives() {
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from(None::<String>), Value::Null);
    }
}

// =============================================================================
// Catalog Tests
// =============================================================================

mod catalog_tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let col = ColumnDescriptor::new("id", "BIGINT");
        assert!(col.nullable);
        assert_eq!(col.source_type, "BIGINT");
    }

    #[test]
    fn test_catalog_reassigns_indices() {
        let mut first = ColumnDescriptor::new("a", "");
        first.index = 9;
        let catalog = ColumnCatalog::new(vec![first, ColumnDescriptor::new("b", "")]).unwrap();
        let indices: Vec<usize> = catalog.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_catalog_serde_round_trip() {
        let catalog = ColumnCatalog::new(vec![
            ColumnDescriptor::new("id", "BIGINT").with_nullable(false),
            ColumnDescriptor::new("email", "VARCHAR"),
        ])
        .unwrap();
        let json = serde_json::to_string(&catalog).unwrap();
        let back: ColumnCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names(), catalog.names());
        assert!(!back.get(0).unwrap().nullable);
        assert_eq!(back.get(1).unwrap().source_type, "VARCHAR");
    }

    #[test]
    fn test_catalog_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ColumnCatalog>();
    }
}

// =============================================================================
// Conversion Table Tests
// =============================================================================

mod conversion_tests {
    use super::*;

    #[test]
    fn test_null_has_no_conversions() {
        assert!(CONVERSIONS.iter().all(|(s, _, _)| *s != ValueKind::Null));
    }

    #[test]
    fn test_every_non_null_kind_reaches_any() {
        for kind in [
            ValueKind::Integer,
            ValueKind::Float,
            ValueKind::Boolean,
            ValueKind::Bytes,
            ValueKind::Text,
            ValueKind::Timestamp,
        ] {
            assert_eq!(conversion(kind, TargetKind::Any), Some(Conversion::Dynamic));
        }
    }

    #[test]
    fn test_integer_reaches_every_width() {
        for target in [
            TargetKind::I8,
            TargetKind::I16,
            TargetKind::I32,
            TargetKind::I64,
            TargetKind::U8,
            TargetKind::U16,
            TargetKind::U32,
            TargetKind::U64,
        ] {
            assert_eq!(conversion(ValueKind::Integer, target), Some(Conversion::Integer));
            assert!(target.integer_bounds().is_some());
        }
    }

    #[test]
    fn test_unlisted_pairs() {
        assert_eq!(conversion(ValueKind::Float, TargetKind::I64), None);
        assert_eq!(conversion(ValueKind::Boolean, TargetKind::Text), None);
        assert_eq!(conversion(ValueKind::Text, TargetKind::Timestamp), None);
    }

    #[test]
    fn test_name_matching_default() {
        assert_eq!(NameMatching::default(), NameMatching::CaseInsensitive);
    }
}
