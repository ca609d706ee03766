//! Declarative [`Record`](crate::binder::Record) implementations.

/// Implements [`Record`](crate::binder::Record) for a struct.
///
/// Each entry is `value field`, `optional field` (for `Option<T>` fields)
/// or `embed field` (for a field whose type is itself a `Record`). Field
/// names match columns by their Rust name unless renamed with `as "column"`.
///
/// ```
/// use chrono::{DateTime, Utc};
///
/// #[derive(Default)]
/// struct Audit {
///     created: DateTime<Utc>,
///     updated: Option<DateTime<Utc>>,
/// }
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
///     audit: Audit,
/// }
///
/// rowbind::record!(Audit { value created, optional updated });
/// rowbind::record!(User { value id as "user_id", value name, optional email, embed audit });
/// ```
#[macro_export]
macro_rules! record {
    (@field $self:ident, value, $field:ident) => {
        $crate::binder::Field::value(stringify!($field), &mut $self.$field)
    };
    (@field $self:ident, value, $field:ident, $column:literal) => {
        $crate::binder::Field::value($column, &mut $self.$field)
    };
    (@field $self:ident, optional, $field:ident) => {
        $crate::binder::Field::optional(stringify!($field), &mut $self.$field)
    };
    (@field $self:ident, optional, $field:ident, $column:literal) => {
        $crate::binder::Field::optional($column, &mut $self.$field)
    };
    (@field $self:ident, embed, $field:ident) => {
        $crate::binder::Field::embed(&mut $self.$field)
    };
    ($ty:ty { $($kind:ident $field:ident $(as $column:literal)?),* $(,)? }) => {
        impl $crate::binder::Record for $ty {
            fn fields(&mut self) -> ::std::vec::Vec<$crate::binder::Field<'_>> {
                ::std::vec![$($crate::record!(@field self, $kind, $field $(, $column)?)),*]
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::binder::{Field, Record};

    #[derive(Default)]
    struct Inner {
        note: Option<String>,
    }

    #[derive(Default)]
    struct Outer {
        id: i64,
        label: String,
        inner: Inner,
    }

    crate::record!(Inner { optional note });
    crate::record!(Outer { value id, value label as "Title", embed inner });

    #[test]
    fn test_generated_fields() {
        let mut outer = Outer::default();
        let fields = outer.fields();
        assert_eq!(fields.len(), 3);
        match &fields[1] {
            Field::Leaf(leaf) => assert_eq!(leaf.name(), Some("Title")),
            Field::Embedded { .. } => panic!("expected a leaf"),
        }
        match &fields[2] {
            Field::Embedded { name, fields } => {
                assert_eq!(name, "Inner");
                assert_eq!(fields.len(), 1);
            }
            Field::Leaf(_) => panic!("expected an embedded record"),
        }
    }
}
