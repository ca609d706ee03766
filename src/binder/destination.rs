//! Destination model and the classification pass.
//!
//! Callers describe where a row goes with [`Destination`] values. Before any
//! column is resolved, [`DestinationTree::classify`] sorts them into
//! positional scalars, named leaf groups (records and named scalars) and at
//! most one map, flattening embedded records on the way.

use std::collections::HashMap;

use log::trace;

use crate::error::{Result, RowbindError};
use crate::types::Value;

use super::coerce::{coerce, coerce_into, CoerceContext, CoerceError, Scannable, TargetKind};
use super::options::NameMatching;

/// Storage cell behind a leaf.
trait Target {
    fn kind(&self) -> TargetKind;
    fn is_nullable(&self) -> bool;
    fn assign(&mut self, value: &Value, ctx: &CoerceContext<'_>)
        -> std::result::Result<(), CoerceError>;
}

struct Cell<'a, S>(&'a mut S);

impl<S: Scannable> Target for Cell<'_, S> {
    fn kind(&self) -> TargetKind {
        S::KIND
    }

    fn is_nullable(&self) -> bool {
        S::from_null().is_some()
    }

    fn assign(
        &mut self,
        value: &Value,
        ctx: &CoerceContext<'_>,
    ) -> std::result::Result<(), CoerceError> {
        *self.0 = coerce_into(value, ctx)?;
        Ok(())
    }
}

/// Nullable-allocating cell: `None` for null, `Some` only after a successful coercion.
struct OptionalCell<'a, S>(&'a mut Option<S>);

impl<S: Scannable> Target for OptionalCell<'_, S> {
    fn kind(&self) -> TargetKind {
        S::KIND
    }

    fn is_nullable(&self) -> bool {
        true
    }

    fn assign(
        &mut self,
        value: &Value,
        ctx: &CoerceContext<'_>,
    ) -> std::result::Result<(), CoerceError> {
        if value.is_null() {
            *self.0 = None;
        } else {
            let pointee = S::from_coerced(coerce(value, S::KIND, ctx)?)?;
            *self.0 = Some(pointee);
        }
        Ok(())
    }
}

/// A single typed storage cell, optionally named.
pub struct Leaf<'a> {
    name: Option<String>,
    target: Box<dyn Target + 'a>,
    required: bool,
    timestamp_as_text: bool,
}

impl<'a> Leaf<'a> {
    /// Creates an unnamed leaf over a non-nullable cell.
    pub fn new<S: Scannable>(cell: &'a mut S) -> Self {
        Self::from_target(Box::new(Cell(cell)))
    }

    /// Creates an unnamed leaf over an `Option` that is filled only for non-null values.
    pub fn optional<S: Scannable>(cell: &'a mut Option<S>) -> Self {
        Self::from_target(Box::new(OptionalCell(cell)))
    }

    fn from_target(target: Box<dyn Target + 'a>) -> Self {
        Leaf {
            name: None,
            target,
            required: true,
            timestamp_as_text: false,
        }
    }

    /// Gives the leaf a name so it is resolved by column name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Formats timestamp columns as text when the cell is a text type.
    #[must_use]
    pub fn timestamp_as_text(mut self) -> Self {
        self.timestamp_as_text = true;
        self
    }

    /// Leaves the cell untouched when no column carries the leaf's name.
    #[must_use]
    pub fn skip_if_missing(mut self) -> Self {
        self.required = false;
        self
    }

    /// Returns the declared name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the static type of the cell.
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.target.kind()
    }

    /// Returns true if the cell can hold null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.target.is_nullable()
    }

    /// Returns true if an unmatched name fails the bind.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub(crate) fn write(
        &mut self,
        value: &Value,
        timestamp_format: Option<&str>,
    ) -> std::result::Result<(), CoerceError> {
        let ctx = CoerceContext {
            timestamp_as_text: self.timestamp_as_text,
            timestamp_format,
        };
        self.target.assign(value, &ctx)
    }
}

impl std::fmt::Debug for Leaf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leaf")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("nullable", &self.is_nullable())
            .field("required", &self.required)
            .finish()
    }
}

/// One field of a record: a named leaf or an embedded record.
#[derive(Debug)]
pub enum Field<'a> {
    /// Named leaf.
    Leaf(Leaf<'a>),
    /// Embedded record whose fields are promoted into the parent.
    Embedded {
        /// Name used in error paths.
        name: String,
        /// Fields of the embedded record.
        fields: Vec<Field<'a>>,
    },
}

impl<'a> Field<'a> {
    /// Named non-nullable field.
    pub fn value<S: Scannable>(name: impl Into<String>, cell: &'a mut S) -> Self {
        Field::Leaf(Leaf::new(cell).with_name(name))
    }

    /// Named nullable-allocating field.
    pub fn optional<S: Scannable>(name: impl Into<String>, cell: &'a mut Option<S>) -> Self {
        Field::Leaf(Leaf::optional(cell).with_name(name))
    }

    /// Embedded record, flattened into the enclosing record.
    pub fn embed<R: Record>(record: &'a mut R) -> Self {
        Field::Embedded {
            name: short_type_name::<R>().to_string(),
            fields: record.fields(),
        }
    }

    /// See [`Leaf::timestamp_as_text`]. No effect on embedded records.
    #[must_use]
    pub fn timestamp_as_text(self) -> Self {
        match self {
            Field::Leaf(leaf) => Field::Leaf(leaf.timestamp_as_text()),
            embedded @ Field::Embedded { .. } => embedded,
        }
    }

    /// See [`Leaf::skip_if_missing`]. No effect on embedded records.
    #[must_use]
    pub fn skip_if_missing(self) -> Self {
        match self {
            Field::Leaf(leaf) => Field::Leaf(leaf.skip_if_missing()),
            embedded @ Field::Embedded { .. } => embedded,
        }
    }
}

/// A composite destination that lists its fields.
///
/// Usually implemented with the [`record!`](crate::record) macro.
pub trait Record {
    /// Returns the fields in declaration order.
    fn fields(&mut self) -> Vec<Field<'_>>;
}

/// Named composite destination.
#[derive(Debug)]
pub struct RecordSlot<'a> {
    name: String,
    fields: Vec<Field<'a>>,
}

impl<'a> RecordSlot<'a> {
    /// Creates a record destination from an explicit field list.
    pub fn new(name: impl Into<String>, fields: Vec<Field<'a>>) -> Self {
        RecordSlot {
            name: name.into(),
            fields,
        }
    }

    /// Creates a record destination from a [`Record`] implementation.
    pub fn from_record<R: Record>(record: &'a mut R) -> Self {
        RecordSlot {
            name: short_type_name::<R>().to_string(),
            fields: record.fields(),
        }
    }

    /// Returns the record's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Receives entries for columns nobody else claimed.
trait MapSink {
    fn value_kind(&self) -> TargetKind;
    fn insert(
        &mut self,
        key: &str,
        value: &Value,
        ctx: &CoerceContext<'_>,
    ) -> std::result::Result<(), CoerceError>;
}

struct TypedMap<'a, S>(&'a mut HashMap<String, S>);

impl<S: Scannable> MapSink for TypedMap<'_, S> {
    fn value_kind(&self) -> TargetKind {
        S::KIND
    }

    fn insert(
        &mut self,
        key: &str,
        value: &Value,
        ctx: &CoerceContext<'_>,
    ) -> std::result::Result<(), CoerceError> {
        let v = coerce_into::<S>(value, ctx)?;
        self.0.insert(key.to_string(), v);
        Ok(())
    }
}

struct OptionalMap<'a, S>(&'a mut HashMap<String, Option<S>>);

impl<S: Scannable> MapSink for OptionalMap<'_, S> {
    fn value_kind(&self) -> TargetKind {
        S::KIND
    }

    fn insert(
        &mut self,
        key: &str,
        value: &Value,
        ctx: &CoerceContext<'_>,
    ) -> std::result::Result<(), CoerceError> {
        let v = if value.is_null() {
            None
        } else {
            Some(S::from_coerced(coerce(value, S::KIND, ctx)?)?)
        };
        self.0.insert(key.to_string(), v);
        Ok(())
    }
}

/// Name-keyed destination absorbing every column left over after
/// name resolution and positional binding.
pub struct MapSlot<'a> {
    sink: Box<dyn MapSink + 'a>,
    timestamp_as_text: bool,
}

impl<'a> MapSlot<'a> {
    /// Map whose values are coerced to `S`; use [`Value`] to keep them dynamic.
    pub fn new<S: Scannable>(map: &'a mut HashMap<String, S>) -> Self {
        MapSlot {
            sink: Box::new(TypedMap(map)),
            timestamp_as_text: false,
        }
    }

    /// Map whose values are `None` for null columns.
    pub fn optional<S: Scannable>(map: &'a mut HashMap<String, Option<S>>) -> Self {
        MapSlot {
            sink: Box::new(OptionalMap(map)),
            timestamp_as_text: false,
        }
    }

    /// Formats timestamp columns as text when the value type is text.
    #[must_use]
    pub fn timestamp_as_text(mut self) -> Self {
        self.timestamp_as_text = true;
        self
    }

    /// Returns the declared value type.
    #[must_use]
    pub fn value_kind(&self) -> TargetKind {
        self.sink.value_kind()
    }

    pub(crate) fn insert(
        &mut self,
        key: &str,
        value: &Value,
        timestamp_format: Option<&str>,
    ) -> std::result::Result<(), CoerceError> {
        let ctx = CoerceContext {
            timestamp_as_text: self.timestamp_as_text,
            timestamp_format,
        };
        self.sink.insert(key, value, &ctx)
    }
}

impl std::fmt::Debug for MapSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSlot")
            .field("value_kind", &self.value_kind())
            .finish()
    }
}

/// One destination argument of a bind call.
#[derive(Debug)]
pub enum Destination<'a> {
    /// Single cell; positional unless it carries a name.
    Scalar(Leaf<'a>),
    /// Map absorbing leftover columns.
    Map(MapSlot<'a>),
    /// Composite resolved by field name.
    Record(RecordSlot<'a>),
}

impl<'a> Destination<'a> {
    /// Positional non-nullable scalar.
    pub fn scalar<S: Scannable>(cell: &'a mut S) -> Self {
        Destination::Scalar(Leaf::new(cell))
    }

    /// Positional nullable-allocating scalar.
    pub fn optional<S: Scannable>(cell: &'a mut Option<S>) -> Self {
        Destination::Scalar(Leaf::optional(cell))
    }

    /// Scalar resolved by column name instead of position.
    pub fn named<S: Scannable>(name: impl Into<String>, cell: &'a mut S) -> Self {
        Destination::Scalar(Leaf::new(cell).with_name(name))
    }

    /// Map absorbing leftover columns.
    pub fn map<S: Scannable>(map: &'a mut HashMap<String, S>) -> Self {
        Destination::Map(MapSlot::new(map))
    }

    /// Record resolved by field name.
    pub fn record<R: Record>(record: &'a mut R) -> Self {
        Destination::Record(RecordSlot::from_record(record))
    }
}

impl<'a> From<Leaf<'a>> for Destination<'a> {
    fn from(leaf: Leaf<'a>) -> Self {
        Destination::Scalar(leaf)
    }
}

impl<'a> From<MapSlot<'a>> for Destination<'a> {
    fn from(map: MapSlot<'a>) -> Self {
        Destination::Map(map)
    }
}

impl<'a> From<RecordSlot<'a>> for Destination<'a> {
    fn from(record: RecordSlot<'a>) -> Self {
        Destination::Record(record)
    }
}

/// Leaf promoted into a group, with its path for diagnostics.
#[derive(Debug)]
pub(crate) struct FlatLeaf<'a> {
    pub(crate) path: String,
    pub(crate) key: String,
    pub(crate) leaf: Leaf<'a>,
}

/// Leaves resolved by name that belong to one destination argument.
#[derive(Debug)]
pub(crate) struct LeafGroup<'a> {
    pub(crate) label: String,
    pub(crate) leaves: Vec<FlatLeaf<'a>>,
}

/// Classified destinations of one bind call.
#[derive(Debug, Default)]
pub(crate) struct DestinationTree<'a> {
    pub(crate) groups: Vec<LeafGroup<'a>>,
    pub(crate) positional: Vec<Leaf<'a>>,
    pub(crate) map: Option<MapSlot<'a>>,
}

impl<'a> DestinationTree<'a> {
    /// Sorts destination arguments into positional scalars, named groups and the map.
    pub(crate) fn classify<I>(destinations: I, matching: NameMatching) -> Result<Self>
    where
        I: IntoIterator<Item = Destination<'a>>,
    {
        let mut tree = DestinationTree::default();
        for (position, destination) in destinations.into_iter().enumerate() {
            match destination {
                Destination::Scalar(leaf) => match leaf.name().map(str::to_string) {
                    None => tree.positional.push(leaf),
                    Some(name) if name.is_empty() => {
                        return Err(RowbindError::ArgumentShape(format!(
                            "Scalar argument {position} has an empty name"
                        )));
                    }
                    Some(path) => {
                        let key = matching.key(&path);
                        tree.groups.push(LeafGroup {
                            label: format!("argument {position}"),
                            leaves: vec![FlatLeaf { path, key, leaf }],
                        });
                    }
                },
                Destination::Map(map) => {
                    if tree.map.is_some() {
                        return Err(RowbindError::ArgumentShape(format!(
                            "Argument {position} is a second map destination; at most one is allowed"
                        )));
                    }
                    tree.map = Some(map);
                }
                Destination::Record(record) => {
                    let leaves = flatten(&record.name, record.fields, matching)?;
                    if leaves.is_empty() {
                        return Err(RowbindError::ArgumentShape(format!(
                            "Record '{}' has no fields",
                            record.name
                        )));
                    }
                    tree.groups.push(LeafGroup {
                        label: record.name,
                        leaves,
                    });
                }
            }
        }
        Ok(tree)
    }
}

/// Promotes embedded fields into one leaf list.
///
/// A name declared at a shallower depth shadows deeper ones; two leaves
/// with the same name at the shallowest depth are a shape error.
fn flatten<'a>(
    record: &str,
    fields: Vec<Field<'a>>,
    matching: NameMatching,
) -> Result<Vec<FlatLeaf<'a>>> {
    let mut entries = Vec::new();
    collect(record, fields, 0, matching, &mut entries)?;

    let mut shallowest: HashMap<&str, usize> = HashMap::new();
    for (depth, leaf) in &entries {
        let d = shallowest.entry(leaf.key.as_str()).or_insert(*depth);
        *d = (*d).min(*depth);
    }

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (depth, leaf) in &entries {
        if *depth != shallowest[leaf.key.as_str()] {
            continue;
        }
        if let Some(first) = seen.insert(leaf.key.as_str(), leaf.path.as_str()) {
            return Err(RowbindError::ArgumentShape(format!(
                "Fields '{first}' and '{}' collide in record '{record}'",
                leaf.path
            )));
        }
    }

    let keep: Vec<bool> = entries
        .iter()
        .map(|(depth, leaf)| *depth == shallowest[leaf.key.as_str()])
        .collect();
    Ok(entries
        .into_iter()
        .zip(keep)
        .filter_map(|((_, leaf), keep)| {
            if !keep {
                trace!("Field '{}' is shadowed by a shallower field", leaf.path);
            }
            keep.then_some(leaf)
        })
        .collect())
}

fn collect<'a>(
    prefix: &str,
    fields: Vec<Field<'a>>,
    depth: usize,
    matching: NameMatching,
    out: &mut Vec<(usize, FlatLeaf<'a>)>,
) -> Result<()> {
    for field in fields {
        match field {
            Field::Leaf(leaf) => {
                let name = leaf.name().unwrap_or_default();
                if name.is_empty() {
                    return Err(RowbindError::ArgumentShape(format!(
                        "Record '{prefix}' has a field without a name"
                    )));
                }
                let path = format!("{prefix}.{name}");
                let key = matching.key(name);
                out.push((depth, FlatLeaf { path, key, leaf }));
            }
            Field::Embedded { name, fields } => {
                collect(&format!("{prefix}.{name}"), fields, depth + 1, matching, out)?;
            }
        }
    }
    Ok(())
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audit {
        created: i64,
        updated: Option<i64>,
    }

    impl Record for Audit {
        fn fields(&mut self) -> Vec<Field<'_>> {
            vec![
                Field::value("created", &mut self.created),
                Field::optional("updated", &mut self.updated),
            ]
        }
    }

    struct User {
        id: i64,
        created: i64,
        audit: Audit,
    }

    impl Record for User {
        fn fields(&mut self) -> Vec<Field<'_>> {
            vec![
                Field::value("id", &mut self.id),
                Field::embed(&mut self.audit),
                Field::value("Created", &mut self.created),
            ]
        }
    }

    fn user() -> User {
        User {
            id: 0,
            created: 0,
            audit: Audit {
                created: 0,
                updated: None,
            },
        }
    }

    #[test]
    fn test_classify_sorts_arguments() {
        let (mut a, mut b) = (0i64, String::new());
        let mut m: HashMap<String, Value> = HashMap::new();
        let mut u = user();
        let tree = DestinationTree::classify(
            [
                Destination::scalar(&mut a),
                Destination::record(&mut u),
                Destination::map(&mut m),
                Destination::named("name", &mut b),
            ],
            NameMatching::CaseInsensitive,
        )
        .unwrap();
        assert_eq!(tree.positional.len(), 1);
        assert_eq!(tree.groups.len(), 2);
        assert_eq!(tree.groups[0].label, "User");
        assert_eq!(tree.groups[1].leaves[0].key, "name");
        assert!(tree.map.is_some());
    }

    #[test]
    fn test_flatten_shadows_deeper_field() {
        let mut u = user();
        let tree =
            DestinationTree::classify([Destination::record(&mut u)], NameMatching::CaseInsensitive)
                .unwrap();
        let paths: Vec<&str> = tree.groups[0].leaves.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["User.id", "User.Audit.updated", "User.Created"]);
    }

    #[test]
    fn test_sibling_collision_rejected() {
        let (mut a, mut b) = (0i64, 0i64);
        let record = RecordSlot::new(
            "Pair",
            vec![Field::value("id", &mut a), Field::value("ID", &mut b)],
        );
        let err =
            DestinationTree::classify([Destination::Record(record)], NameMatching::CaseInsensitive)
                .unwrap_err();
        assert!(matches!(err, RowbindError::ArgumentShape(msg) if msg.contains("collide")));
    }

    #[test]
    fn test_exact_matching_keeps_case_distinct() {
        let (mut a, mut b) = (0i64, 0i64);
        let record = RecordSlot::new(
            "Pair",
            vec![Field::value("id", &mut a), Field::value("ID", &mut b)],
        );
        let tree =
            DestinationTree::classify([Destination::Record(record)], NameMatching::Exact).unwrap();
        assert_eq!(tree.groups[0].leaves.len(), 2);
    }

    #[test]
    fn test_second_map_rejected() {
        let mut m1: HashMap<String, Value> = HashMap::new();
        let mut m2: HashMap<String, String> = HashMap::new();
        let err = DestinationTree::classify(
            [Destination::map(&mut m1), Destination::map(&mut m2)],
            NameMatching::CaseInsensitive,
        )
        .unwrap_err();
        assert!(matches!(err, RowbindError::ArgumentShape(_)));
    }

    #[test]
    fn test_empty_record_and_empty_name_rejected() {
        let empty = RecordSlot::new("Empty", Vec::new());
        assert!(DestinationTree::classify(
            [Destination::Record(empty)],
            NameMatching::CaseInsensitive
        )
        .is_err());

        let mut x = 0i32;
        assert!(DestinationTree::classify(
            [Destination::named("", &mut x)],
            NameMatching::CaseInsensitive
        )
        .is_err());
    }

    #[test]
    fn test_leaf_flags() {
        let mut s: Option<String> = None;
        let leaf = Leaf::optional(&mut s).timestamp_as_text().skip_if_missing();
        assert!(leaf.is_nullable());
        assert!(!leaf.is_required());
        assert_eq!(leaf.kind(), TargetKind::Text);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<User>(), "User");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }
}
