//! Column-to-destination resolution.
//!
//! A [`BindingPlan`] is built in three passes over the unclaimed columns:
//! name resolution for record fields and named scalars, positional binding
//! for bare scalars, and map absorption for whatever is left. No value is
//! written until the whole plan has been built.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::catalog::ColumnCatalog;
use crate::error::{Result, RowbindError};

use super::destination::DestinationTree;
use super::options::BindOptions;

/// Where one column's value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Leaf `leaf` of named group `group`.
    Field { group: usize, leaf: usize },
    /// The `n`th bare scalar of the call.
    Positional(usize),
    /// The map destination.
    Map,
    /// No destination; only when unclaimed columns are ignored.
    Discarded,
}

/// Per-call association of every column with its destination.
///
/// The plan doubles as the claim set: a column is claimed once it has an
/// assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    assignments: Vec<Option<Assignment>>,
}

impl BindingPlan {
    fn new(columns: usize) -> Self {
        BindingPlan {
            assignments: vec![None; columns],
        }
    }

    /// Builds the plan for a classified destination tree.
    pub(crate) fn build(
        catalog: &ColumnCatalog,
        tree: &DestinationTree<'_>,
        options: &BindOptions,
    ) -> Result<Self> {
        let mut plan = BindingPlan::new(catalog.len());
        plan.resolve_names(catalog, tree, options)?;
        plan.bind_positional(tree, options)?;
        plan.absorb_into_map(catalog, tree)?;
        debug!(
            "Binding plan: {} by name, {} positional, {} into map, {} discarded",
            plan.count(|a| matches!(a, Assignment::Field { .. })),
            plan.count(|a| matches!(a, Assignment::Positional(_))),
            plan.count(|a| matches!(a, Assignment::Map)),
            plan.count(|a| matches!(a, Assignment::Discarded)),
        );
        Ok(plan)
    }

    fn resolve_names(
        &mut self,
        catalog: &ColumnCatalog,
        tree: &DestinationTree<'_>,
        options: &BindOptions,
    ) -> Result<()> {
        let matching = options.name_matching;
        let by_name: HashMap<String, Vec<usize>> = catalog.index_by(|name| matching.key(name));

        for (g, group) in tree.groups.iter().enumerate() {
            for (l, flat) in group.leaves.iter().enumerate() {
                let candidates = by_name.get(&flat.key).map(Vec::as_slice).unwrap_or_default();
                if candidates.is_empty() {
                    if flat.leaf.is_required() {
                        return Err(RowbindError::UnmatchedField {
                            field: flat.path.clone(),
                            destination: group.label.clone(),
                        });
                    }
                    continue;
                }
                match candidates.iter().find(|&&c| !self.is_claimed(c)) {
                    Some(&column) => {
                        self.assignments[column] = Some(Assignment::Field { group: g, leaf: l });
                    }
                    None => {
                        let column = catalog
                            .get(candidates[0])
                            .map(|c| c.name.clone())
                            .unwrap_or_default();
                        return Err(RowbindError::DuplicateFieldClaim {
                            field: flat.path.clone(),
                            column,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn bind_positional(
        &mut self,
        tree: &DestinationTree<'_>,
        options: &BindOptions,
    ) -> Result<()> {
        let unclaimed = self.unclaimed();
        let scalars = tree.positional.len();
        let absorbs_surplus = tree.map.is_some() || options.ignore_unclaimed_columns;
        if scalars > unclaimed.len() || (scalars < unclaimed.len() && !absorbs_surplus) {
            return Err(RowbindError::Cardinality {
                scalars,
                columns: unclaimed.len(),
            });
        }
        for (n, column) in unclaimed.into_iter().take(scalars).enumerate() {
            self.assignments[column] = Some(Assignment::Positional(n));
        }
        Ok(())
    }

    fn absorb_into_map(
        &mut self,
        catalog: &ColumnCatalog,
        tree: &DestinationTree<'_>,
    ) -> Result<()> {
        if tree.map.is_none() {
            for column in self.unclaimed() {
                self.assignments[column] = Some(Assignment::Discarded);
            }
            return Ok(());
        }

        // Map keys are exact column names; two absorbed columns must not share one.
        let mut keys: HashSet<&str> = HashSet::new();
        for column in self.unclaimed() {
            let name = catalog.get(column).map_or("", |c| c.name.as_str());
            if !keys.insert(name) {
                return Err(RowbindError::DuplicateFieldClaim {
                    field: "map".to_string(),
                    column: name.to_string(),
                });
            }
            self.assignments[column] = Some(Assignment::Map);
        }
        Ok(())
    }

    /// Returns true if the column has been assigned.
    #[must_use]
    pub fn is_claimed(&self, column: usize) -> bool {
        matches!(self.assignments.get(column), Some(Some(_)))
    }

    /// Returns unclaimed column indices in ascending order.
    #[must_use]
    pub fn unclaimed(&self) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Gets the assignment of a column.
    #[must_use]
    pub fn assignment(&self, column: usize) -> Option<Assignment> {
        self.assignments.get(column).copied().flatten()
    }

    /// Returns `(column, assignment)` pairs in ascending column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Assignment)> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|a| (i, a)))
    }

    fn count(&self, pred: impl Fn(&Assignment) -> bool) -> usize {
        self.assignments.iter().flatten().filter(|a| pred(a)).count()
    }
}
