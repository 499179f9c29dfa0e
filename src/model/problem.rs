//! The WCSP instance: a scope-keyed collection of cost functions.

use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::constraint::{Assignment, Constraint, Cost, VariableId};

/// The order-independent identity of a constraint scope: its variable
/// indices, sorted.
pub type ScopeKey = Vec<VariableId>;

/// Computes the [`ScopeKey`] for a scope in tuple-layout order.
pub fn scope_key(scope: &[VariableId]) -> ScopeKey {
    let mut key = scope.to_vec();
    key.sort_unstable();
    key
}

/// A weighted constraint satisfaction problem.
///
/// A `Wcsp` is created empty and real-valued, populated by repeated
/// [`insert`](Wcsp::insert) calls (which merge constraints sharing a scope),
/// integerized exactly once, then serialized and handed to the external
/// solver. It is not designed for structural mutation after integerization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wcsp {
    /// Opaque label, written as the first field of the serialized problem.
    pub name: String,
    /// One domain size per variable; variable `v` ranges over
    /// `0..domsizes[v]`.
    pub domsizes: Vec<usize>,
    /// `None` while costs are still real-valued; after integerization, the
    /// integer cost standing for infeasibility.
    pub top: Option<u64>,
    /// At most one constraint per distinct variable subset.
    pub constraints: OrdMap<ScopeKey, Constraint>,
}

impl Wcsp {
    pub fn new(name: impl Into<String>, domsizes: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            domsizes,
            top: None,
            constraints: OrdMap::new(),
        }
    }

    /// Inserts a constraint into the problem.
    ///
    /// The first constraint over a given variable subset is stored as-is.
    /// A later constraint over the same subset is merged into the stored
    /// one: independent cost factors combine by summing, with `Top`
    /// absorbing. The stored constraint's scope order stays authoritative.
    pub fn insert(&mut self, constraint: Constraint) -> Result<()> {
        let key = scope_key(&constraint.scope);
        if let Some(old) = self.constraints.get_mut(&key) {
            return merge(old, constraint, &self.domsizes);
        }
        self.constraints.insert(key, constraint);
        Ok(())
    }
}

/// Merges `incoming` into `old`, in place.
///
/// Both constraints must range over the same variable set; `old`'s scope
/// order wins. The incoming tuples are re-keyed into that order first.
fn merge(old: &mut Constraint, incoming: Constraint, domsizes: &[usize]) -> Result<()> {
    // Same scope key, so every variable of old's scope occurs in incoming's.
    let positions: Vec<usize> = old
        .scope
        .iter()
        .map(|v| incoming.scope.iter().position(|w| w == v).unwrap())
        .collect();
    let mut rekeyed = Constraint::new(old.scope.clone(), incoming.defcost);
    for (t, &cost) in &incoming.tuples {
        let reordered: Assignment = positions.iter().map(|&i| t[i]).collect();
        rekeyed.tuple(reordered, cost)?;
    }
    let incoming = rekeyed;

    for (t, &cost) in &incoming.tuples {
        match old.tuples.get(t).copied() {
            // Already maximally infeasible, nothing to add.
            Some(Cost::Top) => continue,
            None if old.defcost.is_top() => continue,
            Some(oldcost) => old.tuple(t.clone(), cost + oldcost)?,
            None => old.tuple(t.clone(), cost + old.defcost)?,
        }
    }

    // Tuples explicit in old but not in incoming pick up incoming's default
    // cost, and the defaults themselves combine. An already-Top default in
    // old leaves nothing to propagate into.
    if !incoming.defcost.is_zero() && !old.defcost.is_top() {
        let untouched: Vec<Assignment> = old
            .tuples
            .keys()
            .filter(|t| !incoming.tuples.contains_key(*t))
            .cloned()
            .collect();
        for t in untouched {
            let oldcost = old.tuples[&t];
            if !oldcost.is_top() {
                old.tuple(t, oldcost + incoming.defcost)?;
            }
        }
        old.defcost = old.defcost + incoming.defcost;
    }

    let full_size: usize = old
        .scope
        .iter()
        .map(|&v| domsizes[v as usize])
        .product();
    if old.tuples.len() == full_size {
        compress(old);
    }
    Ok(())
}

/// Replaces a fully enumerated constraint's most frequent cost by the
/// default cost and drops the corresponding tuples, keeping the stored size
/// proportional to the non-default mass of the cost function.
///
/// Ties on frequency go to the smaller cost value, with `Top` losing every
/// tie, so the result is deterministic.
fn compress(constraint: &mut Constraint) {
    let mut counts: Vec<(Cost, usize)> = Vec::new();
    for &cost in constraint.tuples.values() {
        match counts.iter_mut().find(|(c, _)| *c == cost) {
            Some((_, n)) => *n += 1,
            None => counts.push((cost, 1)),
        }
    }
    let mut best: Option<(Cost, usize)> = None;
    for &(cost, n) in &counts {
        best = match best {
            Some((bc, bn)) if n < bn || (n == bn && bc.lt(cost)) => Some((bc, bn)),
            _ => Some((cost, n)),
        };
    }
    // A fully enumerated constraint has at least one tuple.
    let default = best.map(|(c, _)| c).unwrap();
    constraint.defcost = default;
    constraint.tuples = constraint
        .tuples
        .iter()
        .filter(|(_, &c)| c != default)
        .map(|(t, &c)| (t.clone(), c))
        .collect();
}
