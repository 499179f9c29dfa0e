//! Cost functions over tuples of discrete variables.

use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WcspError};

pub type VariableId = u32;

/// The index of a value within a variable's domain.
pub type ValueIndex = usize;

/// One concrete value choice per variable in a constraint's scope, in scope
/// order.
pub type Assignment = Vec<ValueIndex>;

/// A single cost value.
///
/// Costs start out real-valued while the problem is assembled and become
/// integers once [`Wcsp::integerize`](crate::model::Wcsp::integerize) has
/// run. `Top` marks a globally forbidden assignment and is absorbing under
/// addition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cost {
    /// A finite non-negative real weight (modelling phase).
    Real(f64),
    /// A finite integer weight (after integerization).
    Int(u64),
    /// The infeasibility sentinel.
    Top,
}

impl Cost {
    pub fn is_top(self) -> bool {
        matches!(self, Cost::Top)
    }

    pub fn is_zero(self) -> bool {
        match self {
            Cost::Real(w) => w == 0.0,
            Cost::Int(n) => n == 0,
            Cost::Top => false,
        }
    }

    /// The numeric value of a finite cost, or `None` for `Top`.
    pub fn finite(self) -> Option<f64> {
        match self {
            Cost::Real(w) => Some(w),
            Cost::Int(n) => Some(n as f64),
            Cost::Top => None,
        }
    }

    /// The integer value of an integerized cost, or `None` otherwise.
    pub fn int(self) -> Option<u64> {
        match self {
            Cost::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Orders costs with `Top` greater than every finite value. Used as the
    /// deterministic tie-break during constraint compression.
    pub(crate) fn lt(self, other: Cost) -> bool {
        match (self, other) {
            (Cost::Top, _) => false,
            (_, Cost::Top) => true,
            (a, b) => a.finite() < b.finite(),
        }
    }
}

impl std::ops::Add for Cost {
    type Output = Cost;

    /// Sums two independent cost contributions. `Top` absorbs everything.
    fn add(self, other: Cost) -> Cost {
        match (self, other) {
            (Cost::Top, _) | (_, Cost::Top) => Cost::Top,
            (Cost::Real(a), Cost::Real(b)) => Cost::Real(a + b),
            (Cost::Int(a), Cost::Int(b)) => Cost::Int(a + b),
            (Cost::Real(a), Cost::Int(b)) | (Cost::Int(b), Cost::Real(a)) => {
                Cost::Real(a + b as f64)
            }
        }
    }
}

/// A cost function over an ordered tuple of variables.
///
/// The scope order is significant: it defines the layout of the assignment
/// tuples. Any assignment over the scope that is not listed in `tuples`
/// costs `defcost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// The variables this constraint ranges over, in tuple-layout order.
    pub scope: Vec<VariableId>,
    /// Explicit costs, keyed by full-length assignments in scope order.
    pub tuples: OrdMap<Assignment, Cost>,
    /// The cost of every assignment not listed in `tuples`.
    pub defcost: Cost,
}

impl Constraint {
    pub fn new(scope: Vec<VariableId>, defcost: Cost) -> Self {
        Self {
            scope,
            tuples: OrdMap::new(),
            defcost,
        }
    }

    /// Builds a constraint with an initial set of explicit tuples.
    pub fn with_tuples(
        scope: Vec<VariableId>,
        tuples: impl IntoIterator<Item = (Assignment, Cost)>,
        defcost: Cost,
    ) -> Result<Self> {
        let mut constraint = Self::new(scope, defcost);
        for (assignment, cost) in tuples {
            constraint.tuple(assignment, cost)?;
        }
        Ok(constraint)
    }

    pub fn arity(&self) -> usize {
        self.scope.len()
    }

    /// Inserts or overwrites the cost of one assignment. The assignment must
    /// have exactly one value index per scope variable.
    pub fn tuple(&mut self, assignment: Assignment, cost: Cost) -> Result<()> {
        if assignment.len() != self.scope.len() {
            return Err(WcspError::ScopeMismatch {
                tuple_len: assignment.len(),
                scope_len: self.scope.len(),
            }
            .into());
        }
        self.tuples.insert(assignment, cost);
        Ok(())
    }

    /// The cost of an assignment: the stored value if present, `defcost`
    /// otherwise.
    pub fn cost_of(&self, assignment: &[ValueIndex]) -> Cost {
        self.tuples
            .get(assignment)
            .copied()
            .unwrap_or(self.defcost)
    }
}

/// Constraints compare equal when they range over the same variable *set*
/// and agree on default cost and explicit tuples. Scope order matters for
/// encoding, not for identity.
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        let mut lhs = self.scope.clone();
        let mut rhs = other.scope.clone();
        lhs.sort_unstable();
        rhs.sort_unstable();
        lhs == rhs && self.defcost == other.defcost && self.tuples == other.tuples
    }
}
