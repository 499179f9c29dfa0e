//! Exact conversion of real-valued costs to bounded non-negative integers.
//!
//! The external solver works on integer costs. The divisor is chosen so that
//! dividing every cost by it and truncating cannot collapse two distinct
//! finite costs into the same integer, and so that the smallest positive
//! cost maps to at least 1. The hard cost (`top`) is one more than the sum
//! of every constraint's scaled maximum finite cost, so no combination of
//! finite costs can ever reach it.

use tracing::error;

use crate::error::{Result, WcspError};
use crate::model::constraint::{Constraint, Cost};
use crate::model::problem::Wcsp;

/// The largest cost the external solver accepts.
pub const MAX_COST: u64 = 1_537_228_672_809_129_301;

/// Rounds to six decimal places to suppress floating-point noise when
/// collecting distinct cost values.
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// The largest finite cost of a constraint, over its default cost and all
/// explicit tuples. `None` when every cost is `Top`.
fn max_finite_cost(constraint: &Constraint) -> Option<f64> {
    std::iter::once(constraint.defcost)
        .chain(constraint.tuples.values().copied())
        .filter_map(Cost::finite)
        .fold(None, |max, v| Some(max.map_or(v, |m| f64::max(m, v))))
}

impl Wcsp {
    /// Computes the divisor that scales every real cost to a distinct
    /// integer. `None` when no positive finite cost exists, i.e. the problem
    /// consists of hard constraints only and needs no scaling.
    pub fn compute_divisor(&self) -> Option<f64> {
        // Sorted list of distinct finite costs, rounded to 6 decimals.
        let mut costs: Vec<f64> = Vec::new();
        let mut min_weight: Option<f64> = None;
        for constraint in self.constraints.values() {
            for cost in std::iter::once(constraint.defcost).chain(constraint.tuples.values().copied())
            {
                let Some(value) = cost.finite() else { continue };
                let value = round6(value);
                match costs.binary_search_by(|c| c.total_cmp(&value)) {
                    Ok(_) => continue,
                    Err(i) => costs.insert(i, value),
                }
                if value > 0.0 && min_weight.map_or(true, |m| value < m) {
                    min_weight = Some(value);
                }
            }
        }
        let min_weight = min_weight?;
        let delta_min = if costs.len() == 1 {
            costs[0]
        } else {
            costs
                .windows(2)
                .map(|w| w[1] - w[0])
                .fold(f64::INFINITY, f64::min)
        };
        let mut divisor = 1.0;
        if min_weight < 1.0 {
            divisor *= min_weight;
        }
        if delta_min < 1.0 {
            divisor *= delta_min;
        }
        Some(divisor)
    }

    /// Computes the integer cost standing for infeasibility: one more than
    /// the sum of every constraint's scaled maximum finite cost.
    pub fn compute_hardcost(&self, divisor: Option<f64>) -> Result<u64> {
        if self.constraints.is_empty() {
            return Err(WcspError::NoConstraints.into());
        }
        let divisor = divisor.unwrap_or(1.0);
        let mut sum: u64 = 0;
        for constraint in self.constraints.values() {
            let Some(max) = max_finite_cost(constraint) else {
                continue;
            };
            if max == 0.0 {
                continue;
            }
            let scaled = (max / divisor).abs() as u64;
            sum = sum
                .checked_add(scaled)
                .ok_or(WcspError::NumericOverflow)?;
        }
        let top = sum.checked_add(1).ok_or(WcspError::NumericOverflow)?;
        if top > MAX_COST {
            error!(top, max = MAX_COST, "maximum costs exceeded");
            return Err(WcspError::MaxCostExceeded {
                top,
                max: MAX_COST,
            }
            .into());
        }
        Ok(top)
    }

    /// Rewrites every cost in the problem as an integer: `Top` becomes the
    /// hard cost, finite costs are divided by the divisor and truncated.
    ///
    /// This runs exactly once per problem; calling it again after `top` has
    /// been set is a no-op.
    pub fn integerize(&mut self) -> Result<()> {
        if self.top.is_some() {
            return Ok(());
        }
        let divisor = self.compute_divisor();
        let top = self.compute_hardcost(divisor)?;
        let scopes: Vec<_> = self.constraints.keys().cloned().collect();
        for scope in scopes {
            let constraint = self.constraints.get_mut(&scope).unwrap();
            constraint.defcost = integer_cost(constraint.defcost, divisor, top);
            constraint.tuples = constraint
                .tuples
                .iter()
                .map(|(t, &cost)| (t.clone(), integer_cost(cost, divisor, top)))
                .collect();
        }
        self.top = Some(top);
        Ok(())
    }
}

fn integer_cost(cost: Cost, divisor: Option<f64>, top: u64) -> Cost {
    match (cost.finite(), divisor) {
        (None, _) => Cost::Int(top),
        (Some(_), None) => Cost::Int(0),
        (Some(value), Some(divisor)) => Cost::Int((value / divisor) as u64),
    }
}
