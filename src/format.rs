//! The line-oriented WCSP text format shared with the external solver.
//!
//! ```text
//! <name> <numVariables> <maxDomainSize> <numConstraints> <top>
//! <domsize_0> ... <domsize_{V-1}>
//! <arity> <var_0> ... <var_{arity-1}> <defcost> <numExplicitTuples>   (per constraint)
//! <val_0> ... <val_{arity-1}> <cost>                                  (per explicit tuple)
//! ```
//!
//! All costs are integers; writing a problem that still carries real-valued
//! costs integerizes it first. Reader and writer agree exactly on field
//! order and counts, since this is the wire contract with the solver.

use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::error::{Result, WcspError};
use crate::model::constraint::{Assignment, Constraint, Cost, VariableId};
use crate::model::problem::{scope_key, Wcsp};

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse<T: FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| WcspError::MalformedInput(format!("invalid {what}: `{token}`")).into())
}

impl Wcsp {
    /// Writes the problem in WCSP format. Integerizes the costs first if
    /// that has not happened yet.
    pub fn write<W: Write>(&mut self, mut out: W) -> Result<()> {
        self.integerize()?;
        // integerize leaves top set on every success path.
        let top = self.top.unwrap();
        // A hand-assembled problem can carry a top while its costs are
        // still real-valued; refuse to encode it.
        let int_of = |cost: Cost| -> Result<u64> {
            cost.int().ok_or_else(|| {
                WcspError::MalformedInput(
                    "real-valued cost in a problem already marked as integerized".into(),
                )
                .into()
            })
        };

        let maxdom = self.domsizes.iter().copied().max().unwrap_or(0);
        writeln!(
            out,
            "{} {} {} {} {}",
            self.name,
            self.domsizes.len(),
            maxdom,
            self.constraints.len(),
            top
        )?;
        writeln!(out, "{}", join(self.domsizes.iter()))?;
        for constraint in self.constraints.values() {
            writeln!(
                out,
                "{} {} {} {}",
                constraint.arity(),
                join(constraint.scope.iter()),
                int_of(constraint.defcost)?,
                constraint.tuples.len()
            )?;
            for (t, &cost) in &constraint.tuples {
                writeln!(out, "{} {}", join(t.iter()), int_of(cost)?)?;
            }
        }
        Ok(())
    }

    /// Parses a problem in WCSP format. Constraints land in the usual
    /// sorted-scope-keyed map.
    pub fn read<R: BufRead>(input: R) -> Result<Wcsp> {
        let mut lines = input.lines();
        let mut next_tokens = move || -> Result<Vec<String>> {
            let line = lines
                .next()
                .ok_or_else(|| WcspError::MalformedInput("unexpected end of input".into()))??;
            Ok(line.split_whitespace().map(str::to_owned).collect())
        };

        let header = next_tokens()?;
        let [name, numvars, _maxdom, numconstraints, top] = header.as_slice() else {
            return Err(
                WcspError::MalformedInput(format!("header has {} fields, expected 5", header.len()))
                    .into(),
            );
        };
        let numvars: usize = parse(numvars, "variable count")?;
        let numconstraints: usize = parse(numconstraints, "constraint count")?;
        let top: u64 = parse(top, "top cost")?;

        let domsizes = next_tokens()?
            .iter()
            .map(|t| parse(t, "domain size"))
            .collect::<Result<Vec<usize>>>()?;
        if domsizes.len() != numvars {
            return Err(WcspError::MalformedInput(format!(
                "{} domain sizes for {} variables",
                domsizes.len(),
                numvars
            ))
            .into());
        }

        let mut wcsp = Wcsp::new(name.clone(), domsizes);
        wcsp.top = Some(top);
        for _ in 0..numconstraints {
            let head = next_tokens()?;
            if head.len() < 3 {
                return Err(
                    WcspError::MalformedInput("truncated constraint header".into()).into(),
                );
            }
            let arity: usize = parse(&head[0], "arity")?;
            if head.len() != arity + 3 {
                return Err(WcspError::MalformedInput(format!(
                    "constraint header has {} fields for arity {}",
                    head.len(),
                    arity
                ))
                .into());
            }
            let scope = head[1..=arity]
                .iter()
                .map(|t| parse(t, "variable index"))
                .collect::<Result<Vec<VariableId>>>()?;
            let defcost: u64 = parse(&head[arity + 1], "default cost")?;
            let numtuples: usize = parse(&head[arity + 2], "tuple count")?;

            let mut constraint = Constraint::new(scope, Cost::Int(defcost));
            for _ in 0..numtuples {
                let fields = next_tokens()?;
                if fields.len() != arity + 1 {
                    return Err(WcspError::MalformedInput(format!(
                        "tuple line has {} fields for arity {}",
                        fields.len(),
                        arity
                    ))
                    .into());
                }
                let assignment = fields[..arity]
                    .iter()
                    .map(|t| parse(t, "value index"))
                    .collect::<Result<Assignment>>()?;
                let cost: u64 = parse(&fields[arity], "cost")?;
                constraint.tuple(assignment, Cost::Int(cost))?;
            }
            let key = scope_key(&constraint.scope);
            wcsp.constraints.insert(key, constraint);
        }
        Ok(wcsp)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn toy_problem() -> Wcsp {
        let mut wcsp = Wcsp::new("toy", vec![2, 2]);
        wcsp.insert(
            Constraint::with_tuples(
                vec![0, 1],
                [
                    (vec![0, 0], Cost::Real(0.5)),
                    (vec![1, 1], Cost::Real(1.0)),
                ],
                Cost::Real(0.0),
            )
            .unwrap(),
        )
        .unwrap();
        wcsp.insert(
            Constraint::with_tuples(vec![0], [(vec![0], Cost::Top)], Cost::Real(0.0)).unwrap(),
        )
        .unwrap();
        wcsp
    }

    #[test]
    fn write_emits_the_wire_format() {
        let mut wcsp = toy_problem();
        let mut buf = Vec::new();
        wcsp.write(&mut buf).unwrap();

        // divisor 0.25, hard cost floor(1.0 / 0.25) + 1 = 5
        let expected = "\
toy 2 2 2 5
2 2
1 0 0 1
0 5
2 0 1 0 2
0 0 2
1 1 4
";
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[test]
    fn write_integerizes_implicitly() {
        let mut wcsp = toy_problem();
        assert_eq!(wcsp.top, None);
        wcsp.write(&mut Vec::new()).unwrap();
        assert_eq!(wcsp.top, Some(5));
    }

    #[test]
    fn round_trip_preserves_the_problem() {
        let mut wcsp = toy_problem();
        let mut buf = Vec::new();
        wcsp.write(&mut buf).unwrap();
        let reread = Wcsp::read(buf.as_slice()).unwrap();
        assert_eq!(reread, wcsp);
    }

    #[test]
    fn write_rejects_real_costs_behind_a_preset_top() {
        let mut wcsp = toy_problem();
        wcsp.top = Some(5);
        let err = wcsp.write(&mut Vec::new()).unwrap_err();
        assert!(matches!(err.kind(), WcspError::MalformedInput(_)));
    }

    #[test]
    fn read_rejects_a_truncated_file() {
        let input = "toy 2 2 1 5\n2 2\n2 0 1 0 2\n0 0 2\n";
        let err = Wcsp::read(input.as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), WcspError::MalformedInput(_)));
    }

    #[test]
    fn read_rejects_a_bad_header() {
        let err = Wcsp::read("toy 2 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), WcspError::MalformedInput(_)));
    }
}
