//! Human-readable strategy description for a script.
//!
//! The tree mirrors the operators the interpreter runs: `IndexSeek`,
//! `SeqScan`, `Filter`, and `NestedLoopJoin`. Costs are abstract units meant
//! for comparison only: a seek touches about log2(n) index entries, a scan
//! touches every row, and a nested loop compares every pair.

use std::fmt;

use serde::Serialize;

use crate::query::script::{Script, Step};
use crate::relation::RelationStore;
use crate::types::Result;

/// Explain tree plus the script fingerprint it describes.
#[derive(Clone, Debug, Serialize)]
pub struct PlanExplain {
    /// Root operator.
    pub root: ExplainNode,
    /// Fingerprint of the explained script.
    pub fingerprint: u64,
}

/// Operator with display properties and inputs.
#[derive(Clone, Debug, Serialize)]
pub struct ExplainNode {
    /// Operator name.
    pub op: String,
    /// Display properties.
    pub props: Vec<ExplainProp>,
    /// Estimated cost of this operator and its inputs.
    pub cost: f64,
    /// Input operators.
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            cost: 0.0,
            inputs: Vec::new(),
        }
    }

    fn prop(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.props.push(ExplainProp {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    /// Looks up a property value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    fn render(&self, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:indent$}{} (cost={:.2})", "", self.op, self.cost, indent = depth * 2)?;
        for prop in &self.props {
            write!(f, " {}={}", prop.key, prop.value)?;
        }
        writeln!(f)?;
        for input in &self.inputs {
            input.render(depth + 1, f)?;
        }
        Ok(())
    }
}

/// Single key/value property of an [`ExplainNode`].
#[derive(Clone, Debug, Serialize)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
}

impl fmt::Display for PlanExplain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.render(0, f)
    }
}

/// Builds the explain tree for `script`, sizing costs from `store`.
pub fn explain(script: &Script, store: &dyn RelationStore) -> Result<PlanExplain> {
    let mut stack: Vec<ExplainNode> = Vec::new();
    for step in &script.steps {
        match step {
            Step::Info { .. } | Step::Success { .. } => {}
            Step::Error { text } => {
                stack.push(ExplainNode::new("Unsupported").prop("message", text));
            }
            Step::Scan {
                relation, filter, ..
            } => {
                let rel = store.relation(relation)?;
                let mut node = ExplainNode::new("SeqScan")
                    .prop("relation", relation)
                    .prop("rows", rel.len());
                if let Some(pred) = filter {
                    node = node.prop("filter", pred);
                }
                node.cost = rel.len() as f64;
                stack.push(node);
            }
            Step::Filter {
                relation,
                predicate,
                ..
            } => {
                let rel = store.relation(relation)?;
                let reason = if rel.is_indexed(&predicate.column) {
                    format!("index on '{}' not used by a range predicate", predicate.column)
                } else {
                    format!("no index covers '{}'", predicate.column)
                };
                let input = take_scan(&mut stack, relation);
                let mut node = ExplainNode::new("Filter")
                    .prop("predicate", predicate)
                    .prop("reason", reason);
                node.cost = rel.len() as f64 + input.as_ref().map_or(0.0, |n| n.cost);
                node.inputs.extend(input);
                stack.push(node);
            }
            Step::Seek {
                relation,
                column,
                value,
                ..
            } => {
                let rel = store.relation(relation)?;
                let mut node = ExplainNode::new("IndexSeek")
                    .prop("relation", relation)
                    .prop("index", format!("{relation}_pkey"))
                    .prop("predicate", format!("{column} = {value}"))
                    .prop("reason", format!("key index on '{column}'"));
                node.cost = ((rel.len() + 1) as f64).log2().ceil();
                stack.push(node);
            }
            Step::Match { join, .. } => {
                let left = store.relation(&join.left)?;
                let right = store.relation(&join.right)?;
                let right_input = take_scan(&mut stack, &join.right);
                let left_input = take_scan(&mut stack, &join.left);
                let pairs = left.len() * right.len();
                let mut node = ExplainNode::new("NestedLoopJoin")
                    .prop("condition", join)
                    .prop("pairs", pairs);
                node.cost = pairs as f64
                    + left_input.as_ref().map_or(0.0, |n| n.cost)
                    + right_input.as_ref().map_or(0.0, |n| n.cost);
                node.inputs.extend(left_input);
                node.inputs.extend(right_input);
                stack.push(node);
            }
        }
    }
    let root = match stack.len() {
        1 => stack.pop().unwrap_or_else(|| ExplainNode::new("Empty")),
        0 => ExplainNode::new("Empty"),
        _ => {
            let mut seq = ExplainNode::new("Sequence");
            seq.cost = stack.iter().map(|n| n.cost).sum();
            seq.inputs = stack;
            seq
        }
    };
    Ok(PlanExplain {
        root: root.prop("archetype", script.archetype),
        fingerprint: script.fingerprint,
    })
}

fn take_scan(stack: &mut Vec<ExplainNode>, relation: &str) -> Option<ExplainNode> {
    let pos = stack
        .iter()
        .rposition(|n| n.op == "SeqScan" && n.get("relation") == Some(relation))?;
    Some(stack.remove(pos))
}
