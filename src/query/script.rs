//! Canonical step scripts for each archetype.
//!
//! A script is the ordered list of pedagogical steps the interpreter walks.
//! Building one is pure: the same archetype always yields the same kinds,
//! targets, and predicates in the same order.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hasher;

use serde::Serialize;
use xxhash_rust::xxh64::Xxh64;

use crate::query::classify::Archetype;
use crate::relation::fixtures::{ORDERS, USERS};
use crate::relation::{Row, Value};

/// Comparison operator used by filter and seek predicates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    /// SQL spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

/// `column <op> literal` tested against a single row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comparison {
    /// Column read from the row.
    pub column: String,
    /// Operator applied as `row[column] <op> value`.
    pub op: CmpOp,
    /// Literal right-hand side.
    pub value: Value,
}

impl Comparison {
    /// Creates a comparison.
    pub fn new(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Tests the row. A missing column or incomparable types never match.
    pub fn evaluate(&self, row: &Row) -> bool {
        row.get(&self.column)
            .and_then(|cell| cell.compare(&self.value))
            .is_some_and(|ord| self.op.accepts(ord))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op.symbol(), self.value)
    }
}

/// Equi-join between two relations, evaluated as a nested loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JoinSpec {
    /// Outer relation.
    pub left: String,
    /// Inner relation.
    pub right: String,
    /// Key column on the outer relation.
    pub left_key: String,
    /// Foreign-key column on the inner relation.
    pub right_key: String,
}

impl fmt::Display for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {}.{}",
            self.left, self.left_key, self.right, self.right_key
        )
    }
}

/// Discriminant of a [`Step`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Narration only.
    Info,
    /// Sequential scan.
    Scan,
    /// Direct key-index access.
    Seek,
    /// Nested-loop join matching.
    Match,
    /// Per-row predicate test.
    Filter,
    /// Terminal success narration.
    Success,
    /// Terminal failure narration.
    Error,
}

impl StepKind {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Info => "info",
            StepKind::Scan => "scan",
            StepKind::Seek => "seek",
            StepKind::Match => "match",
            StepKind::Filter => "filter",
            StepKind::Success => "success",
            StepKind::Error => "error",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of an execution script.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Narration with no data operation.
    Info {
        /// Display text.
        text: String,
    },
    /// Visits every row of `relation` in index order, optionally filtering.
    Scan {
        /// Display text.
        text: String,
        /// Relation to scan.
        relation: String,
        /// Predicate whose matches are appended to the results.
        filter: Option<Comparison>,
    },
    /// Direct access to the single row whose key equals `value`.
    Seek {
        /// Display text.
        text: String,
        /// Relation to seek into.
        relation: String,
        /// Key column consulted.
        column: String,
        /// Key looked up.
        value: Value,
    },
    /// Nested-loop equi-join.
    Match {
        /// Display text.
        text: String,
        /// Join description.
        join: JoinSpec,
    },
    /// Visits every row of `relation`, appending those matching `predicate`.
    Filter {
        /// Display text.
        text: String,
        /// Relation whose rows are tested.
        relation: String,
        /// Predicate to test.
        predicate: Comparison,
    },
    /// Terminal success narration.
    Success {
        /// Display text.
        text: String,
    },
    /// Terminal failure narration; the interpreter halts after it.
    Error {
        /// Display text.
        text: String,
    },
}

impl Step {
    /// Kind of the step.
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Info { .. } => StepKind::Info,
            Step::Scan { .. } => StepKind::Scan,
            Step::Seek { .. } => StepKind::Seek,
            Step::Match { .. } => StepKind::Match,
            Step::Filter { .. } => StepKind::Filter,
            Step::Success { .. } => StepKind::Success,
            Step::Error { .. } => StepKind::Error,
        }
    }

    /// Display text.
    pub fn text(&self) -> &str {
        match self {
            Step::Info { text }
            | Step::Scan { text, .. }
            | Step::Seek { text, .. }
            | Step::Match { text, .. }
            | Step::Filter { text, .. }
            | Step::Success { text }
            | Step::Error { text } => text,
        }
    }

    /// Relations the step reads, in left-to-right order.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Step::Scan { relation, .. }
            | Step::Seek { relation, .. }
            | Step::Filter { relation, .. } => vec![relation.as_str()],
            Step::Match { join, .. } => vec![join.left.as_str(), join.right.as_str()],
            Step::Info { .. } | Step::Success { .. } | Step::Error { .. } => Vec::new(),
        }
    }

    fn info(text: &str) -> Self {
        Step::Info { text: text.into() }
    }

    fn success(text: &str) -> Self {
        Step::Success { text: text.into() }
    }
}

/// Ordered steps for one archetype plus a structural fingerprint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Script {
    /// Archetype the script was built for.
    pub archetype: Archetype,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Hash over step kinds, targets, and predicates (display text excluded).
    pub fingerprint: u64,
}

impl Script {
    fn new(archetype: Archetype, steps: Vec<Step>) -> Self {
        let fingerprint = fingerprint(archetype, &steps);
        Self {
            archetype,
            steps,
            fingerprint,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for an empty script (never produced by [`build_script`]).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step kinds in order.
    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(Step::kind).collect()
    }
}

/// Builds the canonical script for `archetype`.
pub fn build_script(archetype: Archetype) -> Script {
    let steps = match archetype {
        Archetype::IndexSeek => vec![
            Step::info("PLAN_SEEK: users.id"),
            Step::Seek {
                text: "BTREE_SEEK: users_pkey (id = 1)".into(),
                relation: USERS.into(),
                column: "id".into(),
                value: Value::Int(1),
            },
            Step::success("DATA_LOCATED: FETCHING_PAGES"),
        ],
        Archetype::SequentialFilterScan => vec![
            Step::info("MISSING_INDEX: \"age\". PLANNING_SEQ_SCAN."),
            Step::Scan {
                text: "SEQ_SCAN: users_storage".into(),
                relation: USERS.into(),
                filter: None,
            },
            Step::Filter {
                text: "FILTER_PREDICATE: age > 25".into(),
                relation: USERS.into(),
                predicate: Comparison::new("age", CmpOp::Gt, 25i64),
            },
            Step::success("SCAN_COMPLETE: BUFFER_FLUSHED"),
        ],
        Archetype::EqualityJoin => vec![
            Step::info("INITIATING_NESTED_LOOP_JOIN..."),
            Step::Scan {
                text: "SCANNING_USERS_TABLE...".into(),
                relation: USERS.into(),
                filter: None,
            },
            Step::Scan {
                text: "SCANNING_ORDERS_TABLE...".into(),
                relation: ORDERS.into(),
                filter: None,
            },
            Step::Match {
                text: "NESTED_LOOP_MATCH: users.id = orders.user_id".into(),
                join: JoinSpec {
                    left: USERS.into(),
                    right: ORDERS.into(),
                    left_key: "id".into(),
                    right_key: "user_id".into(),
                },
            },
            Step::success("JOIN_COMPLETE: RESULT_SET_GENERATED"),
        ],
        Archetype::Unsupported => vec![Step::Error {
            text: "UNSUPPORTED_OP: Supports id = 1, age > 25, or JOIN".into(),
        }],
    };
    Script::new(archetype, steps)
}

fn fingerprint(archetype: Archetype, steps: &[Step]) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.write(archetype.as_str().as_bytes());
    hasher.write_u64(steps.len() as u64);
    for step in steps {
        hasher.write(step.kind().as_str().as_bytes());
        for target in step.targets() {
            hasher.write(target.as_bytes());
        }
        match step {
            Step::Scan {
                filter: Some(pred), ..
            }
            | Step::Filter {
                predicate: pred, ..
            } => hasher.write(pred.to_string().as_bytes()),
            Step::Seek { column, value, .. } => {
                hasher.write(column.as_bytes());
                hasher.write(value.to_string().as_bytes());
            }
            Step::Match { join, .. } => hasher.write(join.to_string().as_bytes()),
            _ => {}
        }
    }
    hasher.finish()
}
