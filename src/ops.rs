//! Batch operation pipeline.
//!
//! One operation is applied to every node matched by a path pattern, in two
//! phases: collect all matches and partition them by applicability, then
//! process the applicable ones. The split is required because processing
//! one node (deletion in particular) may structurally invalidate its
//! siblings or descendants, so applicability is decided before any
//! mutation. Each candidate's root is captured before processing, since a
//! successful `process` can detach the node from its tree; a failed
//! `process` rolls the node back so a later save of the same root cannot
//! persist a partial edit.

mod delete;
mod json;
mod print;
mod printtree;
mod set;
mod setlist;

use std::io::Write;

use tracing::{debug, warn};

pub use delete::DeleteOperation;
pub use json::JsonOperation;
pub use print::PrintOperation;
pub use printtree::PrintTreeOperation;
pub use set::SetOperation;
pub use setlist::SetListOperation;

use crate::{NodeId, NodeTree, PathQuery, Result, UsageError, Visited};

/// One logical operation, polymorphic over validation, applicability, and
/// per-node application.
pub trait Operation {
    /// Check the operation's own options. A failure aborts the whole run
    /// before any node is touched.
    fn validate(&self) -> std::result::Result<(), UsageError>;

    /// Whether this node can be processed at all. Decided for every match
    /// before any node is mutated.
    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool;

    /// Apply the operation to one node. Output (for print-style operations)
    /// goes to `out`.
    fn process(&self, tree: &mut NodeTree, id: NodeId, out: &mut dyn Write) -> Result<()>;
}

/// Terminal state of one candidate node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Succeeded,
    /// Skipped: the operation does not apply to this node kind.
    InvalidCommand,
    /// The node could not be loaded during enumeration.
    Unreadable,
    /// `process` failed; the node was rolled back.
    Failed,
}

#[derive(Clone, Debug)]
pub struct NodeOutcome {
    pub path: String,
    pub outcome: Outcome,
}

impl NodeOutcome {
    pub fn line(&self) -> String {
        match self.outcome {
            Outcome::Succeeded => format!("{}: OK", self.path),
            Outcome::InvalidCommand => format!("{}: ERROR (invalid command)", self.path),
            Outcome::Unreadable => format!("{}: ERROR (load)", self.path),
            Outcome::Failed => format!("{}: ERROR (apply)", self.path),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn summary(&self) -> String {
        format!(
            "Operation complete. succeeded: {}  failed: {}",
            self.succeeded(),
            self.failed()
        )
    }
}

/// Run `op` over every node matching `query`. Per-node failures never abort
/// the run; only usage-level errors (bad options, unresolvable pattern
/// root) return `Err`.
pub fn run_batch(
    tree: &mut NodeTree,
    query: &PathQuery,
    op: &dyn Operation,
    out: &mut dyn Write,
) -> Result<BatchReport> {
    op.validate()?;

    let visited: Vec<Visited> = query.enumerate(tree)?.collect();

    // Phase one: partition matches by applicability before any mutation.
    let mut report = BatchReport::default();
    let mut candidates: Vec<(NodeId, String, NodeId)> = Vec::new();
    for item in visited {
        match item {
            Visited::Unreadable(id, error) => {
                let path = tree.node_path(id);
                warn!(%path, %error, "match could not be loaded");
                report.outcomes.push(NodeOutcome {
                    path,
                    outcome: Outcome::Unreadable,
                });
            }
            Visited::Matched(id) => {
                if op.can_process(tree, id) {
                    // Path and root are captured now: processing may detach
                    // the node and make both unreachable from it.
                    candidates.push((id, tree.node_path(id), tree.root_of(id)));
                } else {
                    report.outcomes.push(NodeOutcome {
                        path: tree.node_path(id),
                        outcome: Outcome::InvalidCommand,
                    });
                }
            }
        }
    }

    // Phase two: process the survivors, committing or rolling back at node
    // granularity.
    for (id, path, root) in candidates {
        let result = op
            .process(tree, id, out)
            .and_then(|_| tree.save(root));
        match result {
            Ok(()) => report.outcomes.push(NodeOutcome {
                path,
                outcome: Outcome::Succeeded,
            }),
            Err(error) => {
                debug!(%path, %error, "processing failed, rolling back");
                tree.refresh(id);
                report.outcomes.push(NodeOutcome {
                    path,
                    outcome: Outcome::Failed,
                });
            }
        }
    }

    Ok(report)
}
