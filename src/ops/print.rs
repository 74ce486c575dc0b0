use std::io::Write;

use crate::{NodeId, NodeKind, NodeTree, Operation, Result, UsageError};

/// Print each matched node's one-line display form.
pub struct PrintOperation;

impl Operation for PrintOperation {
    fn validate(&self) -> std::result::Result<(), UsageError> {
        Ok(())
    }

    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool {
        matches!(
            tree.kind(id),
            Some(NodeKind::Tag { .. } | NodeKind::Chunk { .. } | NodeKind::NbtFile { .. })
        )
    }

    fn process(&self, tree: &mut NodeTree, id: NodeId, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{}", tree.display_name(id))?;
        Ok(())
    }
}
