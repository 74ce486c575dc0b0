use std::io::Write;

use crate::{Error, NodeId, NodeTree, Operation, Result, UsageError};

/// Delete matched nodes: tags from their container, chunks from their
/// region (physical removal deferred to the region's save).
pub struct DeleteOperation;

impl Operation for DeleteOperation {
    fn validate(&self) -> std::result::Result<(), UsageError> {
        Ok(())
    }

    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool {
        tree.capabilities(id).delete
    }

    fn process(&self, tree: &mut NodeTree, id: NodeId, _out: &mut dyn Write) -> Result<()> {
        if tree.delete_node(id) {
            Ok(())
        } else {
            Err(Error::Apply("nothing was deleted"))
        }
    }
}
