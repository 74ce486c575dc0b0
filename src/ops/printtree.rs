use std::io::Write;

use crate::{NodeId, NodeTree, Operation, Result, UsageError};

/// Print the outline of each matched node's subtree, expanding on demand.
pub struct PrintTreeOperation;

impl Operation for PrintTreeOperation {
    fn validate(&self) -> std::result::Result<(), UsageError> {
        Ok(())
    }

    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool {
        tree.contains(id)
    }

    fn process(&self, tree: &mut NodeTree, id: NodeId, out: &mut dyn Write) -> Result<()> {
        print_subtree(tree, id, 0, out)
    }
}

fn print_subtree(tree: &mut NodeTree, id: NodeId, depth: usize, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{:indent$}{}", "", tree.display_name(id), indent = depth * 2)?;
    tree.expand(id)?;
    for child in tree.children(id).to_vec() {
        print_subtree(tree, child, depth + 1, out)?;
    }
    Ok(())
}
