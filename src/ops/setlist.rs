use std::io::Write;

use crate::{Error, List, NodeId, NodeKind, NodeTree, Operation, Result, Tag, UsageError, Value};

/// Replace a list's elements with values parsed from strings, keeping the
/// list's established element kind.
pub struct SetListOperation {
    values: Vec<String>,
}

impl SetListOperation {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl Operation for SetListOperation {
    fn validate(&self) -> std::result::Result<(), UsageError> {
        if self.values.is_empty() {
            Err(UsageError("setlist requires at least one value".to_string()))
        } else {
            Ok(())
        }
    }

    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool {
        matches!(
            tree.kind(id),
            Some(NodeKind::Tag { tag: Tag::List, .. })
        )
    }

    fn process(&self, tree: &mut NodeTree, id: NodeId, _out: &mut dyn Write) -> Result<()> {
        let elem = match tree.value(id) {
            Some(Value::List(list)) => list.elem_tag(),
            _ => return Err(Error::Apply("node is not a list")),
        };
        if elem == Tag::End {
            return Err(Error::Apply("list has no established element kind"));
        }
        let mut items = Vec::with_capacity(self.values.len());
        for input in &self.values {
            items.push(Value::parse_as(elem, input).ok_or_else(|| Error::ValueParse {
                tag: elem,
                input: input.clone(),
            })?);
        }
        let list = List::from_values(items).map_err(Error::Container)?;
        tree.set_value(id, Value::List(list))
    }
}
