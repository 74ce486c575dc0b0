use std::io::Write;

use crate::{Error, NodeId, NodeTree, Operation, Result, UsageError, Value};

/// Set a scalar tag to a value parsed from a string, keeping its kind.
pub struct SetOperation {
    value: Option<String>,
}

impl SetOperation {
    pub fn new(value: Option<String>) -> Self {
        Self { value }
    }
}

impl Operation for SetOperation {
    fn validate(&self) -> std::result::Result<(), UsageError> {
        match self.value {
            Some(_) => Ok(()),
            None => Err(UsageError("set requires a value".to_string())),
        }
    }

    fn can_process(&self, tree: &NodeTree, id: NodeId) -> bool {
        tree.capabilities(id).edit
    }

    fn process(&self, tree: &mut NodeTree, id: NodeId, _out: &mut dyn Write) -> Result<()> {
        let input = self
            .value
            .as_deref()
            .ok_or(Error::Apply("set requires a value"))?;
        let tag = tree
            .value(id)
            .ok_or(Error::Apply("node has no value"))?
            .tag();
        let value = Value::parse_as(tag, input).ok_or_else(|| Error::ValueParse {
            tag,
            input: input.to_string(),
        })?;
        tree.set_value(id, value)
    }
}
