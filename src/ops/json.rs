use std::io::Write;

use serde_json::{Map, Number, Value as Json};

use crate::{Error, NodeId, NodeKind, NodeTree, Operation, Result, UsageError, Value};

/// Export each matched node's subtree as pretty-printed JSON.
pub struct JsonOperation;

impl Operation for JsonOperation {
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
        let json = match tree.kind(id) {
            Some(NodeKind::Tag { .. }) => {
                value_to_json(tree.value(id).ok_or(Error::Apply("node has no value"))?)
            }
            Some(NodeKind::Chunk { .. } | NodeKind::NbtFile { .. }) => {
                tree.expand(id)?;
                let root = tree
                    .root_compound(id)
                    .ok_or(Error::Apply("document has no root compound"))?;
                compound_to_json(root)
            }
            _ => return Err(Error::Apply("node has no JSON form")),
        };
        let rendered = serde_json::to_string_pretty(&json)
            .map_err(|_| Error::Apply("JSON serialization failed"))?;
        writeln!(out, "{rendered}")?;
        Ok(())
    }
}

fn compound_to_json(compound: &crate::Compound) -> Json {
    let mut map = Map::new();
    for (name, value) in compound.iter() {
        map.insert(name.to_string(), value_to_json(value));
    }
    Json::Object(map)
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Byte(v) => Json::from(*v),
        Value::Short(v) => Json::from(*v),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        Value::Float(v) => Number::from_f64(f64::from(*v))
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Double(v) => Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
        Value::ByteArray(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
        Value::String(v) => Json::String(v.clone()),
        Value::List(v) => Json::Array(v.iter().map(value_to_json).collect()),
        Value::Compound(v) => compound_to_json(v),
        Value::IntArray(v) => Json::Array(v.iter().map(|i| Json::from(*i)).collect()),
        Value::LongArray(v) => Json::Array(v.iter().map(|i| Json::from(*i)).collect()),
    }
}
