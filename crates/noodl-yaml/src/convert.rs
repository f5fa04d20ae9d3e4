//! Conversions between nodes and raw JSON values.

use crate::{MapNode, Node, Scalar};
use serde_json::{Map, Number, Value};

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::from(b),
            Value::Number(n) => Node::scalar(number_to_scalar(&n)),
            Value::String(s) => Node::string(s),
            Value::Array(items) => Node::seq(items.into_iter().map(Node::from).collect()),
            Value::Object(entries) => Node::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect::<MapNode>(),
            ),
        }
    }
}

fn number_to_scalar(n: &Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else {
        // u64 beyond i64::MAX and real numbers both land here
        Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

impl Scalar {
    /// Convert to a JSON value. Non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::Number((*i).into()),
            Scalar::Float(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }
}

impl Node {
    /// JSON-able snapshot of this node.
    ///
    /// Documents snapshot as their contents and pairs as single-entry
    /// objects. Map order is preserved.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Scalar(n) => n.value.to_json(),
            Node::Pair(pair) => {
                let mut object = Map::new();
                object.insert(pair.key.clone(), pair.value.to_json());
                Value::Object(object)
            }
            Node::Map(map) => Value::Object(
                map.entries()
                    .iter()
                    .map(|e| (e.key.clone(), e.value.to_json()))
                    .collect(),
            ),
            Node::Seq(seq) => Value::Array(seq.items.iter().map(Node::to_json).collect()),
            Node::Document(doc) => doc.contents.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;
    use serde_json::json;

    #[test]
    fn test_from_json_object_keeps_order() {
        let node = Node::from(json!({"zeta": 1, "alpha": [true, null], "mid": "x"}));
        assert_eq!(node.kind(), NodeKind::Map);
        let keys: Vec<_> = node.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(node.get("zeta"), Some(&Node::from(1)));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let value = json!({"SignIn": {"components": [{"type": "view", "viewTag": "red"}]}});
        assert_eq!(Node::from(value.clone()).to_json(), value);
    }

    #[test]
    fn test_snapshot_of_document_and_pair() {
        let doc = Node::document(Node::pair("k", Node::from(2.5)));
        assert_eq!(doc.to_json(), json!({"k": 2.5}));
        assert_eq!(Node::from(f64::NAN).to_json(), Value::Null);
    }
}
