//! Query keys.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a query in the engine's cache.
///
/// A key is a list of JSON values. Two keys are equal when their stable
/// serialization is equal; object members are compared regardless of order.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct QueryKey {
    parts: Vec<Value>,

    /// Stable serialization of `parts`, used for equality and hashing.
    hash: String,
}

impl QueryKey {
    pub fn new(parts: impl IntoIterator<Item = Value>) -> Self {
        let parts: Vec<Value> = parts.into_iter().collect();
        // serde_json maps are ordered by key, so this is stable.
        let hash = Value::Array(parts.clone()).to_string();
        Self { parts, hash }
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// The stable string form of this key.
    pub fn hash_key(&self) -> &str {
        &self.hash
    }

    /// An empty key cannot identify a query.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        Self::new(parts)
    }
}

impl From<QueryKey> for Vec<Value> {
    fn from(key: QueryKey) -> Self {
        key.parts
    }
}

impl From<&str> for QueryKey {
    fn from(part: &str) -> Self {
        Self::new([Value::from(part)])
    }
}

impl From<String> for QueryKey {
    fn from(part: String) -> Self {
        Self::new([Value::from(part)])
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl std::fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryKey({})", self.hash)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_member_order_does_not_affect_identity() {
        let a = QueryKey::new([json!("todos"), json!({ "page": 1, "done": false })]);
        let b = QueryKey::new([json!("todos"), json!({ "done": false, "page": 1 })]);
        assert_eq!(a, b);
        assert_eq!(a.hash_key(), b.hash_key());
    }

    #[test]
    fn deserializes_from_json_array() {
        let key: QueryKey = serde_json::from_str(r#"["todo", 5]"#).unwrap();
        assert_eq!(key, QueryKey::new([json!("todo"), json!(5)]));
        assert_eq!(serde_json::to_string(&key).unwrap(), r#"["todo",5]"#);
    }

    #[test]
    fn empty_key_is_reported() {
        assert!(QueryKey::new([]).is_empty());
        assert!(!QueryKey::from("todos").is_empty());
    }
}
