//! Lazily resolved JSON trees.
//!
//! A resource's `json` callback returns a [`JsonNode`]: a JSON-shaped tree
//! that may still contain references to domain objects ([`JsonNode::Reference`]),
//! pending computations ([`JsonNode::Deferred`]) and [`ValueWrapper`] hints.
//! The server's emitter walks the tree, awaits what needs awaiting, replaces
//! references with resource ids and prunes fields the client did not ask for.
//!
//! # Example
//!
//! ```
//! use critic_api_core::JsonNode;
//!
//! let node = JsonNode::object([
//!     ("id", JsonNode::from(42)),
//!     ("name", JsonNode::from("alice")),
//!     ("email", JsonNode::from(None::<String>)),
//! ]);
//! assert!(node.is_object());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::ApiResult;
use crate::value::Value;

/// Hint attached to a subtree telling the emitter how much work it needs.
pub enum ValueWrapper {
    /// Finished JSON; emitted as-is.
    Plain(serde_json::Value),
    /// Contains no deferred nodes; walked synchronously.
    Immediate(Box<JsonNode>),
    /// A list of basic values, each a reference or a primitive.
    BasicList(Vec<JsonNode>),
}

impl fmt::Debug for ValueWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Immediate(node) => f.debug_tuple("Immediate").field(node).finish(),
            Self::BasicList(items) => f.debug_tuple("BasicList").field(items).finish(),
        }
    }
}

/// A JSON tree that may still need resolution.
pub enum JsonNode {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(serde_json::Number),
    /// A string.
    String(String),
    /// A domain object; emitted as its resource id and collected for linking.
    Reference(Value),
    /// An ordered list.
    Array(Vec<JsonNode>),
    /// An unordered collection; emitted as a sorted list.
    Set(Vec<JsonNode>),
    /// An object; emitted in insertion order.
    Object(Vec<(String, JsonNode)>),
    /// A pending subtree, awaited by the emitter unless filtered out.
    Deferred(BoxFuture<'static, ApiResult<JsonNode>>),
    /// A subtree carrying a [`ValueWrapper`] hint.
    Wrapped(ValueWrapper),
}

impl JsonNode {
    /// Creates an object node from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, JsonNode)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Creates an array node.
    pub fn array<T, I>(items: I) -> Self
    where
        T: Into<JsonNode>,
        I: IntoIterator<Item = T>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Creates a set node.
    pub fn set<T, I>(items: I) -> Self
    where
        T: Into<JsonNode>,
        I: IntoIterator<Item = T>,
    {
        Self::Set(items.into_iter().map(Into::into).collect())
    }

    /// Creates a deferred node from a future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ApiResult<JsonNode>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Wraps finished JSON that needs no further processing.
    #[must_use]
    pub fn plain(value: serde_json::Value) -> Self {
        Self::Wrapped(ValueWrapper::Plain(value))
    }

    /// Marks a subtree that contains no deferred nodes.
    #[must_use]
    pub fn immediate(node: JsonNode) -> Self {
        Self::Wrapped(ValueWrapper::Immediate(Box::new(node)))
    }

    /// Creates a list of references and primitives.
    pub fn basic_list<T, I>(items: I) -> Self
    where
        T: Into<JsonNode>,
        I: IntoIterator<Item = T>,
    {
        Self::Wrapped(ValueWrapper::BasicList(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    /// Returns `true` for an object node.
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns `true` if the node is a primitive (null, bool, number, string).
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_)
        )
    }
}

impl fmt::Debug for JsonNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Number(value) => f.debug_tuple("Number").field(value).finish(),
            Self::String(value) => f.debug_tuple("String").field(value).finish(),
            Self::Reference(value) => f.debug_tuple("Reference").field(value).finish(),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Set(items) => f.debug_tuple("Set").field(items).finish(),
            Self::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Wrapped(wrapper) => f.debug_tuple("Wrapped").field(wrapper).finish(),
        }
    }
}

impl From<bool> for JsonNode {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for JsonNode {
                fn from(value: $ty) -> Self {
                    Self::Number(value.into())
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize);

impl From<f64> for JsonNode {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for JsonNode {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for JsonNode {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Value> for JsonNode {
    fn from(value: Value) -> Self {
        Self::Reference(value)
    }
}

impl<T: Into<JsonNode>> From<Option<T>> for JsonNode {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<JsonNode>> From<Vec<T>> for JsonNode {
    fn from(items: Vec<T>) -> Self {
        Self::array(items)
    }
}

impl From<serde_json::Value> for JsonNode {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(value) => Self::Number(value),
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(items) => Self::array(items),
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

fn type_rank(value: &serde_json::Value) -> u8 {
    match value {
        serde_json::Value::Null => 0,
        serde_json::Value::Bool(_) => 1,
        serde_json::Value::Number(_) => 2,
        serde_json::Value::String(_) => 3,
        serde_json::Value::Array(_) => 4,
        serde_json::Value::Object(_) => 5,
    }
}

/// Natural ordering of emitted JSON values.
///
/// Values of different JSON types order by type (null, booleans, numbers,
/// strings, arrays, objects); numbers compare numerically, arrays
/// lexicographically and objects by their serialized form.
#[must_use]
pub fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value as J;

    match (a, b) {
        (J::Null, J::Null) => Ordering::Equal,
        (J::Bool(a), J::Bool(b)) => a.cmp(b),
        (J::Number(a), J::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        },
        (J::String(a), J::String(b)) => a.cmp(b),
        (J::Array(a), J::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare_json(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (J::Object(_), J::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_serde_value_preserves_order() {
        let node = JsonNode::from(json!({"b": 1, "a": [true, null]}));
        match node {
            JsonNode::Object(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["b", "a"]);
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_option_maps_to_null() {
        assert!(matches!(JsonNode::from(None::<i64>), JsonNode::Null));
        assert!(matches!(JsonNode::from(Some(3)), JsonNode::Number(_)));
    }

    #[test]
    fn test_compare_json_numbers_and_types() {
        assert_eq!(compare_json(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_json(&json!(1.5), &json!(1)), Ordering::Greater);
        assert_eq!(compare_json(&json!(null), &json!("a")), Ordering::Less);
        assert_eq!(compare_json(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_json(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
    }

    #[tokio::test]
    async fn test_deferred_node_resolves() {
        let node = JsonNode::deferred(async { Ok(JsonNode::from("later")) });
        match node {
            JsonNode::Deferred(future) => {
                let resolved = future.await.unwrap();
                assert!(matches!(resolved, JsonNode::String(s) if s == "later"));
            }
            other => panic!("expected deferred node, got {other:?}"),
        }
    }
}
