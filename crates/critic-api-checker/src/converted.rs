//! Checked and converted input.

use indexmap::IndexMap;

use critic_api_core::{ApiError, ApiResult, Entity, Value};

/// An input document after checking and conversion.
///
/// Ids of domain entities have been replaced by the fetched [`Value`]s;
/// object attributes keep the order the schema processed them in.
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    /// `null`, or an omitted `name=null` attribute.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// A list of converted items.
    List(Vec<Converted>),
    /// An object of converted attributes.
    Object(IndexMap<String, Converted>),
    /// A domain entity fetched by id.
    Entity(Value),
    /// Input accepted without a schema.
    Raw(serde_json::Value),
}

impl Converted {
    /// Returns `true` for [`Converted::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Looks up an object attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(attributes) => attributes.get(key),
            _ => None,
        }
    }

    /// Looks up an object attribute the schema guarantees.
    ///
    /// A missing attribute means the schema and the resource disagree, which
    /// is an internal error.
    pub fn field(&self, key: &str) -> ApiResult<&Self> {
        self.get(key)
            .ok_or_else(|| ApiError::internal(format!("converted input lacks attribute {key:?}")))
    }

    /// Returns the boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the list items.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the fetched domain value.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Entity(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the fetched entity as its concrete type.
    #[must_use]
    pub fn as_entity<T: Entity>(&self) -> Option<&T> {
        self.as_value().and_then(Value::downcast_ref::<T>)
    }

    /// Collects the fetched domain values of a list of entities.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(Self::as_value)
            .cloned()
            .collect()
    }
}
