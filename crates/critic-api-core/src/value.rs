//! Domain values as seen by the framework.
//!
//! Resources hand domain objects to the framework as [`Value`]s: cheap,
//! type-erased, reference-counted handles that remember their runtime type
//! and identity. The result of resolving a path is a [`Values`], which is
//! either a single value or a sequence of values.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};

/// A domain entity the framework can serialize and reference.
///
/// # Example
///
/// ```
/// use critic_api_core::{Entity, Value};
///
/// #[derive(Debug)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for User {
///     const TYPE_NAME: &'static str = "user";
///
///     fn id(&self) -> i64 {
///         self.id
///     }
/// }
///
/// let value = Value::new(User { id: 42, name: "alice".into() });
/// assert_eq!(value.id(), 42);
/// assert_eq!(value.downcast_ref::<User>().unwrap().name, "alice");
/// ```
pub trait Entity: fmt::Debug + Send + Sync + 'static {
    /// Short, human-readable name of the entity kind (e.g. `review`).
    const TYPE_NAME: &'static str;

    /// The entity's identity within its kind.
    fn id(&self) -> i64;
}

/// The runtime type of a [`Value`].
#[derive(Debug, Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// Returns the value type of entity `T`.
    #[must_use]
    pub fn of<T: Entity>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::TYPE_NAME,
        }
    }

    /// Returns the entity kind's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the underlying type id.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ValueType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a value: its runtime type and entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueKey {
    /// The value's runtime type.
    pub value_type: ValueType,
    /// The entity id.
    pub id: i64,
}

trait AnyEntity: fmt::Debug + Send + Sync {
    fn entity_id(&self) -> i64;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> AnyEntity for T {
    fn entity_id(&self) -> i64 {
        self.id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased handle to a domain entity.
///
/// Equality, hashing and ordering go through [`ValueKey`], so two handles to
/// the same entity compare equal even when they were fetched separately.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn AnyEntity>,
    value_type: ValueType,
}

impl Value {
    /// Wraps an entity.
    #[must_use]
    pub fn new<T: Entity>(entity: T) -> Self {
        Self::from_arc(Arc::new(entity))
    }

    /// Wraps an already shared entity.
    #[must_use]
    pub fn from_arc<T: Entity>(entity: Arc<T>) -> Self {
        Self {
            inner: entity,
            value_type: ValueType::of::<T>(),
        }
    }

    /// Returns the runtime type.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.inner.entity_id()
    }

    /// Returns the identity key.
    #[must_use]
    pub fn key(&self) -> ValueKey {
        ValueKey {
            value_type: self.value_type,
            id: self.id(),
        }
    }

    /// Returns `true` if the value is an instance of `T`.
    #[must_use]
    pub fn is<T: Entity>(&self) -> bool {
        self.value_type == ValueType::of::<T>()
    }

    /// Downcasts to the concrete entity.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Downcasts to the concrete entity, failing with an internal error.
    pub fn expect_entity<T: Entity>(&self) -> ApiResult<&T> {
        self.downcast_ref::<T>().ok_or_else(|| {
            ApiError::internal(format!(
                "expected {} value, got {}",
                T::TYPE_NAME,
                self.value_type
            ))
        })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// One or many values produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Values {
    /// A single value; iterates as a one-element sequence.
    Single(Value),
    /// A sequence of values.
    Multiple(Vec<Value>),
}

impl Values {
    /// Returns `true` for [`Values::Single`].
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    /// Returns `true` for [`Values::Multiple`].
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    /// Returns the single value.
    ///
    /// Calling this on multiple values is a programming error and yields an
    /// internal error rather than a client error.
    pub fn get(&self) -> ApiResult<&Value> {
        match self {
            Self::Single(value) => Ok(value),
            Self::Multiple(_) => Err(ApiError::internal(
                "single value requested from multiple values",
            )),
        }
    }

    /// Iterates over the contained values in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        match self {
            Self::Single(value) => std::slice::from_ref(value).iter(),
            Self::Multiple(values) => values.iter(),
        }
    }

    /// Returns the number of contained values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(values) => values.len(),
        }
    }

    /// Returns `true` if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for Values {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Self::Multiple(values)
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Values {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Self::Single(value) => vec![value].into_iter(),
            Self::Multiple(values) => values.into_iter(),
        }
    }
}
