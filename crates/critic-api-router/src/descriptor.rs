//! Declarative resource descriptions.

use std::collections::BTreeSet;
use std::fmt;

use critic_api_checker::Schema;
use critic_api_core::{Entity, ValueType};

/// Where a resource can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Context {
    /// `/api/<version>/<name>`.
    TopLevel,
    /// `/.../<parent>/<name>`, or `/.../<parent>/<nested>` with an override.
    Parent {
        /// The parent resource's name.
        parent: String,
        /// The segment used under the parent instead of the resource name.
        nested: Option<String>,
    },
}

impl Context {
    /// Reachable under `parent`.
    #[must_use]
    pub fn parent(parent: impl Into<String>) -> Self {
        Self::Parent {
            parent: parent.into(),
            nested: None,
        }
    }

    /// Reachable under `parent` as `nested`.
    #[must_use]
    pub fn nested(parent: impl Into<String>, nested: impl Into<String>) -> Self {
        Self::Parent {
            parent: parent.into(),
            nested: Some(nested.into()),
        }
    }

    /// Parses `parent` or `parent:nested`.
    #[must_use]
    pub fn parse(context: &str) -> Self {
        match context.split_once(':') {
            Some((parent, nested)) => Self::nested(parent, nested),
            None => Self::parent(context),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopLevel => f.write_str("<top-level>"),
            Self::Parent {
                parent,
                nested: None,
            } => f.write_str(parent),
            Self::Parent {
                parent,
                nested: Some(nested),
            } => write!(f, "{parent}:{nested}"),
        }
    }
}

/// A handler a resource implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// Look up one value by path argument.
    Single,
    /// Enumerate values without an argument.
    Multiple,
    /// `POST`.
    Create,
    /// `PUT` on addressed values.
    Update,
    /// `PUT` with a list body and no addressed values.
    UpdateMany,
    /// `DELETE`.
    Delete,
}

impl Operation {
    /// The method that invokes this operation.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Single | Self::Multiple => "GET",
            Self::Create => "POST",
            Self::Update | Self::UpdateMany => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Input schemas of a resource, compiled by the registry.
#[derive(Debug, Clone, Default)]
pub struct InputSchemas {
    /// Body of `POST`.
    pub create: Option<Schema>,
    /// Body of `PUT` on addressed values.
    pub update: Option<Schema>,
    /// Items of a `PUT` list body.
    pub update_many: Option<Schema>,
}

/// Static description of a resource.
///
/// # Example
///
/// ```rust
/// use critic_api_router::{Context, Operation, ResourceDescriptor};
/// use critic_api_core::Entity;
///
/// #[derive(Debug)]
/// struct Comment { id: i64 }
///
/// impl Entity for Comment {
///     const TYPE_NAME: &'static str = "comment";
///     fn id(&self) -> i64 { self.id }
/// }
///
/// let descriptor = ResourceDescriptor::new("comments")
///     .value_type::<Comment>()
///     .contexts([Context::TopLevel, Context::parent("reviews")])
///     .exceptions(["comment", "review"])
///     .operations([Operation::Single, Operation::Multiple, Operation::Create])
///     .description("Comments on reviews");
///
/// assert!(descriptor.supports(Operation::Create));
/// assert!(!descriptor.supports(Operation::Delete));
/// ```
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    name: String,
    value_types: Vec<ValueType>,
    contexts: Vec<Context>,
    exceptions: Vec<&'static str>,
    operations: BTreeSet<Operation>,
    anonymous_create: bool,
    anonymous_update: bool,
    anonymous_delete: bool,
    description: String,
    inputs: InputSchemas,
}

impl ResourceDescriptor {
    /// Starts a top-level resource description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_types: Vec::new(),
            contexts: vec![Context::TopLevel],
            exceptions: Vec::new(),
            operations: BTreeSet::new(),
            anonymous_create: false,
            anonymous_update: false,
            anonymous_delete: false,
            description: String::new(),
            inputs: InputSchemas::default(),
        }
    }

    /// Adds a value type the resource serializes.
    #[must_use]
    pub fn value_type<T: Entity>(mut self) -> Self {
        self.value_types.push(ValueType::of::<T>());
        self
    }

    /// Replaces the contexts the resource is reachable in.
    #[must_use]
    pub fn contexts(mut self, contexts: impl IntoIterator<Item = Context>) -> Self {
        self.contexts = contexts.into_iter().collect();
        self
    }

    /// Domain modules whose errors this resource expects.
    #[must_use]
    pub fn exceptions(mut self, modules: impl IntoIterator<Item = &'static str>) -> Self {
        self.exceptions.extend(modules);
        self
    }

    /// Handlers the resource implements.
    #[must_use]
    pub fn operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(operations);
        self
    }

    /// Allows `POST` without a signed-in user.
    #[must_use]
    pub const fn anonymous_create(mut self, allowed: bool) -> Self {
        self.anonymous_create = allowed;
        self
    }

    /// Allows `PUT` without a signed-in user.
    #[must_use]
    pub const fn anonymous_update(mut self, allowed: bool) -> Self {
        self.anonymous_update = allowed;
        self
    }

    /// Allows `DELETE` without a signed-in user.
    #[must_use]
    pub const fn anonymous_delete(mut self, allowed: bool) -> Self {
        self.anonymous_delete = allowed;
        self
    }

    /// Inline documentation.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Schema for `POST` bodies.
    #[must_use]
    pub fn create_schema(mut self, schema: Schema) -> Self {
        self.inputs.create = Some(schema);
        self
    }

    /// Schema for `PUT` bodies on addressed values.
    #[must_use]
    pub fn update_schema(mut self, schema: Schema) -> Self {
        self.inputs.update = Some(schema);
        self
    }

    /// Schema for each item of a `PUT` list body.
    #[must_use]
    pub fn update_many_schema(mut self, schema: Schema) -> Self {
        self.inputs.update_many = Some(schema);
        self
    }

    /// The resource name (a single path segment).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value types the resource serializes.
    #[must_use]
    pub fn value_types(&self) -> &[ValueType] {
        &self.value_types
    }

    /// Returns `true` if `value_type` belongs to this resource.
    #[must_use]
    pub fn accepts(&self, value_type: ValueType) -> bool {
        self.value_types.contains(&value_type)
    }

    /// Contexts the resource is reachable in.
    #[must_use]
    pub fn context_list(&self) -> &[Context] {
        &self.contexts
    }

    /// Declared domain modules.
    #[must_use]
    pub fn exception_modules(&self) -> &[&'static str] {
        &self.exceptions
    }

    /// Returns `true` if the handler is implemented.
    #[must_use]
    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Returns `true` if the method is allowed without a signed-in user.
    #[must_use]
    pub const fn allows_anonymous(&self, operation: Operation) -> bool {
        match operation {
            Operation::Single | Operation::Multiple => true,
            Operation::Create => self.anonymous_create,
            Operation::Update | Operation::UpdateMany => self.anonymous_update,
            Operation::Delete => self.anonymous_delete,
        }
    }

    /// Inline documentation.
    #[must_use]
    pub fn description_text(&self) -> &str {
        &self.description
    }

    /// Declared input schemas.
    #[must_use]
    pub fn input_schemas(&self) -> &InputSchemas {
        &self.inputs
    }

    /// Methods the resource answers, in `GET`, `POST`, `PUT`, `DELETE` order.
    #[must_use]
    pub fn methods(&self) -> Vec<&'static str> {
        ["GET", "POST", "PUT", "DELETE"]
            .into_iter()
            .filter(|method| {
                self.operations
                    .iter()
                    .any(|operation| operation.method() == *method)
            })
            .collect()
    }
}
