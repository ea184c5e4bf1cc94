//! The resource registry.
//!
//! Resources are registered once at startup; [`RegistryBuilder::build`]
//! freezes them into an immutable [`Registry`] shared by all requests.
//!
//! Two maps drive dispatch:
//!
//! - **handlers**: `"<version>/<name>"` for top-level resources and
//!   `".../<parent>/<name>"` for every parent context
//! - **value classes**: value type → top-level path, used to recognize
//!   domain objects embedded in emitted JSON as references

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use critic_api_checker::{SchemaError, TypeChecker};
use critic_api_core::{ApiError, ApiResult, Value, ValueType};

use crate::descriptor::Context;
use crate::resource::Resource;

/// Prefix of context-relative handler paths.
pub const RELATIVE: &str = "...";

/// Errors detected while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The version tag is empty or contains a slash.
    #[error("invalid version tag: {0:?}")]
    InvalidVersion(String),

    /// A resource name is empty or contains a slash.
    #[error("invalid resource name: {0:?}")]
    InvalidName(String),

    /// Two resources share a name.
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    /// Two registrations claim the same handler path.
    #[error("duplicate handler path: {0}")]
    DuplicatePath(String),

    /// Two top-level resources claim the same value type.
    #[error("value type {value_type} registered by both {first} and {second}")]
    DuplicateValueType {
        /// The contested value type.
        value_type: &'static str,
        /// The resource registered first.
        first: String,
        /// The resource registered second.
        second: String,
    },

    /// A resource without value types.
    #[error("resource {0} declares no value types")]
    NoValueTypes(String),

    /// A resource without contexts.
    #[error("resource {0} declares no contexts")]
    NoContexts(String),

    /// A declared input schema is malformed.
    #[error("invalid input schema for {resource}: {source}")]
    Schema {
        /// The resource declaring the schema.
        resource: String,
        /// What is wrong with it.
        #[source]
        source: SchemaError,
    },
}

/// Compiled input schemas of one resource.
#[derive(Debug, Clone, Default)]
pub struct InputCheckers {
    /// Body of `POST`.
    pub create: Option<TypeChecker>,
    /// Body of `PUT` on addressed values.
    pub update: Option<TypeChecker>,
    /// Items of a `PUT` list body.
    pub update_many: Option<TypeChecker>,
}

/// The frozen set of registered resources.
pub struct Registry {
    version: String,
    resources: Vec<Arc<dyn Resource>>,
    handlers: HashMap<String, Arc<dyn Resource>>,
    value_classes: HashMap<ValueType, String>,
    inputs: HashMap<String, InputCheckers>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<&String> = self.handlers.keys().collect();
        paths.sort();
        f.debug_struct("Registry")
            .field("version", &self.version)
            .field("handlers", &paths)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Starts building a registry for a version tag.
    #[must_use]
    pub fn builder(version: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            version: version.into(),
            resources: Vec::new(),
        }
    }

    /// The version tag.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Registered resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.resources.iter()
    }

    /// The resource registered under a name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Arc<dyn Resource>> {
        self.resources
            .iter()
            .find(|resource| resource.descriptor().name() == name)
    }

    /// The handler registered under an exact path.
    #[must_use]
    pub fn handler(&self, path: &str) -> Option<&Arc<dyn Resource>> {
        self.handlers.get(path)
    }

    /// Finds the resource for a walked path.
    ///
    /// Tries the literal path, then each progressively shorter suffix under
    /// [`RELATIVE`]. For `["v1", "reviews", "comments"]` that is
    /// `v1/reviews/comments`, `.../reviews/comments` and `.../comments`.
    ///
    /// # Errors
    ///
    /// A miss is a path error naming the full path.
    pub fn lookup(&self, path: &[String]) -> ApiResult<(String, Arc<dyn Resource>)> {
        let candidates = std::iter::once(path.join("/"))
            .chain((1..path.len()).map(|start| format!("{RELATIVE}/{}", path[start..].join("/"))));
        for candidate in candidates {
            if let Some(resource) = self.handlers.get(&candidate) {
                return Ok((candidate, Arc::clone(resource)));
            }
        }
        Err(ApiError::path(format!(
            "Invalid resource path: {}",
            path.join("/")
        )))
    }

    /// The top-level resource serializing values of `value_type`.
    #[must_use]
    pub fn resource_for_type(&self, value_type: ValueType) -> Option<Arc<dyn Resource>> {
        self.value_classes
            .get(&value_type)
            .and_then(|path| self.handlers.get(path))
            .cloned()
    }

    /// Returns `true` if values of `value_type` are emitted as references.
    #[must_use]
    pub fn is_registered_type(&self, value_type: ValueType) -> bool {
        self.value_classes.contains_key(&value_type)
    }

    /// The resource for a value, by its runtime type.
    ///
    /// # Errors
    ///
    /// An unregistered value type is an internal error.
    pub fn find(&self, value: &Value) -> ApiResult<Arc<dyn Resource>> {
        self.resource_for_type(value.value_type()).ok_or_else(|| {
            ApiError::internal(format!(
                "no resource registered for {} values",
                value.value_type()
            ))
        })
    }

    /// Compiled input schemas of a resource.
    #[must_use]
    pub fn inputs(&self, resource: &str) -> Option<&InputCheckers> {
        self.inputs.get(resource)
    }

    /// The version documentation served at `GET /api/<version>`.
    #[must_use]
    pub fn documentation(&self) -> serde_json::Value {
        let mut resources = serde_json::Map::new();
        for resource in &self.resources {
            let descriptor = resource.descriptor();
            let mut entry = serde_json::Map::new();
            entry.insert(
                "description".into(),
                descriptor.description_text().into(),
            );
            entry.insert(
                "contexts".into(),
                descriptor
                    .context_list()
                    .iter()
                    .map(|context| match context {
                        Context::TopLevel => serde_json::Value::Null,
                        other => other.to_string().into(),
                    })
                    .collect(),
            );
            entry.insert(
                "value_types".into(),
                descriptor
                    .value_types()
                    .iter()
                    .map(|value_type| serde_json::Value::from(value_type.name()))
                    .collect(),
            );
            entry.insert("methods".into(), descriptor.methods().into());

            if let Some(inputs) = self.inputs.get(descriptor.name()) {
                let mut input = serde_json::Map::new();
                for (method, checker) in [
                    ("create", &inputs.create),
                    ("update", &inputs.update),
                    ("update_many", &inputs.update_many),
                ] {
                    if let Some(checker) = checker {
                        input.insert(method.into(), checker.describe());
                    }
                }
                if !input.is_empty() {
                    entry.insert("input".into(), input.into());
                }
            }

            resources.insert(descriptor.name().to_string(), entry.into());
        }

        serde_json::json!({
            "version": self.version,
            "resources": resources,
        })
    }
}

/// Collects resources before freezing them into a [`Registry`].
pub struct RegistryBuilder {
    version: String,
    resources: Vec<Arc<dyn Resource>>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("version", &self.version)
            .field("resources", &self.resources.len())
            .finish()
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/') && segment != RELATIVE
}

fn compile(resource: &str, schema: Option<&critic_api_checker::Schema>) -> Result<Option<TypeChecker>, RegistryError> {
    schema
        .cloned()
        .map(TypeChecker::compile)
        .transpose()
        .map_err(|source| RegistryError::Schema {
            resource: resource.to_string(),
            source,
        })
}

impl RegistryBuilder {
    /// Adds a resource.
    #[must_use]
    pub fn register<R: Resource>(mut self, resource: R) -> Self {
        self.resources.push(Arc::new(resource));
        self
    }

    /// Adds an already shared resource.
    #[must_use]
    pub fn register_arc(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Validates the registrations and freezes them.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] found.
    pub fn build(self) -> Result<Arc<Registry>, RegistryError> {
        if !valid_segment(&self.version) {
            return Err(RegistryError::InvalidVersion(self.version));
        }

        let mut handlers: HashMap<String, Arc<dyn Resource>> = HashMap::new();
        let mut value_classes: HashMap<ValueType, String> = HashMap::new();
        let mut inputs = HashMap::new();

        for resource in &self.resources {
            let descriptor = resource.descriptor();
            let name = descriptor.name();

            if !valid_segment(name) {
                return Err(RegistryError::InvalidName(name.to_string()));
            }
            if inputs.contains_key(name) {
                return Err(RegistryError::DuplicateResource(name.to_string()));
            }
            if descriptor.value_types().is_empty() {
                return Err(RegistryError::NoValueTypes(name.to_string()));
            }
            if descriptor.context_list().is_empty() {
                return Err(RegistryError::NoContexts(name.to_string()));
            }

            for context in descriptor.context_list() {
                let path = match context {
                    Context::TopLevel => format!("{}/{name}", self.version),
                    Context::Parent { parent, nested } => {
                        let segment = nested.as_deref().unwrap_or(name);
                        if !valid_segment(segment) {
                            return Err(RegistryError::InvalidName(segment.to_string()));
                        }
                        format!("{RELATIVE}/{parent}/{segment}")
                    }
                };
                if handlers.contains_key(&path) {
                    return Err(RegistryError::DuplicatePath(path));
                }

                if *context == Context::TopLevel {
                    for value_type in descriptor.value_types() {
                        if let Some(first) = value_classes.get(value_type) {
                            return Err(RegistryError::DuplicateValueType {
                                value_type: value_type.name(),
                                first: first.clone(),
                                second: path,
                            });
                        }
                        value_classes.insert(*value_type, path.clone());
                    }
                }

                debug!(resource = name, path = %path, "registered resource");
                handlers.insert(path, Arc::clone(resource));
            }

            let schemas = descriptor.input_schemas();
            inputs.insert(
                name.to_string(),
                InputCheckers {
                    create: compile(name, schemas.create.as_ref())?,
                    update: compile(name, schemas.update.as_ref())?,
                    update_many: compile(name, schemas.update_many.as_ref())?,
                },
            );
        }

        Ok(Arc::new(Registry {
            version: self.version,
            resources: self.resources,
            handlers,
            value_classes,
            inputs,
        }))
    }
}
