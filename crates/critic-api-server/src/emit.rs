//! Turning resource JSON trees into response JSON.
//!
//! A resource's `json` callback returns a [`JsonNode`] tree. The emitter walks
//! it against the field selection of the resource type:
//!
//! - keys the selection excludes are dropped together with any pending
//!   futures below them, and the root object is marked `is_partial`
//! - references become the referenced resource's scalar id and are handed
//!   to the [`Linked`] collector
//! - sets become lists sorted by the resource's sort key
//!
//! Wrapped subtrees take the synchronous *quick* walk; everything else takes
//! the async walk, which awaits deferred nodes and resolves siblings
//! concurrently.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use tracing::trace;

use critic_api_core::{compare_json, ApiError, ApiResult, JsonNode, Value, ValueWrapper};
use critic_api_extract::{FieldFilter, FieldSelection};
use critic_api_router::{Linked, Parameters, Resource};

/// Key added to a root object when selection pruned any field below it.
pub(crate) const IS_PARTIAL: &str = "is_partial";

/// Walks the tree of one root object.
struct Emitter<'a> {
    parameters: &'a Parameters,
    linked: &'a Linked,
    resource: &'a dyn Resource,
    pruned: AtomicBool,
}

impl<'a> Emitter<'a> {
    fn walk<'b>(
        &'b self,
        node: JsonNode,
        filter: Option<FieldFilter<'b>>,
    ) -> BoxFuture<'b, ApiResult<serde_json::Value>>
    where
        'a: 'b,
    {
        async move {
            match node {
                JsonNode::Deferred(future) => {
                    let resolved = future.await?;
                    self.walk(resolved, filter).await
                }
                JsonNode::Array(items) => self.walk_items(items, filter).await,
                JsonNode::Set(items) => {
                    let mut emitted = match self.walk_items(items, filter).await? {
                        serde_json::Value::Array(emitted) => emitted,
                        other => return Ok(other),
                    };
                    self.sort(&mut emitted);
                    Ok(serde_json::Value::Array(emitted))
                }
                JsonNode::Object(entries) => {
                    let selected = self.select(entries, filter.as_ref());
                    let emitted = try_join_all(selected.into_iter().map(
                        |(key, value, child)| async move {
                            Ok::<_, ApiError>((key, self.walk(value, child).await?))
                        },
                    ))
                    .await?;
                    Ok(serde_json::Value::Object(emitted.into_iter().collect()))
                }
                JsonNode::Wrapped(wrapper) => self.unwrap(wrapper, filter.as_ref()),
                other => self.quick(other, filter.as_ref()),
            }
        }
        .boxed()
    }

    async fn walk_items<'b>(
        &'b self,
        items: Vec<JsonNode>,
        filter: Option<FieldFilter<'b>>,
    ) -> ApiResult<serde_json::Value> {
        let emitted = try_join_all(
            items
                .into_iter()
                .map(|item| self.walk(item, filter.clone())),
        )
        .await?;
        Ok(serde_json::Value::Array(emitted))
    }

    /// The synchronous walk for subtrees without deferred nodes.
    fn quick(&self, node: JsonNode, filter: Option<&FieldFilter<'_>>) -> ApiResult<serde_json::Value> {
        Ok(match node {
            JsonNode::Null => serde_json::Value::Null,
            JsonNode::Bool(value) => serde_json::Value::Bool(value),
            JsonNode::Number(value) => serde_json::Value::Number(value),
            JsonNode::String(value) => serde_json::Value::String(value),
            JsonNode::Reference(value) => self.reference(&value)?,
            JsonNode::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(|item| self.quick(item, filter))
                    .collect::<ApiResult<_>>()?,
            ),
            JsonNode::Set(items) => {
                let mut emitted = items
                    .into_iter()
                    .map(|item| self.quick(item, filter))
                    .collect::<ApiResult<Vec<_>>>()?;
                self.sort(&mut emitted);
                serde_json::Value::Array(emitted)
            }
            JsonNode::Object(entries) => serde_json::Value::Object(
                self.select(entries, filter)
                    .into_iter()
                    .map(|(key, value, child)| Ok((key, self.quick(value, child.as_ref())?)))
                    .collect::<ApiResult<_>>()?,
            ),
            JsonNode::Wrapped(wrapper) => self.unwrap(wrapper, filter)?,
            JsonNode::Deferred(_) => {
                return Err(ApiError::internal(format!(
                    "resource {} returned a deferred value inside an immediate subtree",
                    self.resource.descriptor().name()
                )))
            }
        })
    }

    fn unwrap(
        &self,
        wrapper: ValueWrapper,
        filter: Option<&FieldFilter<'_>>,
    ) -> ApiResult<serde_json::Value> {
        match wrapper {
            ValueWrapper::Plain(value) => Ok(match (value, filter) {
                (serde_json::Value::Object(map), Some(filter)) => serde_json::Value::Object(
                    map.into_iter()
                        .filter(|(key, _)| {
                            let include = filter.check(key).include;
                            if !include {
                                self.pruned.store(true, Ordering::Relaxed);
                            }
                            include
                        })
                        .collect(),
                ),
                (value, _) => value,
            }),
            ValueWrapper::Immediate(node) => self.quick(*node, filter),
            ValueWrapper::BasicList(items) => items
                .into_iter()
                .map(|item| match item {
                    JsonNode::Reference(value) => self.reference(&value),
                    primitive if primitive.is_primitive() => self.quick(primitive, None),
                    other => Err(ApiError::internal(format!(
                        "resource {} put {other:?} in a basic list",
                        self.resource.descriptor().name()
                    ))),
                })
                .collect::<ApiResult<Vec<_>>>()
                .map(serde_json::Value::Array),
        }
    }

    /// Applies the field filter to object entries. Dropped entries cancel
    /// whatever they still had pending.
    fn select<'f, T>(
        &self,
        entries: Vec<(String, T)>,
        filter: Option<&FieldFilter<'f>>,
    ) -> Vec<(String, T, Option<FieldFilter<'f>>)> {
        let Some(filter) = filter else {
            return entries
                .into_iter()
                .map(|(key, value)| (key, value, None))
                .collect();
        };

        entries
            .into_iter()
            .filter_map(|(key, value)| {
                let decision = filter.check(&key);
                if decision.include {
                    Some((key, value, decision.child))
                } else {
                    trace!(key, "pruned field");
                    self.pruned.store(true, Ordering::Relaxed);
                    None
                }
            })
            .collect()
    }

    /// Emits a referenced value as its scalar id.
    fn reference(&self, value: &Value) -> ApiResult<serde_json::Value> {
        let key = value.key();
        if let Some(id) = self.parameters.cached_id(&key) {
            return Ok(id);
        }
        let resource = self.linked.add(value)?;
        let id = resource.resource_id(value);
        self.parameters.cache_id(key, id.clone());
        Ok(id)
    }

    fn sort(&self, items: &mut [serde_json::Value]) {
        if items.iter().all(serde_json::Value::is_object) {
            sort_objects(self.resource, items);
        } else {
            items.sort_by(compare_json);
        }
    }
}

/// Sorts emitted objects by the resource's sort key.
pub(crate) fn sort_objects(resource: &dyn Resource, objects: &mut [serde_json::Value]) {
    objects.sort_by(|a, b| compare_json(&resource.sort_key(a), &resource.sort_key(b)));
}

/// Emits an already produced tree as the root object of `resource`.
pub(crate) async fn emit_node(
    parameters: &Parameters,
    linked: &Linked,
    resource: &dyn Resource,
    selection: &FieldSelection,
    node: JsonNode,
) -> ApiResult<serde_json::Value> {
    let emitter = Emitter {
        parameters,
        linked,
        resource,
        pruned: AtomicBool::new(false),
    };
    let filter = (!selection.is_everything()).then(|| selection.root());
    let mut json = emitter.walk(node, filter).await?;

    if emitter.pruned.load(Ordering::Relaxed) {
        if let Some(object) = json.as_object_mut() {
            object.insert(IS_PARTIAL.to_string(), serde_json::Value::Bool(true));
        }
    }
    Ok(json)
}

/// Serializes one value of `resource`.
pub(crate) async fn emit_value(
    parameters: &Parameters,
    linked: &Linked,
    resource: &dyn Resource,
    selection: &FieldSelection,
    value: &Value,
) -> ApiResult<serde_json::Value> {
    let node = resource.json(parameters, value).await?;
    emit_node(parameters, linked, resource, selection, node).await
}

/// Serializes several values, dropping the ones whose resource skipped them.
///
/// Returns the serialized values with the JSON emitted for each, in input
/// order.
pub(crate) async fn reduce_values(
    parameters: &Parameters,
    linked: &Linked,
    resource: &dyn Resource,
    selection: &FieldSelection,
    values: &[Value],
) -> ApiResult<Vec<(Value, serde_json::Value)>> {
    let emitted = try_join_all(values.iter().map(|value| async move {
        match emit_value(parameters, linked, resource, selection, value).await {
            Ok(json) => Ok(Some((value.clone(), json))),
            Err(error) if error.is_skipped() => {
                trace!(id = value.id(), %error, "skipped value");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }))
    .await?;
    Ok(emitted.into_iter().flatten().collect())
}
