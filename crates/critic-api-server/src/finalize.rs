//! Per-method handling of a resolved request.
//!
//! `GET` renders the addressed values. `POST`, `PUT` and `DELETE` call the
//! resource's mutation handler first and render whatever is left to show.

use std::collections::BTreeSet;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use critic_api_checker::{CheckContext, Converted, SingleOrMany};
use critic_api_core::{ApiError, ApiResult, ErrorKind, Value, Values};
use critic_api_router::{Linked, Operation, Parameters, Resource};

use crate::emit::{emit_value, reduce_values};
use crate::evaluator::check_value_type;
use crate::expand::finish_linked;
use crate::resolver::Resolution;

/// What a finalizer produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// A response envelope.
    Json(serde_json::Value),
    /// Nothing to render.
    NoContent,
}

/// Runs the finalizer for `method`.
///
/// Declared domain errors raised here become usage errors: the path was
/// valid, the operation was not.
pub(crate) async fn finalize(
    parameters: &Parameters,
    method: &Method,
    resolution: Resolution,
    body: Option<&serde_json::Value>,
) -> ApiResult<Outcome> {
    let Resolution { resource, values } = resolution;
    let outcome = match *method {
        Method::GET => match values {
            Some(values) => render(parameters, resource.as_ref(), values)
                .await
                .map(Outcome::Json),
            None => Err(ApiError::internal("GET request resolved to no values")),
        },
        Method::POST => create(parameters, resource.as_ref(), body).await,
        Method::PUT => update(parameters, resource.as_ref(), values, body).await,
        Method::DELETE => delete(parameters, resource.as_ref(), values).await,
        _ => Err(ApiError::usage(format!("Unsupported method: {method}"))),
    };
    outcome.map_err(|error| error.translate(resource.descriptor().exception_modules(), ErrorKind::Usage))
}

/// Renders `values` as the primary result, followed by linked expansion.
pub(crate) async fn render(
    parameters: &Parameters,
    resource: &dyn Resource,
    values: Values,
) -> ApiResult<serde_json::Value> {
    let name = resource.descriptor().name();
    parameters.set_primary_resource_type(name);
    let selection = parameters.fields_for_type(name)?;
    let linked = Linked::new(parameters);

    let phase = parameters.trace().phase("reduce");
    let (rendered, primary) = match values {
        Values::Single(value) if !parameters.output_format().is_static() => {
            let json = emit_value(parameters, &linked, resource, &selection, &value)
                .await
                .map_err(|error| {
                    if error.is_skipped() {
                        ApiError::path(format!("Resource not found: {name}/{}", value.id()))
                    } else {
                        error
                    }
                })?;
            (json, BTreeSet::from([value]))
        }
        values => {
            let values: Vec<Value> = values.into_iter().collect();
            let reduced = reduce_values(parameters, &linked, resource, &selection, &values).await?;
            let primary = reduced.iter().map(|(value, _)| value.clone()).collect();
            let objects = reduced.into_iter().map(|(_, json)| json).collect();
            (serde_json::Value::Array(objects), primary)
        }
    };
    phase.finish();

    let mut envelope = serde_json::Map::new();
    envelope.insert(name.to_string(), rendered);
    if !parameters.include().is_empty() {
        let expanded = finish_linked(parameters, linked, &primary).await?;
        envelope.insert("linked".to_string(), expanded);
    }
    Ok(serde_json::Value::Object(envelope))
}

fn require_operation(
    parameters: &Parameters,
    resource: &dyn Resource,
    operation: Operation,
) -> ApiResult<()> {
    let descriptor = resource.descriptor();
    if !descriptor.supports(operation) {
        return Err(ApiError::usage(format!(
            "Resource {} does not support {} requests",
            descriptor.name(),
            operation.method()
        )));
    }
    if !descriptor.allows_anonymous(operation) && parameters.critic().is_anonymous() {
        return Err(ApiError::usage("Sign-in required"));
    }
    Ok(())
}

fn check_values(resource: &dyn Resource, values: &Values) -> ApiResult<()> {
    values
        .iter()
        .try_for_each(|value| check_value_type(resource, value))
}

fn check_context(parameters: &Parameters) -> CheckContext {
    CheckContext::new(Arc::clone(parameters.critic()))
}

async fn create(
    parameters: &Parameters,
    resource: &dyn Resource,
    body: Option<&serde_json::Value>,
) -> ApiResult<Outcome> {
    require_operation(parameters, resource, Operation::Create)?;
    let body = body.ok_or_else(|| ApiError::usage("Missing request body"))?;
    let name = resource.descriptor().name();

    let documents = match parameters
        .registry()
        .inputs(name)
        .and_then(|inputs| inputs.create.as_ref())
    {
        Some(checker) => {
            let mut context = check_context(parameters);
            match checker.convert_single_or_many(&mut context, body, name).await? {
                SingleOrMany::Single(document) => vec![document],
                SingleOrMany::Many(documents) => documents,
            }
        }
        None => vec![Converted::Raw(body.clone())],
    };
    debug!(resource = name, count = documents.len(), "creating");

    let mut documents = documents.into_iter();
    let created = match (documents.next(), documents.len()) {
        (Some(document), 0) => resource.create(parameters, document).await?,
        (first, _) => {
            let mut created = Vec::new();
            for document in first.into_iter().chain(documents) {
                created.extend(resource.create(parameters, document).await?);
            }
            Values::Multiple(created)
        }
    };
    check_values(resource, &created)?;

    render(parameters, resource, created).await.map(Outcome::Json)
}

async fn update(
    parameters: &Parameters,
    resource: &dyn Resource,
    values: Option<Values>,
    body: Option<&serde_json::Value>,
) -> ApiResult<Outcome> {
    let body = body.ok_or_else(|| ApiError::usage("Missing request body"))?;
    let name = resource.descriptor().name();
    let inputs = parameters.registry().inputs(name);

    let values = match values {
        None => {
            require_operation(parameters, resource, Operation::UpdateMany)?;
            let documents = match inputs.and_then(|inputs| inputs.update_many.as_ref()) {
                Some(checker) => {
                    checker
                        .convert_many(&mut check_context(parameters), body)
                        .await?
                }
                None => body
                    .as_array()
                    .ok_or_else(|| ApiError::usage("Expected a list of updates"))?
                    .iter()
                    .cloned()
                    .map(Converted::Raw)
                    .collect(),
            };
            debug!(resource = name, count = documents.len(), "updating many");
            let updated = resource.update_many(parameters, documents).await?;
            check_values(resource, &updated)?;
            updated
        }
        Some(values) => {
            require_operation(parameters, resource, Operation::Update)?;
            let document = match inputs.and_then(|inputs| inputs.update.as_ref()) {
                Some(checker) => checker.convert_in(&mut check_context(parameters), body).await?,
                None => Converted::Raw(body.clone()),
            };
            debug!(resource = name, count = values.len(), "updating");
            resource.update(parameters, &values, document).await?;
            values
        }
    };

    render(parameters, resource, values).await.map(Outcome::Json)
}

async fn delete(
    parameters: &Parameters,
    resource: &dyn Resource,
    values: Option<Values>,
) -> ApiResult<Outcome> {
    require_operation(parameters, resource, Operation::Delete)?;
    let values = values.ok_or_else(|| ApiError::internal("DELETE request resolved to no values"))?;
    let name = resource.descriptor().name();
    let static_format = parameters.output_format().is_static();

    let deleted_ids: Vec<serde_json::Value> = if static_format {
        values.iter().map(|value| resource.resource_id(value)).collect()
    } else {
        Vec::new()
    };
    debug!(resource = name, count = values.len(), "deleting");

    match resource.delete(parameters, &values).await? {
        Some(remaining) => render(parameters, resource, remaining)
            .await
            .map(Outcome::Json),
        None if static_format => {
            parameters.set_primary_resource_type(name);
            let mut deleted = serde_json::Map::new();
            deleted.insert(name.to_string(), serde_json::Value::Array(deleted_ids));

            let mut envelope = serde_json::Map::new();
            envelope.insert("deleted".to_string(), serde_json::Value::Object(deleted));
            if !parameters.include().is_empty() {
                let linked = Linked::new(parameters);
                let expanded = finish_linked(parameters, linked, &BTreeSet::new()).await?;
                envelope.insert("linked".to_string(), expanded);
            }
            Ok(Outcome::Json(serde_json::Value::Object(envelope)))
        }
        None => Ok(Outcome::NoContent),
    }
}
