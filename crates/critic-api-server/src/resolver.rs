//! Path resolution.
//!
//! Walks `<resource>[/<argument>][/<resource>[/<argument>]...]` left to right.
//! Every resource segment is looked up relative to the resources before it;
//! the argument following a resource that supports single lookups selects
//! one or more values, which become context for the resources after it.

use std::sync::Arc;

use http::Method;
use tracing::debug;

use critic_api_core::{ApiError, ApiResult, Values};
use critic_api_router::{Operation, Parameters, Resource};

use crate::evaluator::{evaluate_many, evaluate_multiple, evaluate_single};

/// The resource a path ends at and the values it addressed.
pub(crate) struct Resolution {
    pub(crate) resource: Arc<dyn Resource>,
    /// `None` when the request creates values instead of addressing them.
    pub(crate) values: Option<Values>,
}

/// Resolves the path segments after the version tag.
///
/// `list_body` tells whether a `PUT` carries a list, which addresses nothing
/// and updates many values at once.
pub(crate) async fn resolve(
    parameters: &Parameters,
    method: &Method,
    segments: &[&str],
    list_body: bool,
) -> ApiResult<Resolution> {
    let registry = Arc::clone(parameters.registry());
    let mut path = vec![registry.version().to_string()];
    let mut resolved = None;
    let mut index = 0;

    while index < segments.len() {
        let name = segments[index];
        index += 1;
        path.push(name.to_string());

        let (handler_path, resource) = registry.lookup(&path)?;
        debug!(segment = name, handler = handler_path, "resolved resource segment");
        let descriptor = resource.descriptor();

        let values = if index < segments.len() && descriptor.supports(Operation::Single) {
            let argument = segments[index];
            index += 1;
            let last = index == segments.len();

            let arguments: Vec<String> = argument
                .split(',')
                .map(str::trim)
                .filter(|argument| !argument.is_empty())
                .map(String::from)
                .collect();
            if arguments.is_empty() {
                return Err(ApiError::usage(format!(
                    "Empty argument for resource {}",
                    descriptor.name()
                )));
            }
            if last && method == Method::POST {
                return Err(ApiError::usage(format!(
                    "Invalid POST request: {} takes no argument",
                    descriptor.name()
                )));
            }

            let values = if let [argument] = arguments.as_slice() {
                evaluate_single(parameters, resource.as_ref(), argument).await?
            } else if last {
                evaluate_many(parameters, resource.as_ref(), &arguments).await?
            } else {
                return Err(ApiError::usage(
                    "Multiple values can only be selected in the last path segment",
                ));
            };
            Some(values)
        } else if index == segments.len()
            && (method == Method::POST || (method == Method::PUT && list_body))
        {
            None
        } else {
            Some(evaluate_multiple(parameters, resource.as_ref()).await?)
        };

        resolved = Some(Resolution { resource, values });
    }

    resolved.ok_or_else(|| ApiError::usage("No resource specified"))
}
