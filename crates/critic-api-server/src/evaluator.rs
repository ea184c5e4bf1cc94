//! Calls into a resource's lookup handlers.
//!
//! Every entry point opens the resource's query scope first, so
//! `name[<resource>]` parameters apply while the handler runs.

use tracing::debug;

use critic_api_core::{ApiError, ApiResult, ErrorKind, Value, Values};
use critic_api_router::{Operation, Parameters, Resource};

/// Fails with an internal error if `value` is not one of the resource's
/// value types.
pub(crate) fn check_value_type(resource: &dyn Resource, value: &Value) -> ApiResult<()> {
    let descriptor = resource.descriptor();
    if descriptor.accepts(value.value_type()) {
        Ok(())
    } else {
        Err(ApiError::internal(format!(
            "resource {} returned a {} value",
            descriptor.name(),
            value.value_type()
        )))
    }
}

/// In static mode, declared domain errors raised while resolving become
/// path errors; otherwise they propagate untouched.
fn translate_lookup(parameters: &Parameters, resource: &dyn Resource, error: ApiError) -> ApiError {
    if parameters.output_format().is_static() {
        error.translate(resource.descriptor().exception_modules(), ErrorKind::Path)
    } else {
        error
    }
}

/// Resolves one path argument.
pub(crate) async fn evaluate_single(
    parameters: &Parameters,
    resource: &dyn Resource,
    argument: &str,
) -> ApiResult<Values> {
    let name = resource.descriptor().name();
    let _scope = parameters.for_resource(name)?;
    debug!(resource = name, argument, "evaluating single");

    let value = resource
        .single(parameters, argument)
        .await
        .map_err(|error| translate_lookup(parameters, resource, error))?;
    check_value_type(resource, &value)?;
    resource.set_as_context(parameters, &value).await?;
    Ok(Values::Single(value))
}

/// Resolves a comma separated path argument.
pub(crate) async fn evaluate_many(
    parameters: &Parameters,
    resource: &dyn Resource,
    arguments: &[String],
) -> ApiResult<Values> {
    let name = resource.descriptor().name();
    let _scope = parameters.for_resource(name)?;
    debug!(resource = name, count = arguments.len(), "evaluating many");

    let values = resource
        .many(parameters, arguments)
        .await
        .map_err(|error| translate_lookup(parameters, resource, error))?;
    for value in &values {
        check_value_type(resource, value)?;
    }
    Ok(Values::Multiple(values))
}

/// Enumerates a resource without an argument.
///
/// When the handler did not consult `offset`/`count` itself, the window is
/// applied here.
pub(crate) async fn evaluate_multiple(
    parameters: &Parameters,
    resource: &dyn Resource,
) -> ApiResult<Values> {
    let descriptor = resource.descriptor();
    let name = descriptor.name();
    if !descriptor.supports(Operation::Multiple) {
        return Err(ApiError::usage(format!("Resource {name} requires an argument")));
    }

    let _scope = parameters.for_resource(name)?;
    debug!(resource = name, "evaluating multiple");

    let values = resource
        .multiple(parameters)
        .await
        .map_err(|error| translate_lookup(parameters, resource, error))?;

    match values {
        Values::Single(value) => {
            check_value_type(resource, &value)?;
            resource.set_as_context(parameters, &value).await?;
            Ok(Values::Single(value))
        }
        Values::Multiple(values) => {
            for value in &values {
                check_value_type(resource, value)?;
            }
            if parameters.range_accessed() {
                return Ok(Values::Multiple(values));
            }

            let (begin, end) = parameters.get_range()?;
            let begin = begin.unwrap_or(0);
            let sliced = values
                .into_iter()
                .skip(begin)
                .take(end.map_or(usize::MAX, |end| end.saturating_sub(begin)))
                .collect();
            Ok(Values::Multiple(sliced))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{parameters, Review};

    #[tokio::test]
    async fn test_single_binds_context() {
        let parameters = parameters("");
        let reviews = parameters.registry().resource("reviews").unwrap().clone();

        let values = evaluate_single(&parameters, reviews.as_ref(), "7").await.unwrap();
        assert_eq!(values.get().unwrap().id(), 7);
        assert_eq!(parameters.in_context::<Review>().unwrap().id(), 7);
    }

    #[tokio::test]
    async fn test_declared_errors_translated_in_static_mode() {
        let default = parameters("");
        let reviews = default.registry().resource("reviews").unwrap().clone();
        let error = evaluate_single(&default, reviews.as_ref(), "9999")
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::Domain(_)));
        assert_eq!(error.kind(), ErrorKind::Path);

        let static_format = parameters("output_format=static");
        let error = evaluate_single(&static_format, reviews.as_ref(), "9999")
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::Path { invalid: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_multiple_is_sliced_when_handler_ignores_range() {
        let parameters = parameters("offset=1&count=2");
        let users = parameters.registry().resource("users").unwrap().clone();

        let values = evaluate_multiple(&parameters, users.as_ref()).await.unwrap();
        let ids: Vec<i64> = values.iter().map(Value::id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_multiple_required_argument() {
        let parameters = parameters("");
        let comments = parameters.registry().resource("comments").unwrap().clone();
        assert!(evaluate_multiple(&parameters, comments.as_ref()).await.is_ok());

        let sessions = parameters.registry().resource("sessions").unwrap().clone();
        let error = evaluate_multiple(&parameters, sessions.as_ref()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Usage);
        assert!(error.to_string().contains("requires an argument"));
    }
}
