//! The resource interface.

use async_trait::async_trait;

use critic_api_checker::Converted;
use critic_api_core::{ApiError, ApiResult, JsonNode, Value, Values};

use crate::descriptor::ResourceDescriptor;
use crate::parameters::Parameters;

fn not_implemented(resource: &str, handler: &str) -> ApiError {
    ApiError::internal(format!("resource {resource} does not implement {handler}"))
}

/// A registered API endpoint.
///
/// Only [`json`](Resource::json) is mandatory. The dispatcher calls the other
/// handlers only when the [`ResourceDescriptor`] lists the matching
/// [`Operation`](crate::Operation); their default bodies report an internal
/// error.
///
/// # Example
///
/// ```rust
/// use critic_api_core::{ApiError, ApiResult, Entity, JsonNode, Value};
/// use critic_api_router::{async_trait, Operation, Parameters, Resource, ResourceDescriptor};
///
/// #[derive(Debug)]
/// struct User { id: i64, name: String }
///
/// impl Entity for User {
///     const TYPE_NAME: &'static str = "user";
///     fn id(&self) -> i64 { self.id }
/// }
///
/// struct Users { descriptor: ResourceDescriptor }
///
/// #[async_trait]
/// impl Resource for Users {
///     fn descriptor(&self) -> &ResourceDescriptor {
///         &self.descriptor
///     }
///
///     async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
///         let user = value.expect_entity::<User>()?;
///         Ok(JsonNode::object([
///             ("id", JsonNode::from(user.id)),
///             ("name", JsonNode::from(user.name.clone())),
///         ]))
///     }
///
///     async fn single(&self, _parameters: &Parameters, argument: &str) -> ApiResult<Value> {
///         match argument {
///             "1" => Ok(Value::new(User { id: 1, name: "alice".into() })),
///             other => Err(ApiError::path(format!("No such user: {other}"))),
///         }
///     }
/// }
///
/// let users = Users {
///     descriptor: ResourceDescriptor::new("users")
///         .value_type::<User>()
///         .operations([Operation::Single]),
/// };
/// assert_eq!(users.descriptor().name(), "users");
/// ```
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// The static description.
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Serializes one value.
    ///
    /// May fail with [`ApiError::ResourceSkipped`] to drop the value from the
    /// output.
    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode>;

    /// Looks up the value named by a path argument.
    async fn single(&self, _parameters: &Parameters, _argument: &str) -> ApiResult<Value> {
        Err(not_implemented(self.descriptor().name(), "single"))
    }

    /// Looks up the values named by a comma separated path argument.
    async fn many(&self, parameters: &Parameters, arguments: &[String]) -> ApiResult<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.single(parameters, argument).await?);
        }
        Ok(values)
    }

    /// Enumerates values when no argument is given.
    async fn multiple(&self, _parameters: &Parameters) -> ApiResult<Values> {
        Err(not_implemented(self.descriptor().name(), "multiple"))
    }

    /// Handles `POST`.
    async fn create(&self, _parameters: &Parameters, _data: Converted) -> ApiResult<Values> {
        Err(not_implemented(self.descriptor().name(), "create"))
    }

    /// Handles `PUT` on addressed values.
    async fn update(
        &self,
        _parameters: &Parameters,
        _values: &Values,
        _data: Converted,
    ) -> ApiResult<()> {
        Err(not_implemented(self.descriptor().name(), "update"))
    }

    /// Handles `PUT` with a list body and no addressed values.
    async fn update_many(&self, _parameters: &Parameters, _data: Vec<Converted>) -> ApiResult<Values> {
        Err(not_implemented(self.descriptor().name(), "update_many"))
    }

    /// Handles `DELETE`. `None` means nothing is left to render.
    async fn delete(&self, _parameters: &Parameters, _values: &Values) -> ApiResult<Option<Values>> {
        Err(not_implemented(self.descriptor().name(), "delete"))
    }

    /// Binds a resolved value as request context for downstream resources.
    async fn set_as_context(&self, parameters: &Parameters, value: &Value) -> ApiResult<()> {
        parameters.set_context(self.descriptor().name(), value.clone());
        Ok(())
    }

    /// Deduces a value of this resource from the request; by default the
    /// value bound as context.
    async fn deduce(&self, parameters: &Parameters) -> ApiResult<Option<Value>> {
        Ok(parameters.context(self.descriptor().name()))
    }

    /// Looks up the value named by a query parameter's value.
    async fn from_parameter_value(&self, parameters: &Parameters, value: &str) -> ApiResult<Value> {
        self.single(parameters, value).await
    }

    /// Orders emitted objects of this resource; by default by `id`.
    fn sort_key(&self, object: &serde_json::Value) -> serde_json::Value {
        object.get("id").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// The scalar emitted where a value is referenced; by default its id.
    fn resource_id(&self, value: &Value) -> serde_json::Value {
        serde_json::Value::from(value.id())
    }
}
