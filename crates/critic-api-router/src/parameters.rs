//! Per-request state handed to every resource callback.
//!
//! [`Parameters`] is created once per request by the dispatcher. It owns the
//! parsed framework parameters (`fields`, `include`, `debug`,
//! `output_format`), the values bound while walking the path, the cookie
//! changes resources request and the identity cache used by the emitter.
//!
//! Every accessor takes `&self`; mutable state sits behind `parking_lot`
//! mutexes so the emitter can serialize several values concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use critic_api_core::{
    ApiError, ApiResult, Critic, Entity, RequestId, Value, ValueKey, ValueType,
};
use critic_api_extract::{
    CookieJar, DebugFlags, FieldSelection, Includes, OutputFormat, Query, QueryScope, QueryString,
};
use critic_api_telemetry::RequestTrace;

use crate::linked::Linked;
use crate::registry::Registry;

/// Host-level defaults applied when the query leaves a parameter unset.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDefaults {
    /// Used when `output_format` is absent.
    pub output_format: OutputFormat,
    /// When `false`, the `debug` parameter is ignored.
    pub allow_debug: bool,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Default,
            allow_debug: true,
        }
    }
}

/// Per-request parameters and state.
pub struct Parameters {
    critic: Arc<dyn Critic>,
    registry: Arc<Registry>,
    query: Query,
    fields: Arc<FieldSelection>,
    fields_per_type: Mutex<HashMap<String, Arc<FieldSelection>>>,
    include: Arc<Includes>,
    debug: DebugFlags,
    output_format: OutputFormat,
    context: Mutex<HashMap<String, Value>>,
    api_object_cache: Mutex<HashMap<ValueKey, serde_json::Value>>,
    cookies: Mutex<CookieJar>,
    linked: Linked,
    primary_resource_type: Mutex<Option<String>>,
    range_accessed: AtomicBool,
    trace: RequestTrace,
    request_id: RequestId,
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("request_id", &self.request_id)
            .field("query", &self.query)
            .field("fields", &self.fields)
            .field("include", &self.include)
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

impl Parameters {
    /// Parses the framework parameters of a request.
    ///
    /// # Errors
    ///
    /// Returns a usage error for a malformed `fields`, `include` or
    /// `output_format` parameter.
    pub fn new(
        critic: Arc<dyn Critic>,
        registry: Arc<Registry>,
        raw: QueryString,
        defaults: &ParameterDefaults,
    ) -> ApiResult<Self> {
        let fields = FieldSelection::parse(raw.get("fields").unwrap_or(""))?;
        let include = Includes::parse(raw.get_all("include"))?;
        let debug = if defaults.allow_debug {
            DebugFlags::parse(raw.get_all("debug"))
        } else {
            DebugFlags::default()
        };
        let include = Arc::new(include);
        let linked = Linked::with_includes(Arc::clone(&registry), Arc::clone(&include));
        let query = Query::new(raw);
        let output_format = query
            .get_choice("output_format", &OutputFormat::CHOICES)?
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(defaults.output_format);

        Ok(Self {
            critic,
            registry,
            query,
            fields: Arc::new(fields),
            fields_per_type: Mutex::new(HashMap::new()),
            include,
            debug,
            output_format,
            context: Mutex::new(HashMap::new()),
            api_object_cache: Mutex::new(HashMap::new()),
            cookies: Mutex::new(CookieJar::new()),
            linked,
            primary_resource_type: Mutex::new(None),
            range_accessed: AtomicBool::new(false),
            trace: RequestTrace::new(),
            request_id: RequestId::new(),
        })
    }

    /// Replaces the generated request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// The domain-layer handle.
    #[must_use]
    pub fn critic(&self) -> &Arc<dyn Critic> {
        &self.critic
    }

    /// Downcasts the domain-layer handle.
    #[must_use]
    pub fn critic_as<T: Critic>(&self) -> Option<&T> {
        self.critic.downcast_ref::<T>()
    }

    /// The registry serving this request.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Query parameters, with resource-scoped lookups.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Opens the query scope of a resource.
    ///
    /// # Errors
    ///
    /// Fails with an internal error if another scope is open.
    pub fn for_resource(&self, resource: &str) -> ApiResult<QueryScope<'_>> {
        self.query.enter_scope(resource)
    }

    /// Reads `offset` and `count`.
    ///
    /// Returns `(offset, offset + count)` when both are set and
    /// `(offset, count)` otherwise.
    ///
    /// # Errors
    ///
    /// A negative `offset`, a `count` below one, or a window ending past
    /// `usize::MAX` is a usage error.
    pub fn get_range(&self) -> ApiResult<(Option<usize>, Option<usize>)> {
        self.range_accessed.store(true, Ordering::Relaxed);
        self.read_range()
    }

    fn read_range(&self) -> ApiResult<(Option<usize>, Option<usize>)> {
        let offset = self.query.get_with("offset", |value| {
            value
                .parse::<usize>()
                .map_err(|_| "must be a non-negative integer")
        })?;
        let count = self.query.get_with("count", |value| match value.parse::<usize>() {
            Ok(count) if count >= 1 => Ok(count),
            _ => Err("must be a positive integer"),
        })?;

        match (offset, count) {
            (Some(offset), Some(count)) => offset
                .checked_add(count)
                .map(|end| (Some(offset), Some(end)))
                .ok_or_else(|| ApiError::usage("Invalid offset/count")),
            other => Ok(other),
        }
    }

    /// Pushes the requested window onto the domain layer.
    ///
    /// A window is pushed only when both `offset` and `count` are given, and
    /// only then does the range count as consulted; otherwise the evaluator
    /// still slices the handler's result. The window is popped when the
    /// returned guard drops.
    ///
    /// # Errors
    ///
    /// Propagates [`Parameters::get_range`] errors.
    pub fn set_slice(&self) -> ApiResult<SliceScope<'_>> {
        let pushed = match self.read_range()? {
            (Some(offset), Some(end)) => {
                self.range_accessed.store(true, Ordering::Relaxed);
                self.critic.push_slice(offset, Some(end - offset));
                true
            }
            _ => false,
        };
        Ok(SliceScope {
            critic: self.critic.as_ref(),
            pushed,
        })
    }

    /// Returns `true` once a handler consulted `offset`/`count`.
    #[must_use]
    pub fn range_accessed(&self) -> bool {
        self.range_accessed.load(Ordering::Relaxed)
    }

    /// The unadorned `fields` selection.
    #[must_use]
    pub fn fields(&self) -> &FieldSelection {
        &self.fields
    }

    /// The field selection for objects of a resource type.
    ///
    /// `fields[<type>]` wins; otherwise the plain `fields` applies to the
    /// primary resource type only and every other type emits everything.
    ///
    /// # Errors
    ///
    /// Returns a usage error for a malformed `fields[<type>]`.
    pub fn fields_for_type(&self, resource_type: &str) -> ApiResult<Arc<FieldSelection>> {
        if let Some(cached) = self.fields_per_type.lock().get(resource_type) {
            return Ok(Arc::clone(cached));
        }

        let selection = match self.query.raw().get(&format!("fields[{resource_type}]")) {
            Some(value) => Arc::new(FieldSelection::parse(value)?),
            None if self.primary_resource_type().as_deref() == Some(resource_type) => {
                Arc::clone(&self.fields)
            }
            None => Arc::new(FieldSelection::all()),
        };

        self.fields_per_type
            .lock()
            .insert(resource_type.to_string(), Arc::clone(&selection));
        Ok(selection)
    }

    /// Resource types requested for linked expansion.
    #[must_use]
    pub fn include(&self) -> &Arc<Includes> {
        &self.include
    }

    /// Requested debug payloads.
    #[must_use]
    pub const fn debug(&self) -> &DebugFlags {
        &self.debug
    }

    /// Requested output format.
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Records the resource handling the request.
    pub fn set_primary_resource_type(&self, resource_type: &str) {
        *self.primary_resource_type.lock() = Some(resource_type.to_string());
    }

    /// The resource handling the request, once resolved.
    #[must_use]
    pub fn primary_resource_type(&self) -> Option<String> {
        self.primary_resource_type.lock().clone()
    }

    /// Binds a value for downstream resources.
    pub fn set_context(&self, resource: &str, value: Value) {
        debug!(resource, id = value.id(), "bound context value");
        self.context.lock().insert(resource.to_string(), value);
    }

    /// The value bound by a resource, if any.
    #[must_use]
    pub fn context(&self, resource: &str) -> Option<Value> {
        self.context.lock().get(resource).cloned()
    }

    /// The bound value of entity kind `T`, if any.
    #[must_use]
    pub fn in_context<T: Entity>(&self) -> Option<Value> {
        let resource = self.registry.resource_for_type(ValueType::of::<T>())?;
        self.context(resource.descriptor().name())
    }

    /// A value of kind `T` deduced from the request by its resource.
    ///
    /// # Errors
    ///
    /// Propagates the resource's `deduce` errors.
    pub async fn deduce<T: Entity>(&self) -> ApiResult<Option<Value>> {
        match self.registry.resource_for_type(ValueType::of::<T>()) {
            Some(resource) => resource.deduce(self).await,
            None => Ok(None),
        }
    }

    /// The value of kind `T` named by query parameter `name`, if present.
    ///
    /// # Errors
    ///
    /// Propagates the resource's `from_parameter_value` errors.
    pub async fn from_parameter<T: Entity>(&self, name: &str) -> ApiResult<Option<Value>> {
        let Some(argument) = self.query.get(name) else {
            return Ok(None);
        };
        match self.registry.resource_for_type(ValueType::of::<T>()) {
            Some(resource) => resource
                .from_parameter_value(self, &argument)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// The scalar previously emitted for a value.
    #[must_use]
    pub fn cached_id(&self, key: &ValueKey) -> Option<serde_json::Value> {
        self.api_object_cache.lock().get(key).cloned()
    }

    /// Remembers the scalar emitted for a value.
    pub fn cache_id(&self, key: ValueKey, id: serde_json::Value) {
        self.api_object_cache.lock().insert(key, id);
    }

    /// Requests a `Set-Cookie` on the response.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>, secure: bool) {
        self.cookies.lock().set(name, value, secure);
    }

    /// Requests that a cookie be expired.
    pub fn delete_cookie(&self, name: impl Into<String>) {
        self.cookies.lock().delete(name);
    }

    /// The cookie changes requested so far.
    #[must_use]
    pub fn cookies(&self) -> CookieJar {
        self.cookies.lock().clone()
    }

    /// Values handlers recorded for linked expansion, such as the objects a
    /// `delete` cascaded to. Drained once the primary result is rendered.
    #[must_use]
    pub const fn linked(&self) -> &Linked {
        &self.linked
    }

    /// Records `value` for linked expansion if its type is included.
    ///
    /// # Errors
    ///
    /// A value of an unregistered type is an internal error.
    pub fn add_linked(&self, value: &Value) -> ApiResult<()> {
        self.linked.add(value).map(drop)
    }

    /// Timed phases of this request.
    #[must_use]
    pub const fn trace(&self) -> &RequestTrace {
        &self.trace
    }

    /// This request's identifier.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// Guard returned by [`Parameters::set_slice`].
#[must_use = "the window is popped as soon as the guard is dropped"]
pub struct SliceScope<'a> {
    critic: &'a dyn Critic,
    pushed: bool,
}

impl SliceScope<'_> {
    /// Returns `true` if a window was pushed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.pushed
    }
}

impl fmt::Debug for SliceScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceScope")
            .field("pushed", &self.pushed)
            .finish()
    }
}

impl Drop for SliceScope<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.critic.pop_slice();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    use async_trait::async_trait;
    use critic_api_core::{ApiError, ErrorKind, JsonNode};

    use crate::descriptor::ResourceDescriptor;
    use crate::resource::Resource;

    #[derive(Default)]
    struct SliceCritic {
        slices: Mutex<Vec<(usize, Option<usize>)>>,
        popped: AtomicBool,
    }

    impl Critic for SliceCritic {
        fn signed_in_user(&self) -> Option<Value> {
            None
        }

        fn push_slice(&self, offset: usize, count: Option<usize>) {
            self.slices.lock().push((offset, count));
        }

        fn pop_slice(&self) {
            self.popped.store(true, Ordering::Relaxed);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Review(i64);

    impl Entity for Review {
        const TYPE_NAME: &'static str = "review";

        fn id(&self) -> i64 {
            self.0
        }
    }

    struct Reviews(ResourceDescriptor);

    #[async_trait]
    impl Resource for Reviews {
        fn descriptor(&self) -> &ResourceDescriptor {
            &self.0
        }

        async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
            Ok(JsonNode::object([("id", JsonNode::from(value.id()))]))
        }

        async fn single(&self, _parameters: &Parameters, argument: &str) -> ApiResult<Value> {
            argument
                .parse()
                .map(|id| Value::new(Review(id)))
                .map_err(|_| ApiError::usage("bad review id"))
        }
    }

    fn parameters(query: &str) -> ApiResult<Parameters> {
        parameters_with(Arc::new(SliceCritic::default()), query)
    }

    fn parameters_with(critic: Arc<dyn Critic>, query: &str) -> ApiResult<Parameters> {
        let registry = Registry::builder("v1")
            .register(Reviews(
                ResourceDescriptor::new("reviews").value_type::<Review>(),
            ))
            .build()
            .unwrap();
        Parameters::new(
            critic,
            registry,
            QueryString::parse(query)?,
            &ParameterDefaults::default(),
        )
    }

    #[test]
    fn test_framework_parameters_parsed() {
        let parameters =
            parameters("fields=name&include=users:limit=2&debug=tracing&output_format=static")
                .unwrap();
        assert!(parameters.fields().included().contains("name"));
        assert_eq!(parameters.include().get("users").unwrap().limit, Some(2));
        assert!(parameters.debug().contains(DebugFlags::TRACING));
        assert!(parameters.output_format().is_static());
    }

    #[test]
    fn test_invalid_output_format() {
        let error = parameters("output_format=xml").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Usage);
        assert!(error.to_string().contains("output_format"));
    }

    #[test]
    fn test_debug_ignored_when_disallowed() {
        let registry = Registry::builder("v1").build().unwrap();
        let parameters = Parameters::new(
            Arc::new(SliceCritic::default()),
            registry,
            QueryString::parse("debug=dbqueries").unwrap(),
            &ParameterDefaults {
                output_format: OutputFormat::Static,
                allow_debug: false,
            },
        )
        .unwrap();
        assert!(parameters.debug().is_empty());
        assert!(parameters.output_format().is_static());
    }

    #[test]
    fn test_get_range() {
        let both = parameters("offset=10&count=5").unwrap();
        assert!(!both.range_accessed());
        assert_eq!(both.get_range().unwrap(), (Some(10), Some(15)));
        assert!(both.range_accessed());

        let count_only = parameters("count=5").unwrap();
        assert_eq!(count_only.get_range().unwrap(), (None, Some(5)));

        for query in ["offset=-1", "count=0", "count=many"] {
            let error = parameters(query).unwrap().get_range().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Usage, "{query}");
        }
    }

    #[test]
    fn test_range_end_overflow_is_usage_error() {
        let parameters = parameters("offset=18446744073709551615&count=2").unwrap();
        let error = parameters.get_range().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Usage);
        assert_eq!(error.to_string(), "Invalid offset/count");

        let error = parameters.set_slice().err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_set_slice_pushes_and_pops() {
        let critic = Arc::new(SliceCritic::default());
        let parameters = parameters_with(critic.clone(), "offset=4&count=2").unwrap();
        {
            let scope = parameters.set_slice().unwrap();
            assert!(scope.is_active());
            assert_eq!(*critic.slices.lock(), vec![(4, Some(2))]);
        }
        assert!(critic.popped.load(Ordering::Relaxed));

        assert!(parameters.range_accessed());

        for query in ["offset=4", "count=2"] {
            let critic = Arc::new(SliceCritic::default());
            let parameters = parameters_with(critic.clone(), query).unwrap();
            drop(parameters.set_slice().unwrap());
            assert!(critic.slices.lock().is_empty(), "{query}");
            assert!(!critic.popped.load(Ordering::Relaxed), "{query}");
            assert!(!parameters.range_accessed(), "{query}");
        }
    }

    #[test]
    fn test_handlers_record_linked_values() {
        let included = parameters("include=reviews").unwrap();
        assert!(included.linked().is_empty());

        included.add_linked(&Value::new(Review(4))).unwrap();
        included.add_linked(&Value::new(Review(4))).unwrap();
        let taken = included.linked().take();
        assert_eq!(taken["reviews"].len(), 1);
        assert!(included.linked().is_empty());

        let excluded = parameters("").unwrap();
        excluded.add_linked(&Value::new(Review(4))).unwrap();
        assert!(excluded.linked().is_empty());
    }

    #[test]
    fn test_fields_apply_to_primary_type_only() {
        let parameters = parameters("fields=name&fields%5Busers%5D=email").unwrap();
        parameters.set_primary_resource_type("reviews");

        assert!(parameters
            .fields_for_type("reviews")
            .unwrap()
            .included()
            .contains("name"));
        assert!(parameters
            .fields_for_type("users")
            .unwrap()
            .included()
            .contains("email"));
        assert!(parameters
            .fields_for_type("comments")
            .unwrap()
            .is_everything());
    }

    #[test]
    fn test_context_by_entity_type() {
        let parameters = parameters("").unwrap();
        assert!(parameters.in_context::<Review>().is_none());

        parameters.set_context("reviews", Value::new(Review(7)));
        assert_eq!(parameters.in_context::<Review>().unwrap().id(), 7);
    }

    #[tokio::test]
    async fn test_from_parameter_and_deduce() {
        let parameters = parameters("review=8").unwrap();
        let value = parameters.from_parameter::<Review>("review").await.unwrap();
        assert_eq!(value.unwrap().id(), 8);
        assert!(parameters
            .from_parameter::<Review>("missing")
            .await
            .unwrap()
            .is_none());

        assert!(parameters.deduce::<Review>().await.unwrap().is_none());
        parameters.set_context("reviews", Value::new(Review(3)));
        assert_eq!(parameters.deduce::<Review>().await.unwrap().unwrap().id(), 3);
    }

    #[test]
    fn test_cookies_and_cache() {
        let parameters = parameters("").unwrap();
        parameters.set_cookie("sid", "abc", true);
        parameters.delete_cookie("old");
        let jar = parameters.cookies();
        assert_eq!(jar.get("sid"), Some("abc"));
        assert!(jar.is_deleted("old"));

        let key = Value::new(Review(1)).key();
        assert!(parameters.cached_id(&key).is_none());
        parameters.cache_id(key, serde_json::json!(1));
        assert_eq!(parameters.cached_id(&key), Some(serde_json::json!(1)));
    }
}
