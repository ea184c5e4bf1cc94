//! The checker interface and the per-value pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use critic_api_core::{ApiError, ApiResult, Critic, Value};

use crate::converted::Converted;

/// One node of a compiled schema.
///
/// [`run`] drives a checker through four steps: the type gate
/// ([`check_compatibility`](Checker::check_compatibility)), extra predicates
/// ([`check`](Checker::check)), conversion ([`convert`](Checker::convert)) and
/// side effects on the context ([`process`](Checker::process)).
#[async_trait]
pub trait Checker: fmt::Debug + Send + Sync {
    /// Describes the accepted input, e.g. `integer` or `review id`.
    fn expected_type(&self) -> String;

    /// Primary type gate; a mismatch is an input error naming
    /// [`expected_type`](Checker::expected_type).
    fn check_compatibility(&self, value: &serde_json::Value) -> bool;

    /// Additional predicates. Returns a message describing the violation.
    async fn check(&self, _context: &mut CheckContext, _value: &serde_json::Value) -> Option<String> {
        None
    }

    /// Produces the converted form.
    async fn convert(
        &self,
        context: &mut CheckContext,
        value: &serde_json::Value,
    ) -> ApiResult<Converted>;

    /// Side effects once the value is converted.
    async fn process(&self, _context: &mut CheckContext, _converted: &Converted) -> ApiResult<()> {
        Ok(())
    }

    /// A JSON description of the accepted input, used in documentation.
    fn describe(&self) -> serde_json::Value {
        serde_json::Value::String(self.expected_type())
    }
}

/// One step of the context path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// State shared by every checker during one conversion.
///
/// Carries the domain handle, the values deduced so far (a prioritized
/// `review!` attribute records its review here so later siblings can consult
/// it) and the path of the value being checked, used in error messages
/// (`data.comments[0].text`).
pub struct CheckContext {
    critic: Arc<dyn Critic>,
    deduced: HashMap<String, Value>,
    path: Vec<Segment>,
}

impl fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckContext")
            .field("deduced", &self.deduced)
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl CheckContext {
    /// Creates a context rooted at `data`.
    #[must_use]
    pub fn new(critic: Arc<dyn Critic>) -> Self {
        Self {
            critic,
            deduced: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Seeds the context with a value already bound by the request, so that
    /// attribute checkers see e.g. the review addressed by the URL.
    #[must_use]
    pub fn with_deduced(mut self, name: impl Into<String>, value: Value) -> Self {
        self.deduced.insert(name.into(), value);
        self
    }

    /// Returns the domain handle.
    #[must_use]
    pub fn critic(&self) -> &Arc<dyn Critic> {
        &self.critic
    }

    /// Returns a value deduced earlier in this conversion.
    #[must_use]
    pub fn deduced(&self, name: &str) -> Option<&Value> {
        self.deduced.get(name)
    }

    /// Records a deduced value.
    ///
    /// # Errors
    ///
    /// Deducing a different value under a name that is already bound is an
    /// input error.
    pub fn deduce(&mut self, name: &str, value: Value) -> ApiResult<()> {
        match self.deduced.get(name) {
            Some(existing) if *existing != value => Err(self.error(format!(
                "conflicting {name} specified"
            ))),
            Some(_) => Ok(()),
            None => {
                self.deduced.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    /// Returns every deduced value.
    #[must_use]
    pub fn into_deduced(self) -> HashMap<String, Value> {
        self.deduced
    }

    /// The dotted path of the value being checked.
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = String::from("data");
        for segment in &self.path {
            match segment {
                Segment::Key(key) => {
                    path.push('.');
                    path.push_str(key);
                }
                Segment::Index(index) => {
                    path.push('[');
                    path.push_str(&index.to_string());
                    path.push(']');
                }
            }
        }
        path
    }

    /// An input error located at the current path.
    #[must_use]
    pub fn error(&self, message: impl fmt::Display) -> ApiError {
        ApiError::input(format!("Invalid input: {}: {message}", self.path()))
    }

    /// Checks an object attribute, extending the path with its name.
    pub async fn run_key(
        &mut self,
        checker: &dyn Checker,
        key: &str,
        value: &serde_json::Value,
    ) -> ApiResult<Converted> {
        self.path.push(Segment::Key(key.to_string()));
        let result = run(checker, self, value).await;
        self.path.pop();
        result
    }

    /// Checks a list item, extending the path with its index.
    pub async fn run_index(
        &mut self,
        checker: &dyn Checker,
        index: usize,
        value: &serde_json::Value,
    ) -> ApiResult<Converted> {
        self.path.push(Segment::Index(index));
        let result = run(checker, self, value).await;
        self.path.pop();
        result
    }
}

/// Runs one checker over one value.
pub async fn run(
    checker: &dyn Checker,
    context: &mut CheckContext,
    value: &serde_json::Value,
) -> ApiResult<Converted> {
    if !checker.check_compatibility(value) {
        return Err(context.error(format!(
            "expected {}, got {}",
            checker.expected_type(),
            describe_json(value)
        )));
    }
    if let Some(violation) = checker.check(context, value).await {
        return Err(context.error(violation));
    }

    let converted = checker.convert(context, value).await?;
    checker.process(context, &converted).await?;

    trace!(path = %context.path(), expected = %checker.expected_type(), "input checked");
    Ok(converted)
}

fn describe_json(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        serde_json::Value::Number(_) => "float",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
