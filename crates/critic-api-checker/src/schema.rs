//! Declarative input schemas.
//!
//! A [`Schema`] is plain data. [`TypeChecker::compile`] turns it into a tree
//! of [`Checker`]s once, typically when a resource is registered, and the
//! compiled tree is reused for every request.
//!
//! # Example
//!
//! ```rust
//! use critic_api_checker::{Schema, TypeChecker};
//!
//! let schema = Schema::object([
//!     ("summary", Schema::non_empty_string()),
//!     ("description=null", Schema::String),
//!     ("state?", Schema::one_of(["open", "closed", "dropped"])),
//!     ("ids?", Schema::list(Schema::positive_integer())),
//! ]);
//!
//! let checker = TypeChecker::compile(schema).unwrap();
//! assert_eq!(
//!     checker.describe()["state?"],
//!     serde_json::json!(["closed", "dropped", "open"])
//! );
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use critic_api_core::{ApiError, ApiResult, Critic, FetchById};

use crate::builtin::{
    run_each, AnyChecker, Attribute, BooleanChecker, EntityChecker, EnumerationChecker,
    FloatChecker, IntegerChecker, ListChecker, ObjectChecker, Presence, StringChecker,
    VariantChecker,
};
use crate::checker::{run, CheckContext, Checker};
use crate::converted::Converted;

/// Errors in a schema declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A variant without alternatives.
    #[error("variant has no alternatives")]
    EmptyVariant,

    /// An enumeration without choices.
    #[error("enumeration has no choices")]
    EmptyEnumeration,

    /// An object key with an empty attribute name.
    #[error("invalid attribute key: {0:?}")]
    InvalidAttribute(String),

    /// The same attribute declared twice.
    #[error("duplicate attribute: {0}")]
    DuplicateAttribute(String),
}

/// A declarative description of acceptable input.
#[derive(Debug, Clone)]
pub enum Schema {
    /// Accepts anything.
    Any,
    /// An integer.
    Integer,
    /// A string.
    String,
    /// A boolean.
    Boolean,
    /// Any number.
    Float,
    /// One of a fixed set of strings.
    Enumeration(Vec<String>),
    /// A list whose every item matches.
    List(Box<Schema>),
    /// Any one of the alternatives; the first compatible one converts.
    Variant(Vec<Schema>),
    /// An object; keys may carry `?`, `=null` and `!` decorations.
    Object(Vec<(String, Schema)>),
    /// An explicit checker.
    Checker(Arc<dyn Checker>),
}

impl Schema {
    /// An enumeration.
    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumeration(choices.into_iter().map(Into::into).collect())
    }

    /// A list of `item`.
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    /// Any one of the alternatives.
    pub fn variant<I>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::Variant(alternatives.into_iter().collect())
    }

    /// An object with decorated keys.
    pub fn object<K, I>(attributes: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(key, schema)| (key.into(), schema))
                .collect(),
        )
    }

    /// Wraps an explicit checker.
    pub fn checker<C: Checker + 'static>(checker: C) -> Self {
        Self::Checker(Arc::new(checker))
    }

    /// The positive id of an entity, fetched during conversion.
    #[must_use]
    pub fn entity<T: FetchById>() -> Self {
        Self::checker(EntityChecker::<T>::new())
    }

    /// Like [`Schema::entity`], and records the fetched value in the check
    /// context for later attributes.
    #[must_use]
    pub fn recorded_entity<T: FetchById>() -> Self {
        Self::checker(EntityChecker::<T>::recording())
    }

    /// An integer of at least one.
    #[must_use]
    pub fn positive_integer() -> Self {
        Self::checker(IntegerChecker::positive())
    }

    /// An integer of at least zero.
    #[must_use]
    pub fn non_negative_integer() -> Self {
        Self::checker(IntegerChecker::non_negative())
    }

    /// An integer within `min..=max`.
    #[must_use]
    pub fn integer_in(min: i64, max: i64) -> Self {
        Self::checker(IntegerChecker::range(min, max))
    }

    /// A string of at least one character.
    #[must_use]
    pub fn non_empty_string() -> Self {
        Self::checker(StringChecker::non_empty())
    }

    /// A string matching `pattern` in full.
    #[must_use]
    pub fn matching(pattern: regex::Regex) -> Self {
        Self::checker(StringChecker::matching(pattern))
    }
}

fn parse_key(key: &str) -> Result<(String, Presence, bool), SchemaError> {
    let (rest, prioritized) = match key.strip_suffix('!') {
        Some(rest) => (rest, true),
        None => (key, false),
    };
    let (name, presence) = if let Some(name) = rest.strip_suffix('?') {
        (name, Presence::Optional)
    } else if let Some(name) = rest.strip_suffix("=null") {
        (name, Presence::DefaultNull)
    } else {
        (rest, Presence::Required)
    };
    if name.is_empty() || name.contains(['?', '!', '=']) {
        return Err(SchemaError::InvalidAttribute(key.to_string()));
    }
    Ok((name.to_string(), presence, prioritized))
}

fn build(schema: Schema) -> Result<Arc<dyn Checker>, SchemaError> {
    Ok(match schema {
        Schema::Any => Arc::new(AnyChecker),
        Schema::Integer => Arc::new(IntegerChecker::new()),
        Schema::String => Arc::new(StringChecker::new()),
        Schema::Boolean => Arc::new(BooleanChecker),
        Schema::Float => Arc::new(FloatChecker),
        Schema::Enumeration(choices) => {
            if choices.is_empty() {
                return Err(SchemaError::EmptyEnumeration);
            }
            Arc::new(EnumerationChecker::new(choices))
        }
        Schema::List(item) => Arc::new(ListChecker::new(build(*item)?)),
        Schema::Variant(alternatives) => {
            if alternatives.is_empty() {
                return Err(SchemaError::EmptyVariant);
            }
            Arc::new(VariantChecker::new(
                alternatives
                    .into_iter()
                    .map(build)
                    .collect::<Result<_, _>>()?,
            ))
        }
        Schema::Object(entries) => {
            let mut seen = HashSet::new();
            let mut attributes = Vec::with_capacity(entries.len());
            for (key, schema) in entries {
                let (name, presence, prioritized) = parse_key(&key)?;
                if !seen.insert(name.clone()) {
                    return Err(SchemaError::DuplicateAttribute(name));
                }
                attributes.push(Attribute {
                    name,
                    presence,
                    prioritized,
                    checker: build(schema)?,
                });
            }
            Arc::new(ObjectChecker::new(attributes))
        }
        Schema::Checker(checker) => checker,
    })
}

/// A compiled schema.
#[derive(Debug, Clone)]
pub struct TypeChecker {
    root: Arc<dyn Checker>,
}

/// The result of [`TypeChecker::convert_single_or_many`].
#[derive(Debug, Clone, PartialEq)]
pub enum SingleOrMany {
    /// The document was a single object.
    Single(Converted),
    /// The document was `{<resource>: [...]}`.
    Many(Vec<Converted>),
}

impl TypeChecker {
    /// Compiles a schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for malformed declarations.
    pub fn compile(schema: Schema) -> Result<Self, SchemaError> {
        build(schema).map(|root| Self { root })
    }

    /// The root checker.
    #[must_use]
    pub fn root(&self) -> &dyn Checker {
        self.root.as_ref()
    }

    /// Describes the accepted input.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        self.root.describe()
    }

    /// Checks and converts one input document in a fresh context.
    pub async fn convert(
        &self,
        critic: Arc<dyn Critic>,
        value: &serde_json::Value,
    ) -> ApiResult<Converted> {
        self.convert_in(&mut CheckContext::new(critic), value).await
    }

    /// Checks and converts one input document in the given context.
    pub async fn convert_in(
        &self,
        context: &mut CheckContext,
        value: &serde_json::Value,
    ) -> ApiResult<Converted> {
        run(self.root.as_ref(), context, value).await
    }

    /// Accepts either a single document or `{<resource_name>: [documents]}`.
    ///
    /// # Errors
    ///
    /// Returns an input error if any document fails to check.
    pub async fn convert_single_or_many(
        &self,
        context: &mut CheckContext,
        value: &serde_json::Value,
        resource_name: &str,
    ) -> ApiResult<SingleOrMany> {
        if let Some(object) = value.as_object() {
            if object.len() == 1 {
                if let Some(serde_json::Value::Array(items)) = object.get(resource_name) {
                    return run_each(self.root.as_ref(), context, items)
                        .await
                        .map(SingleOrMany::Many);
                }
            }
        }
        self.convert_in(context, value).await.map(SingleOrMany::Single)
    }

    /// Checks and converts a list of documents, as sent to `update_many`.
    ///
    /// # Errors
    ///
    /// Returns an input error if `value` is not a list or an item fails to check.
    pub async fn convert_many(
        &self,
        context: &mut CheckContext,
        value: &serde_json::Value,
    ) -> ApiResult<Vec<Converted>> {
        match value.as_array() {
            Some(items) => run_each(self.root.as_ref(), context, items).await,
            None => Err(context.error(format!("expected list of {}", self.root.expected_type()))),
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(error: SchemaError) -> Self {
        ApiError::internal_with_source("invalid input schema", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    use critic_api_core::{DomainError, Entity, ErrorKind, Value};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use serde_json::json;

    struct NoCritic;

    impl Critic for NoCritic {
        fn signed_in_user(&self) -> Option<Value> {
            None
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Commit(i64);

    impl Entity for Commit {
        const TYPE_NAME: &'static str = "commit";

        fn id(&self) -> i64 {
            self.0
        }
    }

    impl FetchById for Commit {
        fn fetch(_critic: Arc<dyn Critic>, id: i64) -> BoxFuture<'static, Result<Self, DomainError>> {
            async move { Ok(Commit(id)) }.boxed()
        }
    }

    fn critic() -> Arc<dyn Critic> {
        Arc::new(NoCritic)
    }

    #[test]
    fn test_parse_key_decorations() {
        assert_eq!(
            parse_key("review!").unwrap(),
            ("review".to_string(), Presence::Required, true)
        );
        assert_eq!(
            parse_key("location?").unwrap(),
            ("location".to_string(), Presence::Optional, false)
        );
        assert_eq!(
            parse_key("reply_to=null!").unwrap(),
            ("reply_to".to_string(), Presence::DefaultNull, true)
        );
        assert!(parse_key("?").is_err());
        assert!(parse_key("a?b").is_err());
    }

    #[test]
    fn test_compile_rejects_malformed_schemas() {
        assert_eq!(
            TypeChecker::compile(Schema::variant([])).unwrap_err(),
            SchemaError::EmptyVariant
        );
        assert_eq!(
            TypeChecker::compile(Schema::one_of(Vec::<String>::new())).unwrap_err(),
            SchemaError::EmptyEnumeration
        );
        assert_eq!(
            TypeChecker::compile(Schema::object([("a", Schema::Any), ("a?", Schema::Any)]))
                .unwrap_err(),
            SchemaError::DuplicateAttribute("a".into())
        );
    }

    #[tokio::test]
    async fn test_nested_error_path() {
        let checker = TypeChecker::compile(Schema::object([(
            "comments",
            Schema::list(Schema::object([("text", Schema::String)])),
        )]))
        .unwrap();

        let error = checker
            .convert(critic(), &json!({"comments": [{"text": 5}]}))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Input);
        assert_eq!(
            error.to_string(),
            "Invalid input: data.comments[0].text: expected string, got integer"
        );
    }

    #[tokio::test]
    async fn test_entities_are_fetched() {
        let checker = TypeChecker::compile(Schema::object([(
            "commits",
            Schema::list(Schema::entity::<Commit>()),
        )]))
        .unwrap();
        let converted = checker
            .convert(critic(), &json!({"commits": [10, 11]}))
            .await
            .unwrap();
        let ids: Vec<i64> = converted.field("commits").unwrap().values().iter().map(Value::id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[tokio::test]
    async fn test_conversion_is_repeatable() {
        let checker = TypeChecker::compile(Schema::object([
            ("summary", Schema::String),
            ("draft=null", Schema::Boolean),
        ]))
        .unwrap();
        let input = json!({"summary": "s"});
        let first = checker.convert(critic(), &input).await.unwrap();
        let second = checker.convert(critic(), &input).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_single_or_many() {
        let checker = TypeChecker::compile(Schema::object([("text", Schema::String)])).unwrap();
        let mut ctx = CheckContext::new(critic());

        let many = checker
            .convert_single_or_many(&mut ctx, &json!({"comments": [{"text": "a"}, {"text": "b"}]}), "comments")
            .await
            .unwrap();
        assert!(matches!(many, SingleOrMany::Many(items) if items.len() == 2));

        let single = checker
            .convert_single_or_many(&mut ctx, &json!({"text": "a"}), "comments")
            .await
            .unwrap();
        assert!(matches!(single, SingleOrMany::Single(_)));
    }

    #[tokio::test]
    async fn test_convert_many_requires_list() {
        let checker = TypeChecker::compile(Schema::Integer).unwrap();
        let mut ctx = CheckContext::new(critic());
        assert_eq!(
            checker.convert_many(&mut ctx, &json!([1, 2])).await.unwrap(),
            vec![Converted::Integer(1), Converted::Integer(2)]
        );
        assert!(checker.convert_many(&mut ctx, &json!(1)).await.is_err());
    }
}
