//! Built-in checkers.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;

use critic_api_core::{ApiResult, FetchById, Value};

use crate::checker::{CheckContext, Checker};
use crate::converted::Converted;

/// Accepts anything and keeps it as-is.
#[derive(Debug, Default)]
pub struct AnyChecker;

#[async_trait]
impl Checker for AnyChecker {
    fn expected_type(&self) -> String {
        "any value".to_string()
    }

    fn check_compatibility(&self, _value: &serde_json::Value) -> bool {
        true
    }

    async fn convert(&self, _context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        Ok(Converted::Raw(value.clone()))
    }
}

/// Accepts integers, optionally bounded.
#[derive(Debug, Default)]
pub struct IntegerChecker {
    min: Option<i64>,
    max: Option<i64>,
}

impl IntegerChecker {
    /// Any integer.
    #[must_use]
    pub const fn new() -> Self {
        Self { min: None, max: None }
    }

    /// Integers of at least one.
    #[must_use]
    pub const fn positive() -> Self {
        Self { min: Some(1), max: None }
    }

    /// Integers of at least zero.
    #[must_use]
    pub const fn non_negative() -> Self {
        Self { min: Some(0), max: None }
    }

    /// Integers within `min..=max`.
    #[must_use]
    pub const fn range(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

#[async_trait]
impl Checker for IntegerChecker {
    fn expected_type(&self) -> String {
        match (self.min, self.max) {
            (Some(1), None) => "positive integer".to_string(),
            (Some(0), None) => "non-negative integer".to_string(),
            (Some(min), Some(max)) => format!("integer in range [{min}, {max}]"),
            (Some(min), None) => format!("integer >= {min}"),
            (None, Some(max)) => format!("integer <= {max}"),
            (None, None) => "integer".to_string(),
        }
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_i64()
    }

    async fn check(&self, _context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        let value = value.as_i64()?;
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            return Some(format!("expected {}, got {value}", self.expected_type()));
        }
        None
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        value
            .as_i64()
            .map(Converted::Integer)
            .ok_or_else(|| context.error("expected integer"))
    }
}

/// Accepts any number.
#[derive(Debug, Default)]
pub struct FloatChecker;

#[async_trait]
impl Checker for FloatChecker {
    fn expected_type(&self) -> String {
        "float".to_string()
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_number()
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        value
            .as_f64()
            .map(Converted::Float)
            .ok_or_else(|| context.error("expected float"))
    }
}

/// Accepts booleans.
#[derive(Debug, Default)]
pub struct BooleanChecker;

#[async_trait]
impl Checker for BooleanChecker {
    fn expected_type(&self) -> String {
        "boolean".to_string()
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_boolean()
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        value
            .as_bool()
            .map(Converted::Bool)
            .ok_or_else(|| context.error("expected boolean"))
    }
}

/// Accepts strings, optionally with a minimum length or a pattern.
#[derive(Debug, Default)]
pub struct StringChecker {
    min_length: usize,
    pattern: Option<Regex>,
}

impl StringChecker {
    /// Any string.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_length: 0,
            pattern: None,
        }
    }

    /// Strings of at least one character.
    #[must_use]
    pub const fn non_empty() -> Self {
        Self {
            min_length: 1,
            pattern: None,
        }
    }

    /// Strings matching `pattern` in full.
    #[must_use]
    pub fn matching(pattern: Regex) -> Self {
        Self {
            min_length: 0,
            pattern: Some(pattern),
        }
    }
}

#[async_trait]
impl Checker for StringChecker {
    fn expected_type(&self) -> String {
        match &self.pattern {
            Some(pattern) => format!("string matching /{}/", pattern.as_str()),
            None if self.min_length > 0 => "non-empty string".to_string(),
            None => "string".to_string(),
        }
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_string()
    }

    async fn check(&self, _context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        let text = value.as_str()?;
        if text.chars().count() < self.min_length {
            return Some("empty string not allowed".to_string());
        }
        if let Some(pattern) = &self.pattern {
            let full = pattern
                .find(text)
                .is_some_and(|found| found.start() == 0 && found.end() == text.len());
            if !full {
                return Some(format!(
                    "{text:?} does not match /{}/",
                    pattern.as_str()
                ));
            }
        }
        None
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        value
            .as_str()
            .map(|text| Converted::String(text.to_string()))
            .ok_or_else(|| context.error("expected string"))
    }
}

/// Accepts one of a fixed set of strings.
#[derive(Debug)]
pub struct EnumerationChecker {
    choices: BTreeSet<String>,
}

impl EnumerationChecker {
    /// Creates an enumeration.
    pub fn new<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    fn listed(&self) -> String {
        self.choices
            .iter()
            .map(|choice| format!("{choice:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl Checker for EnumerationChecker {
    fn expected_type(&self) -> String {
        format!("one of {}", self.listed())
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_string()
    }

    async fn check(&self, _context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        let text = value.as_str()?;
        (!self.choices.contains(text))
            .then(|| format!("{text:?} is not one of {}", self.listed()))
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        value
            .as_str()
            .map(|text| Converted::String(text.to_string()))
            .ok_or_else(|| context.error("expected string"))
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.choices
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect(),
        )
    }
}

/// Accepts a list whose items all pass `item`.
#[derive(Debug)]
pub struct ListChecker {
    item: Arc<dyn Checker>,
}

impl ListChecker {
    /// Creates a list checker.
    #[must_use]
    pub fn new(item: Arc<dyn Checker>) -> Self {
        Self { item }
    }
}

#[async_trait]
impl Checker for ListChecker {
    fn expected_type(&self) -> String {
        format!("list of {}", self.item.expected_type())
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_array()
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
        run_each(self.item.as_ref(), context, items)
            .await
            .map(Converted::List)
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Array(vec![self.item.describe()])
    }
}

/// Accepts any of several alternatives; the first compatible one converts.
#[derive(Debug)]
pub struct VariantChecker {
    alternatives: Vec<Arc<dyn Checker>>,
}

impl VariantChecker {
    /// Creates a variant checker.
    #[must_use]
    pub fn new(alternatives: Vec<Arc<dyn Checker>>) -> Self {
        Self { alternatives }
    }

    fn matching(&self, value: &serde_json::Value) -> Option<&dyn Checker> {
        self.alternatives
            .iter()
            .find(|alternative| alternative.check_compatibility(value))
            .map(|alternative| &**alternative)
    }
}

#[async_trait]
impl Checker for VariantChecker {
    /// The expected types of all alternatives, alphabetically.
    fn expected_type(&self) -> String {
        let expected: BTreeSet<String> = self
            .alternatives
            .iter()
            .map(|alternative| alternative.expected_type())
            .collect();
        expected.into_iter().collect::<Vec<_>>().join(" or ")
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        self.matching(value).is_some()
    }

    async fn check(&self, context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        match self.matching(value) {
            Some(alternative) => alternative.check(context, value).await,
            None => Some(format!("expected {}", self.expected_type())),
        }
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        match self.matching(value) {
            Some(alternative) => {
                let converted = alternative.convert(context, value).await?;
                alternative.process(context, &converted).await?;
                Ok(converted)
            }
            None => Err(context.error(format!("expected {}", self.expected_type()))),
        }
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.alternatives
                .iter()
                .map(|alternative| alternative.describe())
                .collect(),
        )
    }
}

/// Whether an object attribute may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// `name`: omission is an input error.
    Required,
    /// `name?`: may be omitted.
    Optional,
    /// `name=null`: may be omitted and then converts to null.
    DefaultNull,
}

/// One attribute of an [`ObjectChecker`].
#[derive(Debug, Clone)]
pub struct Attribute {
    /// The attribute name, without decorations.
    pub name: String,
    /// Whether it may be omitted.
    pub presence: Presence,
    /// `name!`: checked before unprioritized siblings.
    pub prioritized: bool,
    /// The checker for its value.
    pub checker: Arc<dyn Checker>,
}

impl Attribute {
    /// The decorated key this attribute was declared with.
    #[must_use]
    pub fn key(&self) -> String {
        let mut key = self.name.clone();
        match self.presence {
            Presence::Required => {}
            Presence::Optional => key.push('?'),
            Presence::DefaultNull => key.push_str("=null"),
        }
        if self.prioritized {
            key.push('!');
        }
        key
    }
}

/// Accepts an object with declared attributes.
#[derive(Debug)]
pub struct ObjectChecker {
    attributes: Vec<Attribute>,
}

impl ObjectChecker {
    /// Creates an object checker; prioritized attributes are moved first.
    #[must_use]
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let (mut ordered, rest): (Vec<_>, Vec<_>) =
            attributes.into_iter().partition(|attribute| attribute.prioritized);
        ordered.extend(rest);
        Self { attributes: ordered }
    }

    /// The attributes in processing order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

#[async_trait]
impl Checker for ObjectChecker {
    fn expected_type(&self) -> String {
        "object".to_string()
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_object()
    }

    async fn check(&self, _context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        let object = value.as_object()?;
        let known: HashSet<&str> = self
            .attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect();
        let unknown: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !known.contains(key))
            .collect();
        if !unknown.is_empty() {
            return Some(format!("unexpected attributes: {}", unknown.join(", ")));
        }

        let missing: Vec<&str> = self
            .attributes
            .iter()
            .filter(|attribute| attribute.presence == Presence::Required)
            .map(|attribute| attribute.name.as_str())
            .filter(|name| !object.contains_key(*name))
            .collect();
        (!missing.is_empty()).then(|| format!("missing attributes: {}", missing.join(", ")))
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        let Some(object) = value.as_object() else {
            return Err(context.error("expected object"));
        };

        let mut converted = IndexMap::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            match object.get(&attribute.name) {
                Some(item) => {
                    let item = context
                        .run_key(attribute.checker.as_ref(), &attribute.name, item)
                        .await?;
                    converted.insert(attribute.name.clone(), item);
                }
                None => match attribute.presence {
                    Presence::DefaultNull => {
                        converted.insert(attribute.name.clone(), Converted::Null);
                    }
                    Presence::Optional => {}
                    Presence::Required => {
                        return Err(context.error(format!(
                            "missing attribute: {}",
                            attribute.name
                        )));
                    }
                },
            }
        }
        Ok(Converted::Object(converted))
    }

    fn describe(&self) -> serde_json::Value {
        let mut description = serde_json::Map::new();
        for attribute in &self.attributes {
            description.insert(attribute.key(), attribute.checker.describe());
        }
        serde_json::Value::Object(description)
    }
}

/// Accepts the positive id of a domain entity and fetches it.
///
/// A recording checker also stores the fetched value in the context under
/// the entity's type name, for later attributes to consult.
pub struct EntityChecker<T> {
    record: bool,
    entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for EntityChecker<T>
where
    T: FetchById,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityChecker")
            .field("entity", &T::TYPE_NAME)
            .field("record", &self.record)
            .finish()
    }
}

impl<T: FetchById> EntityChecker<T> {
    /// Creates an entity checker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            record: false,
            entity: PhantomData,
        }
    }

    /// Creates an entity checker that records the fetched value.
    #[must_use]
    pub const fn recording() -> Self {
        Self {
            record: true,
            entity: PhantomData,
        }
    }
}

impl<T: FetchById> Default for EntityChecker<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: FetchById> Checker for EntityChecker<T> {
    fn expected_type(&self) -> String {
        format!("{} id", T::TYPE_NAME)
    }

    fn check_compatibility(&self, value: &serde_json::Value) -> bool {
        value.is_i64()
    }

    async fn check(&self, _context: &mut CheckContext, value: &serde_json::Value) -> Option<String> {
        let id = value.as_i64()?;
        (id <= 0).then(|| format!("invalid {} id: {id}", T::TYPE_NAME))
    }

    async fn convert(&self, context: &mut CheckContext, value: &serde_json::Value) -> ApiResult<Converted> {
        let Some(id) = value.as_i64() else {
            return Err(context.error(format!("expected {}", self.expected_type())));
        };
        match T::fetch(Arc::clone(context.critic()), id).await {
            Ok(entity) => Ok(Converted::Entity(Value::new(entity))),
            Err(error) => Err(context.error(error.message)),
        }
    }

    async fn process(&self, context: &mut CheckContext, converted: &Converted) -> ApiResult<()> {
        if !self.record {
            return Ok(());
        }
        match converted.as_value() {
            Some(value) => context.deduce(T::TYPE_NAME, value.clone()),
            None => Ok(()),
        }
    }
}

/// Runs `checker` on every element of a list input.
pub(crate) async fn run_each(
    checker: &dyn Checker,
    context: &mut CheckContext,
    items: &[serde_json::Value],
) -> ApiResult<Vec<Converted>> {
    let mut converted = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        converted.push(context.run_index(checker, index, item).await?);
    }
    Ok(converted)
}
