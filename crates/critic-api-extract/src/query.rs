//! Query string access.
//!
//! [`QueryString`] is the raw, multi-valued parameter mapping of a request.
//! [`Query`] layers the resource scope on top: while a resource scope is open,
//! `name[<resource>]` takes precedence over plain `name`.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;

use critic_api_core::{ApiError, ApiResult};

/// Multi-valued, case-sensitive query parameters in request order.
///
/// # Example
///
/// ```rust
/// use critic_api_extract::QueryString;
///
/// let query = QueryString::parse("include=users&include=reviews&q=rust+lang").unwrap();
/// assert_eq!(query.get("include"), Some("users"));
/// assert_eq!(query.get_all("include").collect::<Vec<_>>(), vec!["users", "reviews"]);
/// assert_eq!(query.get("q"), Some("rust lang"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    /// Parses a URL-encoded query string.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the query string is malformed.
    pub fn parse(query: &str) -> ApiResult<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| ApiError::usage(format!("Invalid query string: {e}")))?;
        Ok(Self { pairs })
    }

    /// Returns the first value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value of a parameter.
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + 'n
    where
        'a: 'n,
    {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if the parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over all parameters in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Query parameters with resource-scoped lookups.
#[derive(Debug)]
pub struct Query {
    raw: QueryString,
    scope: Mutex<Option<String>>,
}

/// Guard for an open resource scope; closes the scope when dropped.
#[must_use = "the resource scope closes as soon as the guard is dropped"]
pub struct QueryScope<'a> {
    query: &'a Query,
}

impl Drop for QueryScope<'_> {
    fn drop(&mut self) {
        *self.query.scope.lock() = None;
    }
}

impl fmt::Debug for QueryScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryScope")
            .field("resource", &self.query.scope())
            .finish()
    }
}

impl Query {
    /// Wraps raw query parameters.
    #[must_use]
    pub fn new(raw: QueryString) -> Self {
        Self {
            raw,
            scope: Mutex::new(None),
        }
    }

    /// Returns the raw parameters.
    #[must_use]
    pub const fn raw(&self) -> &QueryString {
        &self.raw
    }

    /// Returns the resource whose scope is currently open.
    #[must_use]
    pub fn scope(&self) -> Option<String> {
        self.scope.lock().clone()
    }

    /// Opens a resource scope.
    ///
    /// # Errors
    ///
    /// Opening a scope while another one is open is a programming error and
    /// fails with an internal error.
    pub fn enter_scope(&self, resource: &str) -> ApiResult<QueryScope<'_>> {
        let mut scope = self.scope.lock();
        if let Some(current) = scope.as_deref() {
            return Err(ApiError::internal(format!(
                "cannot open scope for {resource}: scope for {current} already open"
            )));
        }
        *scope = Some(resource.to_string());
        Ok(QueryScope { query: self })
    }

    /// Looks up a parameter, preferring `name[<resource>]` inside a scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(resource) = self.scope() {
            if let Some(value) = self.raw.get(&format!("{name}[{resource}]")) {
                return Some(value.to_string());
            }
        }
        self.raw.get(name).map(ToString::to_string)
    }

    /// Looks up a parameter, falling back to a default.
    #[must_use]
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Looks up a parameter and converts it.
    ///
    /// # Errors
    ///
    /// A failed conversion is a usage error naming the parameter.
    pub fn get_with<T, E, F>(&self, name: &str, convert: F) -> ApiResult<Option<T>>
    where
        E: fmt::Display,
        F: FnOnce(&str) -> Result<T, E>,
    {
        self.get(name)
            .map(|value| {
                convert(&value).map_err(|error| {
                    ApiError::usage(format!("Invalid {name} parameter: {value:?}: {error}"))
                })
            })
            .transpose()
    }

    /// Looks up a parameter and parses it with [`FromStr`].
    pub fn get_parsed<T>(&self, name: &str) -> ApiResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get_with(name, str::parse::<T>)
    }

    /// Looks up a parameter restricted to a set of choices.
    ///
    /// # Errors
    ///
    /// A value outside `choices` is a usage error naming the parameter and
    /// listing the choices alphabetically.
    pub fn get_choice(&self, name: &str, choices: &[&str]) -> ApiResult<Option<String>> {
        match self.get(name) {
            Some(value) if !choices.contains(&value.as_str()) => {
                let mut sorted = choices.to_vec();
                sorted.sort_unstable();
                let listed = sorted
                    .iter()
                    .map(|choice| format!("{choice:?}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(ApiError::usage(format!(
                    "Invalid {name} parameter: {value:?}; must be one of {listed}"
                )))
            }
            other => Ok(other),
        }
    }
}
