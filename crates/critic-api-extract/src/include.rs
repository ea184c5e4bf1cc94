//! The `include` parameter.
//!
//! `include=users:limit=10,reviews` asks for linked `users` (at most ten)
//! and linked `reviews`.

use std::collections::BTreeMap;

use critic_api_core::{ApiError, ApiResult};

/// Options attached to one included resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Upper bound on emitted linked objects of this type.
    pub limit: Option<usize>,
    /// Any other option, stored verbatim; bare flags map to `None`.
    pub flags: BTreeMap<String, Option<String>>,
}

/// Parsed `include` parameter: resource type → options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Includes {
    types: BTreeMap<String, IncludeOptions>,
}

impl Includes {
    /// Parses every value of the `include` parameter.
    ///
    /// # Errors
    ///
    /// Returns a usage error for a `limit` that is not a non-negative integer.
    ///
    /// # Example
    ///
    /// ```rust
    /// use critic_api_extract::Includes;
    ///
    /// let includes = Includes::parse(["users:limit=2,reviews:full"]).unwrap();
    /// assert_eq!(includes.get("users").unwrap().limit, Some(2));
    /// assert!(includes.get("reviews").unwrap().flags.contains_key("full"));
    /// assert!(includes.get("comments").is_none());
    /// ```
    pub fn parse<'a, I>(values: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut types = BTreeMap::new();

        for item in values
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
        {
            let mut parts = item.split(':');
            let resource_type = parts.next().unwrap_or_default().to_string();
            let mut options = IncludeOptions::default();

            for option in parts.filter(|option| !option.is_empty()) {
                let (key, value) = match option.split_once('=') {
                    Some((key, value)) => (key, Some(value)),
                    None => (option, None),
                };
                if key == "limit" {
                    let limit = value.unwrap_or_default();
                    options.limit = Some(limit.parse().map_err(|_| {
                        ApiError::usage(format!(
                            "Invalid include parameter: {item:?}: limit must be an integer, got {limit:?}"
                        ))
                    })?);
                } else {
                    options
                        .flags
                        .insert(key.to_string(), value.map(ToString::to_string));
                }
            }

            types.insert(resource_type, options);
        }

        Ok(Self { types })
    }

    /// Returns the options for a resource type, if it is included.
    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<&IncludeOptions> {
        self.types.get(resource_type)
    }

    /// Returns `true` if the resource type is included.
    #[must_use]
    pub fn contains(&self, resource_type: &str) -> bool {
        self.types.contains_key(resource_type)
    }

    /// Returns `true` if nothing is included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over included types in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IncludeOptions)> {
        self.types.iter().map(|(name, options)| (name.as_str(), options))
    }
}
