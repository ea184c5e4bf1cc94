//! `output_format` and `debug` parameters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use critic_api_core::ApiError;

/// Shape of successful responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Single values emit as objects; DELETE without output answers 204.
    #[default]
    Default,
    /// Single values emit as one-element lists; DELETE reports what it deleted.
    Static,
}

impl OutputFormat {
    /// Every accepted parameter value.
    pub const CHOICES: [&'static str; 2] = ["default", "static"];

    /// Returns the parameter value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Static => "static",
        }
    }

    /// Returns `true` for [`OutputFormat::Static`].
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static)
    }
}

impl FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "static" => Ok(Self::Static),
            other => Err(ApiError::usage(format!(
                "Invalid output_format parameter: {other:?}; must be one of \"default\", \"static\""
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debug tags requested with `debug=<tag>[,...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugFlags {
    tags: BTreeSet<String>,
}

impl DebugFlags {
    /// Attach database query profiling.
    pub const DBQUERIES: &'static str = "dbqueries";
    /// Attach the request's timed phases.
    pub const TRACING: &'static str = "tracing";

    /// Parses every value of the `debug` parameter. Unknown tags are kept.
    pub fn parse<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tags = values
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect();
        Self { tags }
    }

    /// Returns `true` if the tag was requested.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns `true` if no tag was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("static".parse::<OutputFormat>().unwrap(), OutputFormat::Static);
        assert_eq!(
            "default".parse::<OutputFormat>().unwrap(),
            OutputFormat::Default
        );
        assert!("fancy".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Static.to_string(), "static");
    }

    #[test]
    fn test_debug_flags() {
        let flags = DebugFlags::parse(["dbqueries, tracing", "other"]);
        assert!(flags.contains(DebugFlags::DBQUERIES));
        assert!(flags.contains(DebugFlags::TRACING));
        assert!(flags.contains("other"));
        assert!(DebugFlags::parse([""]).is_empty());
    }
}
