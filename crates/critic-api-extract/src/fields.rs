//! Field selections.
//!
//! The `fields` query parameter selects which parts of an emitted object the
//! client wants. Its syntax is `A,B.C-D,E`: dotted paths before the `-` are
//! included, paths after it are excluded.

use std::collections::BTreeSet;

use critic_api_core::{ApiError, ApiResult};

/// Included and excluded dotted field paths.
///
/// Including `a.b.c` also includes the prefixes `a.` and `a.b.`, so the
/// intermediate objects survive filtering.
///
/// # Example
///
/// ```rust
/// use critic_api_extract::FieldSelection;
///
/// let selection = FieldSelection::parse("name,author.name-email").unwrap();
/// assert!(selection.included().contains("name"));
/// assert!(selection.included().contains("author."));
/// assert!(selection.excluded().contains("email"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    included: BTreeSet<String>,
    excluded: BTreeSet<String>,
}

impl FieldSelection {
    /// A selection that keeps everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses a `fields` parameter value.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the value contains more than one `-`.
    pub fn parse(value: &str) -> ApiResult<Self> {
        let mut parts = value.split('-');
        let included_part = parts.next().unwrap_or("");
        let excluded_part = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(ApiError::usage(format!(
                "Invalid fields parameter: {value:?}"
            )));
        }

        let mut included = BTreeSet::new();
        for field in split_fields(included_part) {
            let segments: Vec<&str> = field.split('.').collect();
            for end in 1..segments.len() {
                included.insert(format!("{}.", segments[..end].join(".")));
            }
            included.insert(field.to_string());
        }
        let excluded = split_fields(excluded_part).map(String::from).collect();

        Ok(Self { included, excluded })
    }

    /// Included paths, including the generated prefixes.
    #[must_use]
    pub const fn included(&self) -> &BTreeSet<String> {
        &self.included
    }

    /// Excluded paths.
    #[must_use]
    pub const fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// Returns `true` if the selection keeps everything.
    #[must_use]
    pub fn is_everything(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    /// Returns the filter for the root of an emitted object.
    #[must_use]
    pub fn root(&self) -> FieldFilter<'_> {
        FieldFilter {
            selection: self,
            prefix: None,
        }
    }
}

fn split_fields(part: &str) -> impl Iterator<Item = &str> {
    part.split(',').map(str::trim).filter(|field| !field.is_empty())
}

/// The outcome of checking one key against a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecision<'a> {
    /// Whether the key is emitted.
    pub include: bool,
    /// The filter for the key's value; `None` once no further selection applies.
    pub child: Option<FieldFilter<'a>>,
}

/// A position inside an emitted object, checked against a [`FieldSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter<'a> {
    selection: &'a FieldSelection,
    prefix: Option<String>,
}

impl<'a> FieldFilter<'a> {
    /// Checks whether `key` at this position is emitted.
    ///
    /// An exact match on an included path stops selection below that key.
    #[must_use]
    pub fn check(&self, key: &str) -> FieldDecision<'a> {
        let path = match &self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        };

        if self.selection.excluded.contains(&path) {
            return FieldDecision {
                include: false,
                child: None,
            };
        }

        let included = &self.selection.included;
        let (include, exact) = if included.is_empty() {
            (true, false)
        } else {
            let exact = included.contains(&path);
            (exact || included.contains(&format!("{path}.")), exact)
        };

        let child = (include && !exact).then(|| FieldFilter {
            selection: self.selection,
            prefix: Some(path),
        });

        FieldDecision { include, child }
    }

    /// Returns the dotted path of this position, if not the root.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_included_and_excluded() {
        let selection = FieldSelection::parse("A,B.C-D,E").unwrap();
        let included: Vec<&str> = selection.included().iter().map(String::as_str).collect();
        let excluded: Vec<&str> = selection.excluded().iter().map(String::as_str).collect();
        assert_eq!(included, vec!["A", "B.", "B.C"]);
        assert_eq!(excluded, vec!["D", "E"]);
    }

    #[test]
    fn test_parse_rejects_two_dashes() {
        assert!(FieldSelection::parse("a-b-c").is_err());
    }

    #[test]
    fn test_empty_selection_keeps_everything() {
        let selection = FieldSelection::parse("").unwrap();
        assert!(selection.is_everything());
        let decision = selection.root().check("anything");
        assert!(decision.include);
        assert!(decision.child.is_some());
    }

    #[test]
    fn test_exact_match_stops_filtering() {
        let selection = FieldSelection::parse("name,email").unwrap();
        let root = selection.root();

        let name = root.check("name");
        assert!(name.include);
        assert!(name.child.is_none());

        assert!(!root.check("fullname").include);
    }

    #[test]
    fn test_dotted_path_keeps_intermediate_objects() {
        let selection = FieldSelection::parse("author.name").unwrap();
        let author = selection.root().check("author");
        assert!(author.include);

        let child = author.child.unwrap();
        assert_eq!(child.path(), Some("author"));
        assert!(child.check("name").include);
        assert!(!child.check("email").include);
    }

    #[test]
    fn test_excluded_nested_path() {
        let selection = FieldSelection::parse("-author.email").unwrap();
        let author = selection.root().check("author").child.unwrap();
        assert!(author.check("name").include);
        assert!(!author.check("email").include);
    }

    proptest! {
        // Adding an included selector to a non-empty inclusion list never
        // hides a key that was visible.
        #[test]
        fn prop_adding_inclusion_is_monotone(
            fields in proptest::collection::vec("[a-c]{1,2}", 2..5),
            key in "[a-c]{1,2}",
        ) {
            let fewer = FieldSelection::parse(&fields[1..].join(",")).unwrap();
            let more = FieldSelection::parse(&fields.join(",")).unwrap();
            if fewer.root().check(&key).include {
                prop_assert!(more.root().check(&key).include);
            }
        }

        // An empty inclusion list selects every key not excluded.
        #[test]
        fn prop_no_inclusion_selects_everything(
            excluded in proptest::collection::vec("[a-c]{1,2}", 0..3),
            key in "[a-c]{1,2}",
        ) {
            let selection = FieldSelection::parse(&format!("-{}", excluded.join(","))).unwrap();
            prop_assert_eq!(selection.root().check(&key).include, !excluded.contains(&key));
        }

        // Dropping an excluded selector never hides a key that was visible.
        #[test]
        fn prop_removing_exclusion_is_monotone(
            excluded in proptest::collection::vec("[a-c]{1,2}", 1..4),
            key in "[a-c]{1,2}",
        ) {
            let full = FieldSelection::parse(&format!("-{}", excluded.join(","))).unwrap();
            let fewer = FieldSelection::parse(&format!("-{}", excluded[1..].join(","))).unwrap();
            if full.root().check(&key).include {
                prop_assert!(fewer.root().check(&key).include);
            }
        }
    }
}
