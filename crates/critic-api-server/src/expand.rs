//! Linked expansion.
//!
//! References collected while emitting the primary result are serialized in
//! rounds. Each round can discover further references, which feed the next
//! round, until a round discovers nothing new.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use critic_api_core::{ApiError, ApiResult, Value};
use critic_api_router::{Linked, Parameters};

use crate::emit::{reduce_values, sort_objects};

/// Marker replacing a type's list once its `limit` would be exceeded.
pub(crate) const LIMITED: &str = "limited";

/// Runs the fix-point over `collected`, plus whatever handlers recorded on
/// [`Parameters::linked`], and renders the envelope's `linked` object.
///
/// Every included type gets an entry, possibly an empty list. Values in
/// `primary` are never emitted under the primary resource type.
pub(crate) async fn finish_linked(
    parameters: &Parameters,
    collected: Linked,
    primary: &BTreeSet<Value>,
) -> ApiResult<serde_json::Value> {
    let include = parameters.include();
    let primary_type = parameters.primary_resource_type();

    let mut objects: BTreeMap<String, Vec<serde_json::Value>> = include
        .iter()
        .map(|(resource_type, _)| (resource_type.to_string(), Vec::new()))
        .collect();
    let mut limited: BTreeSet<String> = BTreeSet::new();
    let mut seen: BTreeMap<String, BTreeSet<Value>> = BTreeMap::new();

    let mut pending = collected.take();
    for (resource_type, values) in parameters.linked().take() {
        pending.entry(resource_type).or_default().extend(values);
    }
    let mut round = 0_usize;
    while pending.values().any(|values| !values.is_empty()) {
        let _phase = parameters.trace().phase(format!("linked[{round}]"));
        let next = Linked::new(parameters);

        for (resource_type, values) in pending {
            if limited.contains(&resource_type) {
                continue;
            }

            let already = seen.entry(resource_type.clone()).or_default();
            let mut new: BTreeSet<Value> = values.difference(already).cloned().collect();
            if new.is_empty() {
                continue;
            }

            let limit = include.get(&resource_type).and_then(|options| options.limit);
            if limit.is_some_and(|limit| already.len() + new.len() > limit) {
                debug!(resource_type, ?limit, "linked objects limited");
                limited.insert(resource_type);
                continue;
            }

            if primary_type.as_deref() == Some(resource_type.as_str()) {
                new.retain(|value| !primary.contains(value));
            }

            let resource = parameters
                .registry()
                .resource(&resource_type)
                .cloned()
                .ok_or_else(|| {
                    ApiError::internal(format!("linked values of unknown type {resource_type}"))
                })?;
            let selection = parameters.fields_for_type(&resource_type)?;
            let values: Vec<Value> = new.iter().cloned().collect();
            debug!(resource_type, round, count = values.len(), "emitting linked objects");

            let emitted =
                reduce_values(parameters, &next, resource.as_ref(), &selection, &values).await?;
            objects
                .entry(resource_type)
                .or_default()
                .extend(emitted.into_iter().map(|(_, json)| json));
            already.extend(new);
        }

        pending = next.take();
        round += 1;
    }

    let mut linked = serde_json::Map::new();
    for (resource_type, mut list) in objects {
        if limited.contains(&resource_type) {
            linked.insert(resource_type, serde_json::Value::from(LIMITED));
            continue;
        }
        if let Some(resource) = parameters.registry().resource(&resource_type) {
            sort_objects(resource.as_ref(), &mut list);
        }
        linked.insert(resource_type, serde_json::Value::Array(list));
    }
    Ok(serde_json::Value::Object(linked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use critic_api_extract::FieldSelection;

    use crate::emit::emit_value;
    use crate::testing::{parameters, Store};

    /// Emits `values` of `resource_type` as the primary result and expands.
    async fn expand(query: &str, resource_type: &str, values: Vec<Value>) -> serde_json::Value {
        let parameters = parameters(query);
        parameters.set_primary_resource_type(resource_type);
        let resource = parameters.registry().resource(resource_type).unwrap().clone();
        let selection = parameters.fields_for_type(resource_type).unwrap();
        let linked = Linked::new(&parameters);
        for value in &values {
            emit_value(&parameters, &linked, resource.as_ref(), &selection, value)
                .await
                .unwrap();
        }
        let primary = values.into_iter().collect();
        finish_linked(&parameters, linked, &primary).await.unwrap()
    }

    fn review(id: i64) -> Value {
        Store::sample().review(id).unwrap()
    }

    fn ids(list: &serde_json::Value) -> Vec<i64> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|object| object["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_linked_sorted_by_id() {
        let linked = expand("include=users", "reviews", vec![review(7)]).await;
        assert_eq!(ids(&linked["users"]), vec![1, 2, 3]);
        assert_eq!(linked["users"][0], json!({"id": 1, "name": "alice", "email": "a@e"}));
    }

    #[tokio::test]
    async fn test_limit_exceeded_marks_type() {
        let linked = expand("include=users:limit=2", "reviews", vec![review(7)]).await;
        assert_eq!(linked, json!({"users": "limited"}));

        let linked = expand("include=users:limit=3", "reviews", vec![review(7)]).await;
        assert_eq!(ids(&linked["users"]), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_expansion_follows_references_transitively() {
        let comment = Value::new(Store::sample().comments[&101].clone());
        let linked = expand("include=users,reviews", "comments", vec![comment]).await;
        assert_eq!(ids(&linked["reviews"]), vec![7]);
        assert_eq!(ids(&linked["users"]), vec![1, 2, 3]);
    }

    /// Emits comment 101 while reviews are the primary type.
    async fn expand_from_comment(primary: BTreeSet<Value>) -> serde_json::Value {
        let parameters = parameters("include=reviews");
        parameters.set_primary_resource_type("reviews");
        let comments = parameters.registry().resource("comments").unwrap().clone();
        let comment = Value::new(Store::sample().comments[&101].clone());
        let linked = Linked::new(&parameters);
        emit_value(
            &parameters,
            &linked,
            comments.as_ref(),
            &FieldSelection::all(),
            &comment,
        )
        .await
        .unwrap();
        finish_linked(&parameters, linked, &primary).await.unwrap()
    }

    #[tokio::test]
    async fn test_primary_values_not_repeated() {
        let linked = expand_from_comment(BTreeSet::new()).await;
        assert_eq!(ids(&linked["reviews"]), vec![7]);

        let linked = expand_from_comment([review(7)].into()).await;
        assert_eq!(linked, json!({"reviews": []}));
    }

    #[tokio::test]
    async fn test_values_recorded_by_handlers_expanded() {
        let parameters = parameters("include=reviews,users");
        parameters.add_linked(&review(8)).unwrap();

        let linked = finish_linked(&parameters, Linked::new(&parameters), &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(ids(&linked["reviews"]), vec![8]);
        assert_eq!(ids(&linked["users"]), vec![1]);
        assert!(parameters.linked().is_empty());
    }

    #[tokio::test]
    async fn test_included_types_listed_even_when_empty() {
        let linked = expand("include=comments", "reviews", vec![review(8)]).await;
        assert_eq!(linked, json!({"comments": []}));
    }

    #[tokio::test]
    async fn test_linked_types_ignore_primary_fields() {
        let linked = expand("include=users&fields=owner", "reviews", vec![review(7)]).await;
        assert_eq!(linked["users"], json!([{"id": 3, "name": "carol", "email": "c@e"}]));

        let linked = expand(
            "include=users&fields[users]=name",
            "reviews",
            vec![review(7)],
        )
        .await;
        assert_eq!(linked["users"][0], json!({"name": "alice", "is_partial": true}));
    }
}
