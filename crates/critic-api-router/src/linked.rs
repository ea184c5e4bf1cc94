//! Collection of referenced values for linked expansion.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use critic_api_core::{ApiResult, Value};
use critic_api_extract::Includes;

use crate::parameters::Parameters;
use crate::registry::Registry;
use crate::resource::Resource;

/// References discovered while emitting, grouped by resource type.
///
/// Only values whose resource type is listed in `include` are kept; every
/// reference is still classified so the emitter can compute its scalar id.
#[derive(Debug)]
pub struct Linked {
    registry: Arc<Registry>,
    include: Arc<Includes>,
    values: Mutex<BTreeMap<String, BTreeSet<Value>>>,
}

impl Linked {
    /// An empty collector sharing the request's registry and includes.
    #[must_use]
    pub fn new(parameters: &Parameters) -> Self {
        Self::with_includes(
            Arc::clone(parameters.registry()),
            Arc::clone(parameters.include()),
        )
    }

    /// An empty collector for explicit includes.
    #[must_use]
    pub fn with_includes(registry: Arc<Registry>, include: Arc<Includes>) -> Self {
        Self {
            registry,
            include,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Classifies a referenced value and records it if its type is included.
    ///
    /// # Errors
    ///
    /// A value of an unregistered type is an internal error.
    pub fn add(&self, value: &Value) -> ApiResult<Arc<dyn Resource>> {
        let resource = self.registry.find(value)?;
        let name = resource.descriptor().name();
        if self.include.contains(name) {
            self.values
                .lock()
                .entry(name.to_string())
                .or_default()
                .insert(value.clone());
        }
        Ok(resource)
    }

    /// Returns `true` if no included value was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().values().all(BTreeSet::is_empty)
    }

    /// Recorded values of one resource type.
    #[must_use]
    pub fn get(&self, resource_type: &str) -> BTreeSet<Value> {
        self.values
            .lock()
            .get(resource_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Drains the recorded values.
    #[must_use]
    pub fn take(&self) -> BTreeMap<String, BTreeSet<Value>> {
        std::mem::take(&mut *self.values.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use critic_api_core::{Entity, ErrorKind, JsonNode};

    use crate::descriptor::ResourceDescriptor;

    #[derive(Debug)]
    struct User(i64);

    impl Entity for User {
        const TYPE_NAME: &'static str = "user";

        fn id(&self) -> i64 {
            self.0
        }
    }

    #[derive(Debug)]
    struct Branch(i64);

    impl Entity for Branch {
        const TYPE_NAME: &'static str = "branch";

        fn id(&self) -> i64 {
            self.0
        }
    }

    struct Users(ResourceDescriptor);

    #[async_trait]
    impl Resource for Users {
        fn descriptor(&self) -> &ResourceDescriptor {
            &self.0
        }

        async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
            Ok(JsonNode::object([("id", JsonNode::from(value.id()))]))
        }
    }

    fn linked(include: &str) -> Linked {
        let registry = Registry::builder("v1")
            .register(Users(ResourceDescriptor::new("users").value_type::<User>()))
            .build()
            .unwrap();
        Linked::with_includes(registry, Arc::new(Includes::parse([include]).unwrap()))
    }

    #[test]
    fn test_included_values_are_deduplicated() {
        let linked = linked("users");
        assert!(linked.is_empty());

        for id in [2, 1, 2] {
            let resource = linked.add(&Value::new(User(id))).unwrap();
            assert_eq!(resource.descriptor().name(), "users");
        }

        let ids: Vec<i64> = linked.get("users").iter().map(Value::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(!linked.is_empty());

        let taken = linked.take();
        assert_eq!(taken["users"].len(), 2);
        assert!(linked.is_empty());
    }

    #[test]
    fn test_not_included_is_classified_only() {
        let linked = linked("reviews");
        let resource = linked.add(&Value::new(User(1))).unwrap();
        assert_eq!(resource.descriptor().name(), "users");
        assert!(linked.is_empty());
    }

    #[test]
    fn test_unregistered_type_is_internal() {
        let error = linked("users").add(&Value::new(Branch(1))).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}
