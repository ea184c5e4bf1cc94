//! A small review domain for unit tests.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use critic_api_checker::{Converted, Schema};
use critic_api_core::{
    ApiError, ApiResult, Critic, DomainError, Entity, JsonNode, Value, Values,
};
use critic_api_extract::QueryString;
use critic_api_router::{
    async_trait, Context, Operation, ParameterDefaults, Parameters, Registry, Resource,
    ResourceDescriptor,
};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: &'static str,
    pub email: &'static str,
}

impl Entity for User {
    const TYPE_NAME: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub owner: i64,
    pub summary: String,
    pub reviewers: Vec<i64>,
}

impl Entity for Review {
    const TYPE_NAME: &'static str = "review";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub review: i64,
    pub author: i64,
    pub text: &'static str,
}

impl Entity for Comment {
    const TYPE_NAME: &'static str = "comment";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Session(pub i64);

impl Entity for Session {
    const TYPE_NAME: &'static str = "session";

    fn id(&self) -> i64 {
        self.0
    }
}

#[derive(Debug)]
pub struct Store {
    pub users: BTreeMap<i64, User>,
    pub reviews: Mutex<BTreeMap<i64, Review>>,
    pub comments: BTreeMap<i64, Comment>,
}

impl Store {
    pub fn sample() -> Self {
        let users = [
            (1, "alice", "a@e"),
            (2, "bob", "b@e"),
            (3, "carol", "c@e"),
            (4, "dave", "d@e"),
        ]
        .into_iter()
        .map(|(id, name, email)| (id, User { id, name, email }))
        .collect();

        let reviews = [(7, 3, "Fix parser", vec![2, 1]), (8, 1, "Add docs", vec![])]
            .into_iter()
            .map(|(id, owner, summary, reviewers)| {
                (
                    id,
                    Review {
                        id,
                        owner,
                        summary: summary.to_string(),
                        reviewers,
                    },
                )
            })
            .collect();

        let comments = [
            (101, 7, 1, "first"),
            (102, 7, 1, "second"),
            (103, 7, 2, "third"),
            (104, 8, 4, "elsewhere"),
        ]
        .into_iter()
        .map(|(id, review, author, text)| {
            (
                id,
                Comment {
                    id,
                    review,
                    author,
                    text,
                },
            )
        })
        .collect();

        Self {
            users,
            reviews: Mutex::new(reviews),
            comments,
        }
    }

    pub fn user(&self, id: i64) -> Result<Value, DomainError> {
        self.users
            .get(&id)
            .cloned()
            .map(Value::new)
            .ok_or_else(|| DomainError::invalid_id("user", "users", id))
    }

    pub fn review(&self, id: i64) -> Result<Value, DomainError> {
        self.reviews
            .lock()
            .get(&id)
            .cloned()
            .map(Value::new)
            .ok_or_else(|| DomainError::invalid_id("review", "reviews", id))
    }
}

pub struct TestCritic {
    pub store: Arc<Store>,
    pub user: Option<i64>,
}

impl Critic for TestCritic {
    fn signed_in_user(&self) -> Option<Value> {
        self.user.and_then(|id| self.store.user(id).ok())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn store(parameters: &Parameters) -> ApiResult<Arc<Store>> {
    parameters
        .critic_as::<TestCritic>()
        .map(|critic| Arc::clone(&critic.store))
        .ok_or_else(|| ApiError::internal("unexpected critic"))
}

fn parse_id(argument: &str) -> ApiResult<i64> {
    argument
        .parse()
        .map_err(|_| ApiError::usage(format!("Invalid numeric id: {argument:?}")))
}

pub struct Users(ResourceDescriptor);

#[async_trait]
impl Resource for Users {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let user = value.expect_entity::<User>()?;
        Ok(JsonNode::object([
            ("id", JsonNode::from(user.id)),
            ("name", JsonNode::from(user.name)),
            ("email", JsonNode::from(user.email)),
        ]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        Ok(store(parameters)?.user(parse_id(argument)?)?)
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        Ok(Values::Multiple(
            store(parameters)?.users.values().cloned().map(Value::new).collect(),
        ))
    }
}

pub struct Reviews(ResourceDescriptor);

#[async_trait]
impl Resource for Reviews {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let review = value.expect_entity::<Review>()?.clone();
        let store = store(parameters)?;
        let owner = store.user(review.owner)?;
        let reviewers = review
            .reviewers
            .iter()
            .map(|id| store.user(*id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonNode::object([
            ("id", JsonNode::from(review.id)),
            ("summary", JsonNode::from(review.summary)),
            (
                "owner",
                JsonNode::deferred(async move { Ok(JsonNode::from(owner)) }),
            ),
            ("reviewers", JsonNode::set(reviewers)),
        ]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        Ok(store(parameters)?.review(parse_id(argument)?)?)
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        Ok(Values::Multiple(
            store(parameters)?
                .reviews
                .lock()
                .values()
                .cloned()
                .map(Value::new)
                .collect(),
        ))
    }

    async fn create(&self, parameters: &Parameters, data: Converted) -> ApiResult<Values> {
        let store = store(parameters)?;
        let summary = data.field("summary")?.as_str().unwrap_or_default().to_string();
        let owner = parameters
            .critic()
            .signed_in_user()
            .map_or(0, |user| user.id());
        let mut reviews = store.reviews.lock();
        let id = reviews.keys().max().copied().unwrap_or(0) + 1;
        let review = Review {
            id,
            owner,
            summary,
            reviewers: Vec::new(),
        };
        reviews.insert(id, review.clone());
        Ok(Values::Single(Value::new(review)))
    }

    async fn delete(&self, parameters: &Parameters, values: &Values) -> ApiResult<Option<Values>> {
        let store = store(parameters)?;
        let mut reviews = store.reviews.lock();
        for value in values {
            if reviews.remove(&value.id()).is_none() {
                return Err(DomainError::invalid_id("review", "reviews", value.id()).into());
            }
        }
        Ok(None)
    }
}

pub struct Comments(ResourceDescriptor);

#[async_trait]
impl Resource for Comments {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let comment = value.expect_entity::<Comment>()?;
        let store = store(parameters)?;
        Ok(JsonNode::object([
            ("id", JsonNode::from(comment.id)),
            ("review", JsonNode::from(store.review(comment.review)?)),
            ("author", JsonNode::from(store.user(comment.author)?)),
            ("text", JsonNode::from(comment.text)),
        ]))
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        let in_context = parameters.in_context::<Review>();
        let from_query = parameters.from_parameter::<Review>("review").await?;
        let review = match (in_context, from_query) {
            (Some(a), Some(b)) if a != b => {
                return Err(ApiError::usage("Conflicting reviews specified"))
            }
            (a, b) => a.or(b),
        };
        Ok(Values::Multiple(
            store(parameters)?
                .comments
                .values()
                .filter(|comment| review.as_ref().map_or(true, |r| r.id() == comment.review))
                .cloned()
                .map(Value::new)
                .collect(),
        ))
    }
}

pub struct Sessions(ResourceDescriptor);

#[async_trait]
impl Resource for Sessions {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        if value.id() < 0 {
            return Err(ApiError::skipped("expired session"));
        }
        Ok(JsonNode::object([("id", JsonNode::from(value.id()))]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        let session = Session(parse_id(argument)?);
        parameters.set_cookie("session", argument, false);
        Ok(Value::new(session))
    }
}

pub fn registry() -> Arc<Registry> {
    Registry::builder("v1")
        .register(Users(
            ResourceDescriptor::new("users")
                .value_type::<User>()
                .exceptions(["user"])
                .operations([Operation::Single, Operation::Multiple]),
        ))
        .register(Reviews(
            ResourceDescriptor::new("reviews")
                .value_type::<Review>()
                .exceptions(["review"])
                .operations([
                    Operation::Single,
                    Operation::Multiple,
                    Operation::Create,
                    Operation::Delete,
                ])
                .create_schema(Schema::object([("summary", Schema::non_empty_string())])),
        ))
        .register(Comments(
            ResourceDescriptor::new("comments")
                .value_type::<Comment>()
                .contexts([Context::TopLevel, Context::parent("reviews")])
                .exceptions(["comment", "review"])
                .operations([Operation::Multiple]),
        ))
        .register(Sessions(
            ResourceDescriptor::new("sessions")
                .value_type::<Session>()
                .operations([Operation::Single]),
        ))
        .build()
        .unwrap()
}

pub fn critic(user: Option<i64>) -> Arc<dyn Critic> {
    Arc::new(TestCritic {
        store: Arc::new(Store::sample()),
        user,
    })
}

pub fn parameters(query: &str) -> Parameters {
    parameters_as(Some(1), query)
}

pub fn parameters_as(user: Option<i64>, query: &str) -> Parameters {
    Parameters::new(
        critic(user),
        registry(),
        QueryString::parse(query).unwrap(),
        &ParameterDefaults::default(),
    )
    .unwrap()
}
