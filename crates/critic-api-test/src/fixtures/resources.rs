//! Resources of the sample review domain.

use critic_api_checker::{Converted, Schema};
use critic_api_core::{ApiError, ApiResult, JsonNode, Value, Values};
use critic_api_router::{async_trait, Context, Operation, Parameters, Resource, ResourceDescriptor};

use super::model::{Changeset, Comment, Commit, Repository, Review, User};
use super::SampleCritic;

const REVIEW_STATES: [&str; 4] = ["draft", "open", "closed", "dropped"];

fn critic(parameters: &Parameters) -> ApiResult<&SampleCritic> {
    parameters
        .critic_as::<SampleCritic>()
        .ok_or_else(|| ApiError::internal("sample resources need a SampleCritic"))
}

fn parse_id(argument: &str) -> ApiResult<i64> {
    argument
        .trim()
        .parse()
        .map_err(|_| ApiError::usage(format!("Invalid numeric id: {argument:?}")))
}

fn values<T: critic_api_core::Entity>(items: Vec<T>) -> Values {
    Values::Multiple(items.into_iter().map(Value::new).collect())
}

/// `users`: every user, paged with `offset`/`count`.
#[derive(Debug)]
pub struct Users(ResourceDescriptor);

impl Users {
    /// Creates the resource.
    #[must_use]
    pub fn new() -> Self {
        Self(
            ResourceDescriptor::new("users")
                .description("Critic users.")
                .value_type::<User>()
                .exceptions(["user"])
                .operations([Operation::Single, Operation::Multiple]),
        )
    }
}

impl Default for Users {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for Users {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let user = value.expect_entity::<User>()?;
        Ok(JsonNode::immediate(JsonNode::object([
            ("id", JsonNode::from(user.id)),
            ("name", JsonNode::from(user.name.as_str())),
            ("fullname", JsonNode::from(user.fullname.as_str())),
            ("email", JsonNode::from(user.email.as_str())),
            ("status", JsonNode::from(user.status.as_str())),
        ])))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        Ok(Value::new(critic(parameters)?.store().user(parse_id(argument)?)?))
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        let critic = critic(parameters)?;
        let _slice = parameters.set_slice()?;
        Ok(values(critic.windowed(critic.store().users())))
    }
}

/// `repositories`: addressed by id or by name.
#[derive(Debug)]
pub struct Repositories(ResourceDescriptor);

impl Repositories {
    /// Creates the resource.
    #[must_use]
    pub fn new() -> Self {
        Self(
            ResourceDescriptor::new("repositories")
                .description("Git repositories.")
                .value_type::<Repository>()
                .exceptions(["repository"])
                .operations([Operation::Single, Operation::Multiple]),
        )
    }
}

impl Default for Repositories {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for Repositories {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let repository = value.expect_entity::<Repository>()?;
        Ok(JsonNode::plain(serde_json::json!({
            "id": repository.id,
            "name": repository.name,
            "path": repository.path,
        })))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        let store = critic(parameters)?.store();
        let repository = match argument.parse::<i64>() {
            Ok(id) => store.repository(id)?,
            Err(_) => store.repository_by_name(argument)?,
        };
        Ok(Value::new(repository))
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        Ok(values(critic(parameters)?.store().repositories()))
    }
}

/// `reviews`: the full read-write resource.
#[derive(Debug)]
pub struct Reviews(ResourceDescriptor);

impl Reviews {
    /// Creates the resource.
    #[must_use]
    pub fn new() -> Self {
        let changes = || {
            [
                ("summary?", Schema::non_empty_string()),
                ("state?", Schema::one_of(REVIEW_STATES)),
            ]
        };
        let mut many = vec![("review", Schema::entity::<Review>())];
        many.extend(changes());

        Self(
            ResourceDescriptor::new("reviews")
                .description("Reviews of commits in a repository.")
                .value_type::<Review>()
                .contexts([Context::TopLevel, Context::parent("repositories")])
                .exceptions(["review", "repository", "commit", "user"])
                .operations([
                    Operation::Single,
                    Operation::Multiple,
                    Operation::Create,
                    Operation::Update,
                    Operation::UpdateMany,
                    Operation::Delete,
                ])
                .create_schema(Schema::object([
                    ("repository", Schema::recorded_entity::<Repository>()),
                    ("commits", Schema::list(Schema::entity::<Commit>())),
                    ("owners?", Schema::list(Schema::entity::<User>())),
                    ("summary?", Schema::String),
                ]))
                .update_schema(Schema::object(changes()))
                .update_many_schema(Schema::object(many)),
        )
    }

    fn check_owner(parameters: &Parameters, review: &Review) -> ApiResult<()> {
        let user = critic(parameters)?.user_id();
        if user.is_some_and(|user| review.owners.contains(&user)) {
            Ok(())
        } else {
            Err(ApiError::permission(format!(
                "Only owners may modify review r/{}",
                review.id
            )))
        }
    }

    fn apply(review: &mut Review, data: &Converted) {
        if let Some(summary) = data.get("summary").and_then(Converted::as_str) {
            review.summary = summary.to_string();
        }
        if let Some(state) = data.get("state").and_then(Converted::as_str) {
            review.state = state.to_string();
        }
    }
}

impl Default for Reviews {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for Reviews {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let critic = critic(parameters)?;
        // Re-read so that renders after an update see the new state.
        let review = match critic.store().review(value.id()) {
            Ok(review) => review,
            Err(_) => value.expect_entity::<Review>()?.clone(),
        };
        let store = critic.store();
        let repository = store.repository(review.repository)?;
        let owners = review
            .owners
            .iter()
            .map(|id| store.user(*id).map(Value::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JsonNode::object([
            ("id", JsonNode::from(review.id)),
            ("state", JsonNode::from(review.state)),
            ("summary", JsonNode::from(review.summary)),
            ("repository", JsonNode::from(Value::new(repository))),
            (
                "owners",
                JsonNode::deferred(async move { Ok(JsonNode::set(owners)) }),
            ),
            ("commits", JsonNode::basic_list(review.commits)),
        ]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        Ok(Value::new(critic(parameters)?.store().review(parse_id(argument)?)?))
    }

    async fn multiple(&self, parameters: &Parameters) -> ApiResult<Values> {
        let repository = match parameters.in_context::<Repository>() {
            Some(repository) => Some(repository),
            None => parameters.from_parameter::<Repository>("repository").await?,
        };
        let reviews = critic(parameters)?
            .store()
            .reviews()
            .into_iter()
            .filter(|review| repository.as_ref().map_or(true, |r| r.id() == review.repository))
            .collect();
        Ok(values(reviews))
    }

    async fn create(&self, parameters: &Parameters, data: Converted) -> ApiResult<Values> {
        let critic = critic(parameters)?;
        let repository = data
            .field("repository")?
            .as_entity::<Repository>()
            .cloned()
            .ok_or_else(|| ApiError::internal("repository not converted"))?;

        let mut commits = Vec::new();
        for commit in data.field("commits")?.as_list().unwrap_or_default() {
            let Some(commit) = commit.as_entity::<Commit>() else {
                continue;
            };
            if commit.repository != repository.id {
                return Err(ApiError::input(format!(
                    "Commit {} does not belong to repository {}",
                    commit.sha1, repository.name
                )));
            }
            commits.push(commit.id);
        }
        if commits.is_empty() {
            return Err(ApiError::input("A review needs at least one commit"));
        }

        let owners: Vec<i64> = match data.get("owners") {
            Some(owners) => owners.values().iter().map(Value::id).collect(),
            None => critic.user_id().into_iter().collect(),
        };
        if owners.is_empty() {
            return Err(ApiError::input("A review needs at least one owner"));
        }

        let review = critic.store().insert_review(Review {
            id: 0,
            repository: repository.id,
            state: "draft".to_string(),
            summary: data
                .get("summary")
                .and_then(Converted::as_str)
                .unwrap_or_default()
                .to_string(),
            owners,
            commits,
        });
        tracing::debug!(review = review.id, "review created");
        Ok(Values::Single(Value::new(review)))
    }

    async fn update(&self, parameters: &Parameters, values: &Values, data: Converted) -> ApiResult<()> {
        let store = critic(parameters)?.store();
        for value in values {
            Self::check_owner(parameters, &store.review(value.id())?)?;
            store.modify_review(value.id(), |review| Self::apply(review, &data))?;
        }
        Ok(())
    }

    async fn update_many(&self, parameters: &Parameters, data: Vec<Converted>) -> ApiResult<Values> {
        let store = critic(parameters)?.store();
        let mut updated = Vec::with_capacity(data.len());
        for item in &data {
            let id = item
                .field("review")?
                .as_value()
                .map(Value::id)
                .ok_or_else(|| ApiError::internal("review not converted"))?;
            Self::check_owner(parameters, &store.review(id)?)?;
            updated.push(store.modify_review(id, |review| Self::apply(review, item))?);
        }
        Ok(values(updated))
    }

    async fn delete(&self, parameters: &Parameters, values: &Values) -> ApiResult<Option<Values>> {
        let store = critic(parameters)?.store();
        for value in values {
            let review = store.review(value.id())?;
            Self::check_owner(parameters, &review)?;
            // Owners and repository outlive the review; report them as linked.
            parameters.add_linked(&Value::new(store.repository(review.repository)?))?;
            for owner in &review.owners {
                parameters.add_linked(&Value::new(store.user(*owner)?))?;
            }
            store.remove_review(value.id())?;
        }
        Ok(None)
    }
}

/// `comments`: top-level or below a review.
#[derive(Debug)]
pub struct Comments(ResourceDescriptor);

impl Comments {
    /// Creates the resource.
    #[must_use]
    pub fn new() -> Self {
        Self(
            ResourceDescriptor::new("comments")
                .description("Review comments.")
                .value_type::<Comment>()
                .contexts([Context::TopLevel, Context::parent("reviews")])
                .exceptions(["comment", "review"])
                .operations([Operation::Single, Operation::Multiple]),
        )
    }
}

impl Default for Comments {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for Comments {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let comment = value.expect_entity::<Comment>()?;
        let store = critic(parameters)?.store();
        Ok(JsonNode::object([
            ("id", JsonNode::from(comment.id)),
            ("review", JsonNode::from(Value::new(store.review(comment.review)?))),
            ("author", JsonNode::from(Value::new(store.user(comment.author)?))),
            ("text", JsonNode::from(comment.text.as_str())),
        ]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        let comment = critic(parameters)?.store().comment(parse_id(argument)?)?;
        if let Some(review) = parameters.in_context::<Review>() {
            if review.id() != comment.review {
                return Err(ApiError::path(format!(
                    "Comment {} is not in review r/{}",
                    comment.id,
                    review.id()
                )));
            }
        }
        Ok(Value::new(comment))
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
        let comments = critic(parameters)?
            .store()
            .comments()
            .into_iter()
            .filter(|comment| review.as_ref().map_or(true, |r| r.id() == comment.review))
            .collect();
        Ok(values(comments))
    }
}

/// `changesets`: available once processing reaches the requested stages.
#[derive(Debug)]
pub struct Changesets(ResourceDescriptor);

impl Changesets {
    /// Creates the resource.
    #[must_use]
    pub fn new() -> Self {
        Self(
            ResourceDescriptor::new("changesets")
                .description(
                    "Changesets. Pass only_if_complete=<stage>,... to wait for processing stages.",
                )
                .value_type::<Changeset>()
                .exceptions(["changeset"])
                .operations([Operation::Single]),
        )
    }
}

impl Default for Changesets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for Changesets {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.0
    }

    async fn json(&self, parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
        let changeset = value.expect_entity::<Changeset>()?;
        let repository = critic(parameters)?.store().repository(changeset.repository)?;
        Ok(JsonNode::object([
            ("id", JsonNode::from(changeset.id)),
            ("repository", JsonNode::from(Value::new(repository))),
            (
                "completion_level",
                JsonNode::basic_list(changeset.completion_level.iter().copied()),
            ),
        ]))
    }

    async fn single(&self, parameters: &Parameters, argument: &str) -> ApiResult<Value> {
        let changeset = critic(parameters)?.store().changeset(parse_id(argument)?)?;

        if let Some(required) = parameters.query().get("only_if_complete") {
            let mut missing = Vec::new();
            for level in required.split(',').map(str::trim).filter(|l| !l.is_empty()) {
                if !Changeset::LEVELS.contains(&level) {
                    return Err(ApiError::usage(format!(
                        "Invalid only_if_complete parameter: unknown stage {level:?}"
                    )));
                }
                if !changeset.is_complete(level) {
                    missing.push(level);
                }
            }
            if !missing.is_empty() {
                return Err(ApiError::delayed(format!(
                    "Changeset {} is not ready: {} pending",
                    changeset.id,
                    missing.join(", ")
                )));
            }
        }

        Ok(Value::new(changeset))
    }
}
