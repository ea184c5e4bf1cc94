//! An in-memory review domain.
//!
//! Users, repositories, commits, reviews, comments and changesets held in a
//! [`Store`], exposed through resources registered under `v1` the way a
//! deployment registers its own. The sample data:
//!
//! | kind | ids |
//! |------|-----|
//! | users | 1 `erin`, 2 `frank`, 3 `grace`, 4 `henry` (retired), 42 `alice` |
//! | repositories | 5 `critic`, 6 `other` |
//! | commits | 10, 11, 12 in `critic`; 20 in `other` |
//! | reviews | 7 (owner 3, commit 10), 8 (owner 1, commit 11) |
//! | comments | 101, 102 by 1 and 103 by 2 on review 7; 104 by 3 on review 8 |
//! | changesets | 55 (structure, analysis), 56 (complete) |

mod model;
mod resources;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use critic_api_core::{ApiError, ApiResult, Critic, DomainError, Value};
use critic_api_extract::ApiRequest;
use critic_api_router::Registry;
use critic_api_server::{Api, CriticProvider};

use crate::client::TestClient;

pub use model::{Changeset, Comment, Commit, Repository, Review, User};
pub use resources::{Changesets, Comments, Repositories, Reviews, Users};

/// Header naming the signed-in user for [`SampleProvider`].
pub const USER_HEADER: &str = "x-critic-user";

/// The sample domain's data.
#[derive(Debug)]
pub struct Store {
    users: BTreeMap<i64, User>,
    repositories: BTreeMap<i64, Repository>,
    commits: BTreeMap<i64, Commit>,
    reviews: Mutex<BTreeMap<i64, Review>>,
    comments: BTreeMap<i64, Comment>,
    changesets: BTreeMap<i64, Changeset>,
}

impl Store {
    /// The sample data described in the module docs.
    #[must_use]
    pub fn sample() -> Self {
        let users = [
            (1, "erin", "Erin", "current"),
            (2, "frank", "Frank", "current"),
            (3, "grace", "Grace", "absent"),
            (4, "henry", "Henry", "retired"),
            (42, "alice", "A.", "current"),
        ]
        .into_iter()
        .map(|(id, name, fullname, status)| {
            let email = format!("{}@e", &name[..1]);
            (
                id,
                User {
                    id,
                    name: name.to_string(),
                    fullname: fullname.to_string(),
                    email,
                    status: status.to_string(),
                },
            )
        })
        .collect();

        let repositories = [(5, "critic"), (6, "other")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id,
                    Repository {
                        id,
                        name: name.to_string(),
                        path: format!("/var/git/{name}.git"),
                    },
                )
            })
            .collect();

        let commits = [(10, 5), (11, 5), (12, 5), (20, 6)]
            .into_iter()
            .map(|(id, repository)| {
                (
                    id,
                    Commit {
                        id,
                        repository,
                        sha1: format!("{id:0>40}"),
                    },
                )
            })
            .collect();

        let reviews = [(7, vec![3], "Fix parser", vec![10]), (8, vec![1], "Add docs", vec![11])]
            .into_iter()
            .map(|(id, owners, summary, commits)| {
                (
                    id,
                    Review {
                        id,
                        repository: 5,
                        state: "open".to_string(),
                        summary: summary.to_string(),
                        owners,
                        commits,
                    },
                )
            })
            .collect();

        let comments = [
            (101, 7, 1, "Typo on line 3"),
            (102, 7, 1, "Needs a test"),
            (103, 7, 2, "Looks good otherwise"),
            (104, 8, 3, "Link the RFC"),
        ]
        .into_iter()
        .map(|(id, review, author, text)| {
            (
                id,
                Comment {
                    id,
                    review,
                    author,
                    text: text.to_string(),
                },
            )
        })
        .collect();

        let changesets = [
            (55, vec!["structure", "analysis"]),
            (56, Changeset::LEVELS.to_vec()),
        ]
        .into_iter()
        .map(|(id, completion_level)| {
            (
                id,
                Changeset {
                    id,
                    repository: 5,
                    completion_level,
                },
            )
        })
        .collect();

        Self {
            users,
            repositories,
            commits,
            reviews: Mutex::new(reviews),
            comments,
            changesets,
        }
    }

    /// Looks up a user.
    pub fn user(&self, id: i64) -> Result<User, DomainError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("user", "users", id))
    }

    /// All users, by id.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    /// Looks up a repository.
    pub fn repository(&self, id: i64) -> Result<Repository, DomainError> {
        self.repositories
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("repository", "repositories", id))
    }

    /// Looks up a repository by name.
    pub fn repository_by_name(&self, name: &str) -> Result<Repository, DomainError> {
        self.repositories
            .values()
            .find(|repository| repository.name == name)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("repository", "repositories", name))
    }

    /// All repositories, by id.
    #[must_use]
    pub fn repositories(&self) -> Vec<Repository> {
        self.repositories.values().cloned().collect()
    }

    /// Looks up a commit.
    pub fn commit(&self, id: i64) -> Result<Commit, DomainError> {
        self.commits
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("commit", "commits", id))
    }

    /// Looks up a review.
    pub fn review(&self, id: i64) -> Result<Review, DomainError> {
        self.reviews
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("review", "reviews", id))
    }

    /// All reviews, by id.
    #[must_use]
    pub fn reviews(&self) -> Vec<Review> {
        self.reviews.lock().values().cloned().collect()
    }

    /// Stores a new review under the next free id.
    pub fn insert_review(&self, mut review: Review) -> Review {
        let mut reviews = self.reviews.lock();
        review.id = reviews.keys().max().copied().unwrap_or(0) + 1;
        reviews.insert(review.id, review.clone());
        review
    }

    /// Applies `change` to a stored review.
    pub fn modify_review<F>(&self, id: i64, change: F) -> Result<Review, DomainError>
    where
        F: FnOnce(&mut Review),
    {
        let mut reviews = self.reviews.lock();
        let review = reviews
            .get_mut(&id)
            .ok_or_else(|| DomainError::invalid_id("review", "reviews", id))?;
        change(review);
        Ok(review.clone())
    }

    /// Deletes a review.
    pub fn remove_review(&self, id: i64) -> Result<Review, DomainError> {
        self.reviews
            .lock()
            .remove(&id)
            .ok_or_else(|| DomainError::invalid_id("review", "reviews", id))
    }

    /// Looks up a comment.
    pub fn comment(&self, id: i64) -> Result<Comment, DomainError> {
        self.comments
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("comment", "comments", id))
    }

    /// All comments, by id.
    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.comments.values().cloned().collect()
    }

    /// Looks up a changeset.
    pub fn changeset(&self, id: i64) -> Result<Changeset, DomainError> {
        self.changesets
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::invalid_id("changeset", "changesets", id))
    }
}

/// Per-request handle onto a shared [`Store`].
///
/// Counts store accesses for `debug=dbqueries` and honours slice windows
/// pushed by resources.
#[derive(Debug)]
pub struct SampleCritic {
    store: Arc<Store>,
    user: Option<i64>,
    queries: AtomicUsize,
    windows: Mutex<Vec<(usize, Option<usize>)>>,
}

impl SampleCritic {
    /// Creates a handle; `user` is the signed-in user's id.
    #[must_use]
    pub fn new(store: Arc<Store>, user: Option<i64>) -> Self {
        Self {
            store,
            user,
            queries: AtomicUsize::new(0),
            windows: Mutex::new(Vec::new()),
        }
    }

    /// The store, counting one query.
    pub fn store(&self) -> &Store {
        self.queries.fetch_add(1, Ordering::Relaxed);
        &self.store
    }

    /// The signed-in user's id.
    #[must_use]
    pub const fn user_id(&self) -> Option<i64> {
        self.user
    }

    /// Restricts `items` to the innermost pushed window.
    #[must_use]
    pub fn windowed<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.windows.lock().last() {
            Some(&(offset, count)) => items
                .into_iter()
                .skip(offset)
                .take(count.unwrap_or(usize::MAX))
                .collect(),
            None => items,
        }
    }
}

impl Critic for SampleCritic {
    fn signed_in_user(&self) -> Option<Value> {
        self.user
            .and_then(|id| self.store.user(id).ok())
            .map(Value::new)
    }

    fn push_slice(&self, offset: usize, count: Option<usize>) {
        self.windows.lock().push((offset, count));
    }

    fn pop_slice(&self) {
        self.windows.lock().pop();
    }

    fn database_queries(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({"count": self.queries.load(Ordering::Relaxed)}))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Signs requests in as the user named by the [`USER_HEADER`] header.
#[derive(Debug, Clone)]
pub struct SampleProvider {
    store: Arc<Store>,
}

impl SampleProvider {
    /// A provider over a shared store.
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CriticProvider for SampleProvider {
    async fn critic(&self, request: &ApiRequest) -> ApiResult<Arc<dyn Critic>> {
        let user = match request.headers().get(USER_HEADER) {
            None => None,
            Some(header) => {
                let id = header
                    .to_str()
                    .ok()
                    .and_then(|value| value.parse::<i64>().ok())
                    .filter(|id| self.store.user(*id).is_ok())
                    .ok_or_else(|| ApiError::permission("Invalid user"))?;
                Some(id)
            }
        };
        Ok(Arc::new(SampleCritic::new(Arc::clone(&self.store), user)))
    }
}

/// The sample resources, registered under `v1`.
///
/// # Panics
///
/// Panics if the registrations conflict, which would be a bug in this module.
#[must_use]
pub fn registry() -> Arc<Registry> {
    Registry::builder("v1")
        .register(Users::new())
        .register(Repositories::new())
        .register(Reviews::new())
        .register(Comments::new())
        .register(Changesets::new())
        .build()
        .expect("sample registry is well-formed")
}

/// A handle onto fresh sample data.
#[must_use]
pub fn critic(user: Option<i64>) -> Arc<dyn Critic> {
    Arc::new(SampleCritic::new(Arc::new(Store::sample()), user))
}

/// A client over fresh sample data, signed in as `user`.
///
/// Requests share the data, so changes persist between them.
pub fn client(user: Option<i64>) -> TestClient {
    let provider = SampleProvider::new(Arc::new(Store::sample()));
    let client = TestClient::with_provider(Api::new(registry()), provider);
    match user {
        Some(id) => client.with_default_header(USER_HEADER, id.to_string()),
        None => client,
    }
}
