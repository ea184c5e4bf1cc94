//! Entities of the sample review domain.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use critic_api_core::{Critic, DomainError, Entity, FetchById};

use super::SampleCritic;

/// A Critic user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id.
    pub id: i64,
    /// Login name.
    pub name: String,
    /// Display name.
    pub fullname: String,
    /// Primary email address.
    pub email: String,
    /// `current`, `absent` or `retired`.
    pub status: String,
}

/// A Git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Repository id.
    pub id: i64,
    /// Short name.
    pub name: String,
    /// Path on the server.
    pub path: String,
}

/// A commit in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit id.
    pub id: i64,
    /// The repository holding the commit.
    pub repository: i64,
    /// Full SHA-1.
    pub sha1: String,
}

/// A review of a set of commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// Review id.
    pub id: i64,
    /// The reviewed repository.
    pub repository: i64,
    /// `draft`, `open`, `closed` or `dropped`.
    pub state: String,
    /// One-line summary.
    pub summary: String,
    /// Owning users.
    pub owners: Vec<i64>,
    /// Reviewed commits.
    pub commits: Vec<i64>,
}

/// A comment in a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment id.
    pub id: i64,
    /// The review the comment belongs to.
    pub review: i64,
    /// The commenting user.
    pub author: i64,
    /// Comment text.
    pub text: String,
}

/// A changeset between two commits, processed in stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Changeset id.
    pub id: i64,
    /// The repository of the compared commits.
    pub repository: i64,
    /// Finished processing stages, from [`Changeset::LEVELS`].
    pub completion_level: Vec<&'static str>,
}

impl Changeset {
    /// Processing stages, in the order they complete.
    pub const LEVELS: [&'static str; 3] = ["structure", "analysis", "full"];

    /// Returns `true` once `level` has finished.
    #[must_use]
    pub fn is_complete(&self, level: &str) -> bool {
        self.completion_level.contains(&level)
    }
}

macro_rules! entity {
    ($ty:ty, $name:literal, $lookup:ident) => {
        impl Entity for $ty {
            const TYPE_NAME: &'static str = $name;

            fn id(&self) -> i64 {
                self.id
            }
        }

        impl FetchById for $ty {
            fn fetch(critic: Arc<dyn Critic>, id: i64) -> BoxFuture<'static, Result<Self, DomainError>> {
                let result = critic
                    .downcast_ref::<SampleCritic>()
                    .ok_or_else(|| DomainError::new($name, "not a sample critic"))
                    .and_then(|critic| critic.store().$lookup(id));
                async move { result }.boxed()
            }
        }
    };
}

entity!(User, "user", user);
entity!(Repository, "repository", repository);
entity!(Commit, "commit", commit);
entity!(Review, "review", review);
entity!(Comment, "comment", comment);
entity!(Changeset, "changeset", changeset);
