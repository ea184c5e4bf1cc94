//! The domain-layer handle.
//!
//! The framework never touches the database, the session or the domain model
//! directly. Everything it needs from them goes through a [`Critic`] handle,
//! created by the host for each request and shared by every resource callback
//! that runs on behalf of that request.

use std::any::Any;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::DomainError;
use crate::value::{Entity, Value};

/// Per-request handle to the domain layer.
///
/// Implementations wrap the database transaction, the signed-in user and the
/// session settings. Resources recover the concrete type with
/// [`downcast_ref`](trait.Critic.html#method.downcast_ref).
pub trait Critic: Send + Sync + 'static {
    /// The signed-in user, or `None` for anonymous requests.
    fn signed_in_user(&self) -> Option<Value>;

    /// Restricts subsequent multi-row queries to a window.
    ///
    /// Called when a resource opens a slice scope on its parameters.
    fn push_slice(&self, _offset: usize, _count: Option<usize>) {}

    /// Removes the innermost window pushed by [`Critic::push_slice`].
    fn pop_slice(&self) {}

    /// Profiling data about executed database queries, for `debug=dbqueries`.
    fn database_queries(&self) -> Option<serde_json::Value> {
        None
    }

    /// Returns `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Critic {
    /// Returns `true` if no user is signed in.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.signed_in_user().is_none()
    }

    /// Downcasts to the concrete domain handle.
    #[must_use]
    pub fn downcast_ref<T: Critic>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// An entity kind that can be fetched by id.
///
/// Used by the input type checker to turn ids in request bodies into
/// domain objects.
pub trait FetchById: Entity + Sized {
    /// Fetches the entity with the given id.
    fn fetch(critic: Arc<dyn Critic>, id: i64) -> BoxFuture<'static, Result<Self, DomainError>>;
}
