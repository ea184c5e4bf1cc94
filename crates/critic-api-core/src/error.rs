//! Error types for the Critic API.
//!
//! This module provides [`ApiError`], the error type threaded through path
//! resolution, input checking, serialization and the method finalizers.
//!
//! # Error kinds
//!
//! Every error a client can see belongs to one of five kinds, each mapped to a
//! fixed HTTP status and title:
//!
//! | [`ErrorKind`] | Status | Title |
//! |---|---|---|
//! | `Path` | 404 | No such resource |
//! | `Usage` | 400 | Invalid API request |
//! | `Input` | 400 | Invalid API input |
//! | `Permission` | 403 | Permission denied |
//! | `Delayed` | 202 | Resource temporarily unavailable |
//!
//! Anything else is an [`ErrorKind::Internal`] fault and maps to 500.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Valid path shape, but no resource matches the current system state.
    Path,
    /// Invalid path or parameter; retrying would never succeed.
    Usage,
    /// The request body does not match the declared schema.
    Input,
    /// Authenticated but not authorized.
    Permission,
    /// The resource exists but is not computed yet.
    Delayed,
    /// Unexpected fault inside the framework or a resource.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Path => StatusCode::NOT_FOUND,
            Self::Usage | Self::Input => StatusCode::BAD_REQUEST,
            Self::Permission => StatusCode::FORBIDDEN,
            Self::Delayed => StatusCode::ACCEPTED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the human readable title used in error envelopes.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Path => "No such resource",
            Self::Usage => "Invalid API request",
            Self::Input => "Invalid API input",
            Self::Permission => "Permission denied",
            Self::Delayed => "Resource temporarily unavailable",
            Self::Internal => "Internal server error",
        }
    }
}

/// Values a client referred to that do not exist.
///
/// Rendered as `"invalid": {<resource_type>: [<value>, ...]}` next to the
/// error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidValues {
    /// The resource type the values were meant to identify (e.g. `reviews`).
    pub resource_type: String,
    /// The offending values, as the client sent them.
    pub values: Vec<serde_json::Value>,
}

impl InvalidValues {
    /// Creates a hint for a single invalid value.
    #[must_use]
    pub fn single(resource_type: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            resource_type: resource_type.into(),
            values: vec![value.into()],
        }
    }
}

/// An error raised by the domain layer.
///
/// Each entity kind of the domain model has a module-level error type; this
/// struct carries the name of that module so resources can declare which
/// domain errors they expect (see [`ApiError::translate`]).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DomainError {
    /// The domain module that raised the error (e.g. `review`).
    pub module: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Set when the error was caused by an id or name that does not exist.
    pub invalid: Option<InvalidValues>,
}

impl DomainError {
    /// Creates a domain error.
    #[must_use]
    pub fn new(module: &'static str, message: impl Into<String>) -> Self {
        Self {
            module,
            message: message.into(),
            invalid: None,
        }
    }

    /// Creates an "invalid id" domain error.
    #[must_use]
    pub fn invalid_id(
        module: &'static str,
        resource_type: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        let resource_type = resource_type.into();
        let value = value.into();
        Self {
            module,
            message: format!("Invalid {module} id: {value}"),
            invalid: Some(InvalidValues {
                resource_type,
                values: vec![value],
            }),
        }
    }
}

/// Standard error type for the Critic API.
///
/// # Example
///
/// ```
/// use critic_api_core::{ApiError, ErrorKind};
///
/// fn parse_count(value: &str) -> Result<u32, ApiError> {
///     value
///         .parse()
///         .map_err(|_| ApiError::usage(format!("Invalid count parameter: {value:?}")))
/// }
///
/// let error = parse_count("many").unwrap_err();
/// assert_eq!(error.kind(), ErrorKind::Usage);
/// ```
#[derive(Error, Debug)]
pub enum ApiError {
    /// No resource matches this path in the current system state.
    #[error("{message}")]
    Path {
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
        /// Values the client referred to that do not exist.
        invalid: Option<InvalidValues>,
    },

    /// Invalid path or query parameter.
    #[error("{message}")]
    Usage {
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
    },

    /// Invalid request body.
    #[error("{message}")]
    Input {
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
    },

    /// Operation not permitted for the signed-in user.
    #[error("{message}")]
    Permission {
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
    },

    /// The resource is not ready yet; the client should retry later.
    #[error("{message}")]
    Delayed {
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable code.
        code: Option<String>,
    },

    /// An error raised by the domain layer that no layer has translated yet.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Raised by a resource's `json` callback to drop a value from the output.
    #[error("resource skipped: {0}")]
    ResourceSkipped(String),

    /// Unexpected fault.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ApiError {
    /// Creates a path error.
    #[must_use]
    pub fn path(message: impl Into<String>) -> Self {
        Self::Path {
            message: message.into(),
            code: None,
            invalid: None,
        }
    }

    /// Creates a path error carrying an invalid-value hint.
    #[must_use]
    pub fn invalid(message: impl Into<String>, invalid: InvalidValues) -> Self {
        Self::Path {
            message: message.into(),
            code: None,
            invalid: Some(invalid),
        }
    }

    /// Creates a usage error.
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            code: None,
        }
    }

    /// Creates an input error.
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a permission error.
    #[must_use]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a delayed error.
    #[must_use]
    pub fn delayed(message: impl Into<String>) -> Self {
        Self::Delayed {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a resource-skipped signal.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::ResourceSkipped(reason.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Attaches a machine-readable code.
    ///
    /// Has no effect on domain errors, skip signals and internal errors.
    #[must_use]
    pub fn with_code(mut self, new_code: impl Into<String>) -> Self {
        match &mut self {
            Self::Path { code, .. }
            | Self::Usage { code, .. }
            | Self::Input { code, .. }
            | Self::Permission { code, .. }
            | Self::Delayed { code, .. } => *code = Some(new_code.into()),
            Self::Domain(_) | Self::ResourceSkipped(_) | Self::Internal { .. } => {}
        }
        self
    }

    /// Returns the kind this error renders as.
    ///
    /// An untranslated domain error renders as a path error when it was caused
    /// by an invalid id and as a usage error otherwise. A skip signal that
    /// escapes to the top is a path error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Path { .. } | Self::ResourceSkipped(_) => ErrorKind::Path,
            Self::Usage { .. } => ErrorKind::Usage,
            Self::Input { .. } => ErrorKind::Input,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Delayed { .. } => ErrorKind::Delayed,
            Self::Domain(DomainError {
                invalid: Some(_), ..
            }) => ErrorKind::Path,
            Self::Domain(_) => ErrorKind::Usage,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Returns `true` for a [`ApiError::ResourceSkipped`] signal.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::ResourceSkipped(_))
    }

    /// Translates a declared domain error into an error of the given kind.
    ///
    /// Domain errors whose module is listed in `declared` become `kind`
    /// (only [`ErrorKind::Path`] and [`ErrorKind::Usage`] are meaningful
    /// targets); every other error is returned unchanged.
    #[must_use]
    pub fn translate(self, declared: &[&'static str], kind: ErrorKind) -> Self {
        match self {
            Self::Domain(error) if declared.contains(&error.module) => match kind {
                ErrorKind::Path => Self::Path {
                    message: error.message,
                    code: None,
                    invalid: error.invalid,
                },
                ErrorKind::Input => Self::input(error.message),
                ErrorKind::Permission => Self::permission(error.message),
                ErrorKind::Delayed => Self::delayed(error.message),
                ErrorKind::Internal => Self::internal(error.message),
                ErrorKind::Usage => Self::usage(error.message),
            },
            other => other,
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let kind = self.kind();
        let (code, invalid) = match self {
            Self::Path { code, invalid, .. } => (code.clone(), invalid.clone()),
            Self::Usage { code, .. }
            | Self::Input { code, .. }
            | Self::Permission { code, .. }
            | Self::Delayed { code, .. } => (code.clone(), None),
            Self::Domain(error) => (None, error.invalid.clone()),
            Self::ResourceSkipped(_) | Self::Internal { .. } => (None, None),
        };
        let message = match self {
            Self::Internal { .. } => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorEnvelope {
            error: ErrorDetail {
                title: kind.title().to_string(),
                message,
                code,
            },
            invalid: invalid.map(|invalid| {
                let mut map = serde_json::Map::new();
                map.insert(
                    invalid.resource_type,
                    serde_json::Value::Array(invalid.values),
                );
                map
            }),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// Values the client referred to that do not exist, keyed by resource type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Title derived from the error kind.
    pub title: String,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code, `null` when absent.
    pub code: Option<String>,
}
