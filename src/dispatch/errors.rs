//! Dispatch error types and the generic error body.

use std::error::Error;
use std::sync::Arc;

use http::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::bind::BindingError;
use crate::body::BodyError;
use crate::codec::CodecError;
use crate::http::Payload;
use crate::routing::Route;

/// Everything that can go wrong between route lookup and encoding.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Page Not Found")]
    NotFound,

    #[error("Method [{method}] not allowed for URI [{path}]. Allowed methods: {}", join(.allowed))]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("More than 1 route matched the incoming request: {}", .routes.join(", "))]
    DuplicateRoute { path: String, routes: Vec<String> },

    #[error(transparent)]
    Binding(#[from] BindingError),

    /// An explicit status outcome; not a failure.
    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
        body: Option<Payload>,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("{0}")]
    Handler(#[source] Box<dyn Error + Send + Sync>),
}

fn join(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl DispatchError {
    /// Wrap an application error.
    pub fn handler(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        DispatchError::Handler(error.into())
    }

    /// An explicit status with the default error body.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        DispatchError::Status {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// An explicit status carrying its own body.
    pub fn status_with_body(
        status: StatusCode,
        message: impl Into<String>,
        body: impl Into<Payload>,
    ) -> Self {
        DispatchError::Status {
            status,
            message: message.into(),
            body: Some(body.into()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        DispatchError::NotFound
    }

    /// Status of the generic response for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Binding(e) => e.status(),
            DispatchError::Status { status, .. } => *status,
            DispatchError::Body(BodyError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::DuplicateRoute { .. }
            | DispatchError::Codec(_)
            | DispatchError::Body(_)
            | DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error error routes and exception handlers are matched against:
    /// the wrapped error for wrapping variants, else this error.
    pub fn as_error(&self) -> &(dyn Error + 'static) {
        match self {
            DispatchError::Binding(e) => e,
            DispatchError::Codec(e) => e,
            DispatchError::Body(e) => e,
            DispatchError::Handler(e) => e.as_ref(),
            other => other,
        }
    }

    /// First error of type `E` in the wrapped error's source chain.
    pub fn find<E: Error + 'static>(&self) -> Option<&E> {
        let mut current = Some(self.as_error());
        while let Some(error) = current {
            if let Some(found) = error.downcast_ref::<E>() {
                return Some(found);
            }
            current = error.source();
        }
        None
    }
}

/// Generic structured error body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn to_payload(&self) -> Payload {
        match serde_json::to_value(self) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(self.message.clone()),
        }
    }
}

/// Request attribute: the error an error route was dispatched for.
#[derive(Debug, Clone)]
pub struct ThrownError(pub Arc<DispatchError>);

/// Request attribute: the route chosen for the request.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub Arc<Route>);

impl MatchedRoute {
    /// URI template of the route, for logs and metric labels.
    pub fn template(&self) -> Option<&str> {
        self.0.template().map(|t| t.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("db down")]
    struct DbDown;

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupFailed(#[source] DbDown);

    #[test]
    fn status_codes_follow_the_kind() {
        assert_eq!(DispatchError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            DispatchError::from(BindingError::Missing { name: "id".into() }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::handler(DbDown).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn find_walks_the_source_chain() {
        let error = DispatchError::handler(LookupFailed(DbDown));
        assert!(error.find::<LookupFailed>().is_some());
        assert!(error.find::<DbDown>().is_some());
        assert!(error.find::<BindingError>().is_none());
    }

    #[test]
    fn messages_name_the_conflict() {
        let error = DispatchError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/pets".into(),
            allowed: vec![Method::GET, Method::POST],
        };
        assert_eq!(
            error.to_string(),
            "Method [DELETE] not allowed for URI [/pets]. Allowed methods: GET, POST"
        );
        let body = serde_json::to_value(ErrorBody::new("x")).unwrap();
        assert_eq!(body, serde_json::json!({"message": "x"}));
    }
}
