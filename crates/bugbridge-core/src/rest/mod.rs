//! REST plumbing shared by the client and the reference backend.
//!
//! [`Transport`] is the seam between [`RestTracker`] and whatever answers
//! its requests. Real deployments put an HTTP client behind it; tests put
//! the in-memory reference backend there.

pub mod client;
pub mod wire;

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{Result, TrackerError};

pub use client::{NewIssue, Project, RestTracker};

/// HTTP method subset used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub json: Option<Value>,
}

impl Request {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            json: None,
        }
    }

    #[must_use]
    pub fn put(url: impl Into<String>, json: Value) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            json: Some(json),
        }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, json: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            json: Some(json),
        }
    }
}

pub const CONTENT_TYPE_JSON: &str = "text/json";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=UTF-8";

/// A response as seen by the client: status, content type and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub text: String,
}

impl Response {
    /// 200 response carrying `body` serialized as JSON.
    #[must_use]
    pub fn from_json<T: Serialize>(body: &T) -> Self {
        Self::with_status_json(200, body)
    }

    #[must_use]
    pub fn with_status_json<T: Serialize>(status: u16, body: &T) -> Self {
        let text = serde_json::to_string(body).unwrap_or_default();
        Self {
            status,
            content_type: CONTENT_TYPE_JSON.to_string(),
            text,
        }
    }

    /// Structured protocol error: `{"code", "error": true, "message"}`.
    #[must_use]
    pub fn error(status: u16, code: Option<u32>, message: &str) -> Self {
        let mut body = json!({ "error": true, "message": message });
        if let Some(code) = code {
            body["code"] = json!(code);
        }
        Self::with_status_json(status, &body)
    }

    /// Bare status with no body, as servers answer unauthenticated requests.
    #[must_use]
    pub fn status_only(status: u16) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_JSON.to_string(),
            text: String::new(),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::status_only(404)
    }

    #[must_use]
    pub fn html(status: u16, text: String) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_HTML.to_string(),
            text,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode the body.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Protocol`] if the body is not the expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| {
            TrackerError::Protocol(format!("undecodable {} response: {e}", self.status))
        })
    }

    /// Server-provided error message, if the body carries one.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.json::<wire::ErrorBody>().ok().and_then(|body| body.message)
    }

    /// Tracker error code from a rejection body, if it carries one.
    #[must_use]
    pub fn error_code(&self) -> Option<u32> {
        self.json::<wire::ErrorBody>().ok().and_then(|body| body.code)
    }
}

/// Something that answers protocol requests.
pub trait Transport {
    fn send(&self, request: &Request) -> Response;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: &Request) -> Response {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Response {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let response = Response::error(404, Some(101), "Bug #9 does not exist.");
        assert_eq!(response.status, 404);
        let body: Value = response.json().unwrap();
        assert_eq!(body["code"], 101);
        assert_eq!(body["error"], true);
        assert_eq!(response.message().as_deref(), Some("Bug #9 does not exist."));
    }

    #[test]
    fn success_range() {
        assert!(Response::status_only(201).is_success());
        assert!(!Response::status_only(401).is_success());
        assert!(Response::status_only(401).message().is_none());
    }
}
