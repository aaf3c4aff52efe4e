//! Structured JSON error responses

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use mcp_core::ProxyError;
use serde::Serialize;

pub type ProxyResponse = Response<Full<Bytes>>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Maps every failure class to its status and `{message, error?}` body
pub struct ErrorResponder;

impl ErrorResponder {
    pub fn respond(error: &ProxyError) -> ProxyResponse {
        let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::json(status, error.client_message(), error.detail())
    }

    /// JSON error body with an explicit status
    pub fn json(status: StatusCode, message: &str, detail: Option<&str>) -> ProxyResponse {
        let body = serde_json::to_vec(&ErrorBody {
            message,
            error: detail,
        })
        .unwrap_or_else(|_| br#"{"message":"Internal error"}"#.to_vec());

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
