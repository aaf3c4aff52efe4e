//! Rewriting upstream responses for the client

use crate::forwarder::UpstreamResponse;
use crate::responder::ProxyResponse;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::Response;
use serde_json::Value;

/// Shape of an upstream body
#[derive(Debug, PartialEq)]
pub enum BodyShape {
    Json(Value),
    /// Anything that does not parse as JSON, event streams included
    Raw,
}

impl BodyShape {
    pub fn sniff(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => BodyShape::Json(value),
            Err(_) => BodyShape::Raw,
        }
    }
}

/// Build the client response from an upstream response.
///
/// JSON bodies are re-serialized, other bodies pass through byte for byte.
/// The status is kept and upstream headers replace local defaults.
pub fn rehydrate(upstream: UpstreamResponse) -> ProxyResponse {
    let UpstreamResponse {
        status,
        headers,
        body,
    } = upstream;

    let mut response = match BodyShape::sniff(&body) {
        BodyShape::Json(value) => {
            let body = serde_json::to_vec(&value).map(Bytes::from).unwrap_or(body);
            let mut response = Response::new(Full::new(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        BodyShape::Raw => Response::new(Full::new(body)),
    };
    *response.status_mut() = status;

    let target = response.headers_mut();
    for name in headers.keys() {
        target.remove(name);
    }
    for (name, value) in headers.iter() {
        if !is_framing_header(name) {
            target.append(name.clone(), value.clone());
        }
    }

    response
}

/// Headers describing upstream message framing; the body is re-framed locally
fn is_framing_header(name: &HeaderName) -> bool {
    *name == CONTENT_LENGTH
        || matches!(
            name.as_str(),
            "connection" | "keep-alive" | "transfer-encoding" | "trailer" | "upgrade"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header::{HeaderMap, SET_COOKIE};
    use hyper::StatusCode;
    use serde_json::json;

    fn upstream(status: StatusCode, headers: &[(&'static str, &'static str)], body: &'static [u8]) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        UpstreamResponse {
            status,
            headers: map,
            body: Bytes::from_static(body),
        }
    }

    async fn body_bytes(response: ProxyResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_sniff() {
        assert_eq!(BodyShape::sniff(br#"{"a":1}"#), BodyShape::Json(json!({"a": 1})));
        assert_eq!(BodyShape::sniff(b"42"), BodyShape::Json(json!(42)));
        assert_eq!(BodyShape::sniff(b"event: message\ndata: {}\n\n"), BodyShape::Raw);
        assert_eq!(BodyShape::sniff(b""), BodyShape::Raw);
    }

    #[tokio::test]
    async fn test_json_body_round_trip() {
        let response = rehydrate(upstream(
            StatusCode::CREATED,
            &[("x-request-id", "r1"), ("content-length", "999")],
            br#"{ "result" : { "tools" : [ ] } }"#,
        ));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["x-request-id"], "r1");
        assert!(response.headers().get(CONTENT_LENGTH).is_none());

        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"result": {"tools": []}}));
    }

    #[tokio::test]
    async fn test_raw_body_passes_through() {
        let raw: &'static [u8] = b"event: message\ndata: {\"id\":1}\n\n";
        let response = rehydrate(upstream(
            StatusCode::OK,
            &[("content-type", "text/event-stream")],
            raw,
        ));

        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(body_bytes(response).await, Bytes::from_static(raw));
    }

    #[tokio::test]
    async fn test_upstream_headers_override_defaults() {
        let response = rehydrate(upstream(
            StatusCode::BAD_REQUEST,
            &[
                ("content-type", "application/json; charset=utf-8"),
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
            ],
            br#"{"error":"bad"}"#,
        ));

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get_all(CONTENT_TYPE).iter().collect::<Vec<_>>(),
            vec!["application/json; charset=utf-8"]
        );
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }
}
