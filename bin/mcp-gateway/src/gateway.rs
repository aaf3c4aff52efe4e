//! Per-request dispatch: local endpoints, then the MCP proxy

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use mcp_core::ProxyError;
use mcp_proxy::{ErrorResponder, McpProxy, MetricsCollector, MiddlewareChain, MiddlewareContext, ProxyResponse};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Shared state for every connection
#[derive(Clone)]
pub struct Gateway {
    proxy: McpProxy,
    middleware: Arc<MiddlewareChain>,
    metrics: MetricsCollector,
}

impl Gateway {
    pub fn new(proxy: McpProxy, middleware: MiddlewareChain, metrics: MetricsCollector) -> Self {
        Self {
            proxy,
            middleware: Arc::new(middleware),
            metrics,
        }
    }

    /// Serve `/healthz` and `/metrics` locally; everything else goes through the proxy
    pub async fn handle<B>(&self, req: Request<B>) -> Result<ProxyResponse, Infallible>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path().to_string();

        if path == "/healthz" {
            return Ok(text_response(StatusCode::OK, "text/plain", "OK\n".to_string()));
        }

        if path == "/metrics" && req.method() == Method::GET {
            let metrics_text = self
                .metrics
                .gather()
                .unwrap_or_else(|_| "Failed to gather metrics\n".to_string());
            return Ok(text_response(
                StatusCode::OK,
                "text/plain; version=0.0.4",
                metrics_text,
            ));
        }

        let context = MiddlewareContext::from_request(&req);
        if let Err(e) = self.middleware.on_request(&context).await {
            debug!("Middleware on_request error: {}", e);
        }

        let (parts, body) = req.into_parts();
        let result = match body.collect().await {
            Ok(collected) => {
                self.proxy
                    .proxy(Request::from_parts(parts, collected.to_bytes()))
                    .await
            }
            Err(e) => Err(ProxyError::InvalidRequest(format!(
                "failed to read request body: {}",
                e
            ))),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if let Err(mw_err) = self.middleware.on_error(&context, &e.to_string()).await {
                    debug!("Middleware on_error error: {}", mw_err);
                }
                ErrorResponder::respond(&e)
            }
        };

        if let Err(e) = self
            .middleware
            .on_response(&context, response.status().as_u16())
            .await
        {
            debug!("Middleware on_response error: {}", e);
        }

        Ok(response)
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> ProxyResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
