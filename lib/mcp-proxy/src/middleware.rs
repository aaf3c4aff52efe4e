//! Middleware hooks around every proxied request

use anyhow::Result;
use hyper::Request;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, span, Instrument, Level};

/// Context passed through the middleware chain
#[derive(Clone)]
pub struct MiddlewareContext {
    pub path: String,
    pub method: String,
    /// Number of inbound headers; values are not retained since they carry credentials
    pub header_count: usize,
    pub started_at: Instant,
}

impl MiddlewareContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            header_count: 0,
            started_at: Instant::now(),
        }
    }

    /// Create a context from any request
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let mut context = Self::new(req.method().as_str(), req.uri().path());
        context.header_count = req.headers().len();
        context
    }

    /// Seconds since the request entered the chain
    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Middleware trait for observing requests and responses
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str {
        "UnnamedMiddleware"
    }

    /// Called before the request is routed
    async fn on_request(&self, _context: &MiddlewareContext) -> Result<()> {
        Ok(())
    }

    /// Called with the final status, error responses included
    async fn on_response(&self, _context: &MiddlewareContext, _status: u16) -> Result<()> {
        Ok(())
    }

    /// Called when the proxy pipeline fails, before the error response is sent
    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        Ok(())
    }
}

/// Chain of middleware executed in order
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Append a middleware to the end of the chain
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        for mw in &self.middleware {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_request(context).instrument(span).await?;
        }
        Ok(())
    }

    /// Runs in reverse order
    pub async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        for mw in self.middleware.iter().rev() {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_response(context, status).instrument(span).await?;
        }
        Ok(())
    }

    pub async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        for mw in &self.middleware {
            let span = span!(Level::DEBUG, "middleware", name = mw.name());
            mw.on_error(context, error).instrument(span).await?;
        }
        Ok(())
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs method, path, status and duration
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        debug!(
            "Request: {} {} (headers: {})",
            context.method, context.path, context.header_count
        );
        Ok(())
    }

    async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        debug!(
            "Response: {} {} -> {} (duration: {}ms)",
            context.method,
            context.path,
            status,
            context.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    async fn on_error(&self, context: &MiddlewareContext, error: &str) -> Result<()> {
        debug!("Error: {} {} - {}", context.method, context.path, error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Recording {
        order: Arc<Mutex<Vec<String>>>,
        label: &'static str,
    }

    #[async_trait::async_trait]
    impl Middleware for Recording {
        async fn on_request(&self, _context: &MiddlewareContext) -> Result<()> {
            self.order.lock().unwrap().push(format!("req:{}", self.label));
            Ok(())
        }

        async fn on_response(&self, _context: &MiddlewareContext, _status: u16) -> Result<()> {
            self.order.lock().unwrap().push(format!("resp:{}", self.label));
            Ok(())
        }
    }

    struct Failing(AtomicUsize);

    #[async_trait::async_trait]
    impl Middleware for Failing {
        async fn on_request(&self, _context: &MiddlewareContext) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("rejected")
        }
    }

    #[test]
    fn test_context_from_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/oap_mcp/proxy/abc?x=1")
            .header("cookie", "a=b")
            .body(())
            .unwrap();

        let context = MiddlewareContext::from_request(&req);
        assert_eq!(context.method, "POST");
        assert_eq!(context.path, "/api/oap_mcp/proxy/abc");
        assert_eq!(context.header_count, 1);
    }

    #[tokio::test]
    async fn test_chain_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .add(Recording { order: order.clone(), label: "a" })
            .add(Recording { order: order.clone(), label: "b" });
        let context = MiddlewareContext::new("GET", "/test");

        chain.on_request(&context).await.unwrap();
        chain.on_response(&context, 200).await.unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["req:a", "req:b", "resp:b", "resp:a"]
        );
    }

    #[tokio::test]
    async fn test_chain_stops_on_error() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .add(Failing(AtomicUsize::new(0)))
            .add(Recording { order: order.clone(), label: "after" });

        let context = MiddlewareContext::new("GET", "/test");
        assert!(chain.on_request(&context).await.is_err());
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logging_middleware() {
        let chain = MiddlewareChain::default().add(LoggingMiddleware);
        assert_eq!(chain.len(), 1);

        let context = MiddlewareContext::new("GET", "/test");
        assert!(chain.on_request(&context).await.is_ok());
        assert!(chain.on_response(&context, 200).await.is_ok());
        assert!(chain.on_error(&context, "boom").await.is_ok());
    }
}
