//! Prometheus metrics middleware

use crate::middleware::{Middleware, MiddlewareContext};
use anyhow::Result;
use prometheus::{Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::debug;

/// Prometheus metrics for proxied requests
#[derive(Clone)]
pub struct MetricsCollector {
    /// Requests entering the proxy, by method
    pub requests_total: CounterVec,
    /// End-to-end latency, by method
    pub request_duration_seconds: HistogramVec,
    /// Responses sent, by status code
    pub responses_total: CounterVec,
    /// Requests that ended in a proxy error
    pub errors_total: Counter,
    /// Registry the metrics above are exported from
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create and register all proxy metrics in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total = CounterVec::new(
            Opts::new("mcp_proxy_requests_total", "Total proxied requests"),
            &["method"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mcp_proxy_request_duration_seconds",
                "Proxied request latency in seconds",
            ),
            &["method"],
        )?;

        let responses_total = CounterVec::new(
            Opts::new("mcp_proxy_responses_total", "Total responses by status"),
            &["status"],
        )?;

        let errors_total = Counter::new("mcp_proxy_errors_total", "Total failed proxied requests")?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            responses_total,
            errors_total,
            registry,
        })
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Records request counts, latency and status codes
pub struct MetricsMiddleware {
    pub collector: MetricsCollector,
}

impl MetricsMiddleware {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

#[async_trait::async_trait]
impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "MetricsMiddleware"
    }

    async fn on_request(&self, context: &MiddlewareContext) -> Result<()> {
        self.collector
            .requests_total
            .with_label_values(&[context.method.as_str()])
            .inc();
        Ok(())
    }

    async fn on_response(&self, context: &MiddlewareContext, status: u16) -> Result<()> {
        debug!("Recording response metrics for {} {} -> {}", context.method, context.path, status);

        self.collector
            .responses_total
            .with_label_values(&[status.to_string().as_str()])
            .inc();
        self.collector
            .request_duration_seconds
            .with_label_values(&[context.method.as_str()])
            .observe(context.elapsed_secs());
        Ok(())
    }

    async fn on_error(&self, _context: &MiddlewareContext, _error: &str) -> Result<()> {
        self.collector.errors_total.inc();
        Ok(())
    }
}
