//! Structured logging for bundle assembly

use uuid::Uuid;

/// Structured logger for assembly events
///
/// Every event carries the same `context_id`, so all records emitted while
/// building one bundle can be correlated.
#[derive(Debug, Clone)]
pub struct MarketLogger {
    context_id: String,
}

impl MarketLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    /// Logger with a fresh random context id
    pub fn new_context() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_assembly_start(&self, operation: &str, payer: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            operation = %operation,
            payer = %payer,
            "Assembling bundle"
        );
    }

    pub fn log_bootstrap(&self, operation: &str, account: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            operation = %operation,
            account = %account,
            "Token account will be created"
        );
    }

    pub fn log_assembled(&self, operation: &str, instructions: usize, bootstrap: usize, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            operation = %operation,
            instructions = %instructions,
            bootstrap = %bootstrap,
            latency_ms = %latency_ms,
            "Bundle assembled"
        );
    }

    pub fn log_assembly_failure(
        &self,
        operation: &str,
        category: &str,
        error: &str,
        endpoint: Option<&str>,
        latency_ms: u64,
    ) {
        tracing::warn!(
            context_id = %self.context_id,
            operation = %operation,
            category = %category,
            error = %error,
            endpoint = endpoint.unwrap_or("-"),
            latency_ms = %latency_ms,
            "Bundle assembly failed"
        );
    }

    pub fn log_scan(&self, kind: &str, kept: usize, total_seen: usize, dropped: usize) {
        tracing::info!(
            context_id = %self.context_id,
            kind = %kind,
            kept = %kept,
            total_seen = %total_seen,
            dropped = %dropped,
            "Scan completed"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            message = %message,
            "Warning"
        );
    }
}

impl Default for MarketLogger {
    fn default() -> Self {
        Self::new_context()
    }
}
