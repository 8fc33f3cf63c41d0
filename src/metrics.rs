use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

/// How an operation went wrong, for the `api_error` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NilFunction,
    Panic,
    OperationError,
    ResultError,
}

impl ApiErrorKind {
    fn tag(self) -> &'static str {
        match self {
            ApiErrorKind::NilFunction => "nil_function",
            ApiErrorKind::Panic => "panic",
            ApiErrorKind::OperationError => "operation_error",
            ApiErrorKind::ResultError => "result_error",
        }
    }
}

/// Minimal counters for operational visibility.
#[derive(Debug, Default)]
pub struct Metrics {
    api_requests: AtomicU64,
    api_errors_nil_function: AtomicU64,
    api_errors_panic: AtomicU64,
    api_errors_operation: AtomicU64,
    api_errors_result: AtomicU64,
    messages_dropped: AtomicU64,
    handler_retries: AtomicU64,
    rate_limited: AtomicU64,
    operation_count: AtomicU64,
    operation_micros: AtomicU64,
}

impl Metrics {
    pub fn record_api_request(&self, operation: &str) {
        debug!(operation, "api request");
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_error(&self, operation: &str, kind: ApiErrorKind) {
        debug!(operation, error_kind = kind.tag(), "api error");
        let counter = match kind {
            ApiErrorKind::NilFunction => &self.api_errors_nil_function,
            ApiErrorKind::Panic => &self.api_errors_panic,
            ApiErrorKind::OperationError => &self.api_errors_operation,
            ApiErrorKind::ResultError => &self.api_errors_result,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duration(&self, operation: &str, elapsed: Duration) {
        debug!(operation, micros = elapsed.as_micros() as u64, "operation finished");
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        self.operation_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_retry(&self) {
        self.handler_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_requests(&self) -> u64 {
        self.api_requests.load(Ordering::Relaxed)
    }

    pub fn api_errors(&self, kind: ApiErrorKind) -> u64 {
        match kind {
            ApiErrorKind::NilFunction => &self.api_errors_nil_function,
            ApiErrorKind::Panic => &self.api_errors_panic,
            ApiErrorKind::OperationError => &self.api_errors_operation,
            ApiErrorKind::ResultError => &self.api_errors_result,
        }
        .load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn handler_retries(&self) -> u64 {
        self.handler_retries.load(Ordering::Relaxed)
    }

    pub fn rate_limited(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    pub fn operations_timed(&self) -> u64 {
        self.operation_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_by_kind() {
        let metrics = Metrics::default();
        metrics.record_api_request("round_created");
        metrics.record_api_request("round_created");
        metrics.record_api_error("round_created", ApiErrorKind::Panic);
        metrics.record_api_error("round_created", ApiErrorKind::ResultError);
        metrics.record_duration("round_created", Duration::from_millis(3));

        assert_eq!(metrics.api_requests(), 2);
        assert_eq!(metrics.api_errors(ApiErrorKind::Panic), 1);
        assert_eq!(metrics.api_errors(ApiErrorKind::ResultError), 1);
        assert_eq!(metrics.api_errors(ApiErrorKind::NilFunction), 0);
        assert_eq!(metrics.operations_timed(), 1);
    }
}
