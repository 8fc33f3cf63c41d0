use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use anyhow::anyhow;
use futures::FutureExt;
use tracing::{error, info_span, Instrument};

use crate::metrics::{ApiErrorKind, Metrics};
use crate::BotError;

/// Outcome envelope for one unit of side-effectful work.
///
/// `Failure` is a completed operation whose caller-visible outcome is
/// negative ("no target users found"); `Error` is an aborted one. The two
/// feed different counters and must not be collapsed into each other.
#[derive(Debug)]
pub enum OperationResult<T> {
    Success(T),
    Failure(String),
    Error(BotError),
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationResult::Failure(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OperationResult::Error(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            OperationResult::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            OperationResult::Failure(f) => Some(f),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BotError> {
        match self {
            OperationResult::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs `f` with a tracing span, a duration metric, panic recovery and
/// error normalization.
///
/// Returns `None` only when `f` panicked; the panic is not re-raised, so
/// a misbehaving handler cannot take the event loop down with it.
pub async fn run_operation<T, F, Fut>(
    name: &str,
    metrics: &Metrics,
    f: Option<F>,
) -> Option<OperationResult<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<OperationResult<T>, BotError>>,
{
    let Some(f) = f else {
        metrics.record_api_error(name, ApiErrorKind::NilFunction);
        return Some(OperationResult::Error(anyhow!("operation function is nil")));
    };

    let span = info_span!("operation", operation = name);
    let started = Instant::now();
    let outcome = AssertUnwindSafe(f().instrument(span.clone()))
        .catch_unwind()
        .await;
    metrics.record_duration(name, started.elapsed());

    match outcome {
        Err(panic) => {
            let _guard = span.enter();
            error!(operation = name, panic = ?panic_message(&panic), "operation panicked");
            metrics.record_api_error(name, ApiErrorKind::Panic);
            None
        }
        Ok(Err(e)) => {
            let _guard = span.enter();
            let wrapped = anyhow!("{} operation error: {}", name, e);
            error!(operation = name, error = %wrapped, "operation errored");
            metrics.record_api_error(name, ApiErrorKind::OperationError);
            Some(OperationResult::Error(wrapped))
        }
        Ok(Ok(OperationResult::Error(e))) => {
            let _guard = span.enter();
            error!(operation = name, error = %e, "operation returned error result");
            metrics.record_api_error(name, ApiErrorKind::ResultError);
            Some(OperationResult::Error(e))
        }
        Ok(Ok(result)) => {
            metrics.record_api_request(name);
            Some(result)
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
