//! Side channel for persistence failures
//!
//! A failed flush never reaches the code that submitted the records. The
//! writer hands the failure to a `DiagnosticSink` and moves on.

use tracing::error;

use crate::error::StoreError;

/// Receives flush failures; the failed batch has already been discarded
pub trait DiagnosticSink: Send + Sync {
    fn flush_failed(&self, batch_len: usize, error: &StoreError);
}

/// Default sink: log the failure
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn flush_failed(&self, batch_len: usize, error: &StoreError) {
        error!(batch_len, error = %error, "query log flush failed, batch discarded");
    }
}

impl<F> DiagnosticSink for F
where
    F: Fn(usize, &StoreError) + Send + Sync,
{
    fn flush_failed(&self, batch_len: usize, error: &StoreError) {
        TracingSink.flush_failed(batch_len, error);
        self(batch_len, error)
    }
}
