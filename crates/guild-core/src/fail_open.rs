//! Fail-open utilities for graceful degradation
//!
//! For infrastructure work whose failure must not stop a workflow run, such as
//! persisting a status snapshot or ratifying decision records.
//!
//! DO NOT use fail-open for:
//! - Message delivery (capacity errors belong to the caller)
//! - Phase transitions (state)
//! - Deliverable validation (correctness)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use guild_core::fail_open::fail_open;
/// use guild_core::Result;
///
/// async fn persist_snapshot() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("status_snapshot", || persist_snapshot()).await;
///     // result is None if persist_snapshot() failed, otherwise Some(())
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
