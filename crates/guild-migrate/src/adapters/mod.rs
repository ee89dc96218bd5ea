//! Destination platform adapters.
//!
//! Each adapter implements [`PlatformAdapter`](crate::core::PlatformAdapter)
//! over the platform's REST API using the shared [`RestClient`](crate::http::RestClient).

pub mod matrix;
pub mod stoat;

pub use matrix::MatrixAdapter;
pub use stoat::StoatAdapter;

use serde_json::Value;
use tracing::warn;

use crate::error::AdapterResult;
use crate::http::{Method, RestClient};
use crate::retry::RetryPolicy;

/// Send a request that decorates or attaches an entity that already exists,
/// under the retry policy.
///
/// Fatal errors propagate. Any other failure left after retrying is returned
/// as `Some(problem)` so the entity can be reported as degraded.
pub(crate) async fn follow_up(
    client: &RestClient,
    retry: &RetryPolicy,
    what: &str,
    method: Method,
    path: &str,
    body: Value,
) -> AdapterResult<Option<String>> {
    let body = &body;
    match retry
        .run(what, move || client.request(method, path, Some(body.clone())))
        .await
    {
        Ok(_) => Ok(None),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{} failed: {}", what, e);
            Ok(Some(format!("{} not applied: {}", what, e)))
        }
    }
}
