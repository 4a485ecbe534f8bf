//! API endpoint handlers.
//!
//! Store access from handlers goes through [`with_store`], which retries
//! transient SQLite failures with the storage preset.

pub mod assessments;
pub mod health;
pub mod situation;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{AssessmentStore, StoreError};
use crate::pipeline::retry::execute_with_retry;

/// Run a synchronous store call under the storage retry policy.
pub(crate) async fn with_store<T, F>(
    ctx: &ApiContext,
    operation: &str,
    call: F,
) -> Result<T, ApiError>
where
    F: Fn(&dyn AssessmentStore) -> Result<T, StoreError>,
{
    let store = ctx.store.as_ref();
    execute_with_retry(operation, &ctx.storage_retry, |_| {
        let result = call(store);
        async move { result }
    })
    .await
    .map_err(ApiError::from)
}
