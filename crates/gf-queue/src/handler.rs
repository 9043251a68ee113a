//! The [`JobHandler`] trait.

use async_trait::async_trait;

use crate::context::JobContext;

/// Processing function for one job type.
///
/// The engine calls [`process`](JobHandler::process) once per dispatch.
/// Returning `Ok` completes the job; returning `Err` fails it and lets the
/// engine decide between a delayed retry and the terminal `failed` state.
/// Handlers should watch [`JobContext::cancellation`]: the engine may drop
/// the future at any await point once the token fires.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn process(&self, ctx: JobContext) -> gf_core::Result<()>;
}
