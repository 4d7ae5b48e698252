use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::core::error::{ChartServerError, ChartServerResult};

/// Drive `operation` to completion unless the client cancels the request first.
///
/// On cancellation the operation future is dropped, which aborts any
/// in-flight HTTP request it owns. A token that is already cancelled wins
/// over a future that is ready on its first poll.
pub async fn run_cancellable<F, T>(
    token: &CancellationToken,
    operation: &'static str,
    future: F,
) -> ChartServerResult<T>
where
    F: Future<Output = ChartServerResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::info!("{} cancelled by client", operation);
            Err(ChartServerError::Cancelled { operation })
        }
        result = future => result,
    }
}
