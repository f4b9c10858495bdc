//! Cancellation plumbing shared by the components.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::domain::CoordError;

/// Race `fut` against `cancel`. An already-cancelled token wins without
/// polling `fut`, so no remote call is started after cancellation.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    fut: F,
) -> Result<T, CoordError>
where
    F: Future<Output = Result<T, CoordError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoordError::Cancelled { operation }),
        result = fut => result,
    }
}
