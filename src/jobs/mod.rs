pub mod historical_sweep;
pub mod tip_sync;

use std::time::Duration;

use tokio::sync::watch;

/// Sleep for `duration` unless shutdown is signalled first.
/// Returns true when the caller should stop.
pub(crate) async fn wait_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    duration: Duration,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        result = shutdown.changed() => match result {
            Ok(()) => *shutdown.borrow(),
            // Sender dropped means the process is going down
            Err(_) => true,
        },
    }
}
