//! Background removal of expired entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ResultCache;

/// Spawn a task that sweeps `cache` every `interval` until `cancel` fires.
///
/// The first sweep runs one full interval after spawning.
pub fn spawn_sweeper(
  cache: Arc<ResultCache>,
  interval: Duration,
  cancel: CancellationToken,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    info!(interval_ms = interval.as_millis() as u64, "starting cache sweeper");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("cache sweeper cancelled");
              break;
          }
          _ = ticker.tick() => {
              let removed = cache.sweep();
              debug!(removed, "cache sweep tick");
          }
      }
    }
  })
}
