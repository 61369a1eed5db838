use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Calls `emit` every `period` until cancelled or until `emit` returns `false`
/// (its receiver is gone).
///
/// Late ticks are skipped rather than bursted, so a stalled consumer sees one
/// tick when it resumes.
pub async fn forward_ticks<F>(period: Duration, cancel: CancellationToken, mut emit: F)
where
    F: FnMut(Instant) -> bool,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("clock cancelled");
                break;
            }
            tick = interval.tick() => {
                if !emit(tick.into_std()) {
                    debug!("clock receiver closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_when_receiver_closes() {
        let mut seen = 0;
        forward_ticks(Duration::from_millis(5), CancellationToken::new(), |_| {
            seen += 1;
            seen < 5
        })
        .await;
        assert_eq!(seen, 5);
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut seen = 0u32;
        forward_ticks(Duration::from_millis(5), cancel, |_| {
            seen += 1;
            if seen == 3 {
                trigger.cancel();
            }
            true
        })
        .await;
        assert_eq!(seen, 3);
    }
}
