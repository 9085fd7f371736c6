//! Real-time pacing: sleeps the producer so that wall-clock elapsed tracks
//! the DTS elapsed across a stream of [`crate::av::MediaPacket`]s.

use tokio::time::{sleep, Duration, Instant};

use crate::config::Config;

/// Milliseconds beyond which a DTS jump between consecutive packets
/// re-anchors the pacer instead of sleeping through the gap.
const REANCHOR_THRESHOLD_MS: i64 = 5000;

/// Step size used while waiting for wall-clock to catch up to DTS.
const SLEEP_STEP: Duration = Duration::from_millis(10);

/// Paces packet emission to real time using packet DTS in milliseconds.
///
/// Packets without a DTS pass through unpaced — the alternative would block
/// forever waiting for a timestamp that will never resolve.
pub struct Pacer {
    anchor: Option<(i64, Instant)>,
    reanchor_ms: i64,
    slack_ms: i64,
}

impl Pacer {
    /// Creates a pacer using the reanchor/slack thresholds from [`Config`].
    pub fn new() -> Self {
        let config = Config::get();
        Self {
            anchor: None,
            reanchor_ms: config.pacer_reanchor_ms,
            slack_ms: config.pacer_slack_ms,
        }
    }

    /// Resets the anchor; the next call to [`Pacer::wait_for`] establishes a
    /// fresh `(dts, now)` reference point.
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Blocks until wall-clock elapsed since the anchor has caught up to
    /// `dts_ms` elapsed since the anchor, minus the configured slack.
    ///
    /// `dts_ms` of `None` passes through without sleeping.
    pub async fn wait_for(&mut self, dts_ms: Option<i64>) {
        let Some(dts) = dts_ms else {
            return;
        };

        let (anchor_dts, anchor_at) = match self.anchor {
            None => {
                let now = Instant::now();
                self.anchor = Some((dts, now));
                return;
            }
            Some(a) => a,
        };

        if (dts - anchor_dts).abs() > self.reanchor_ms {
            self.anchor = Some((dts, Instant::now()));
            return;
        }

        let target_elapsed_ms = (dts - anchor_dts) - self.slack_ms;
        if target_elapsed_ms <= 0 {
            return;
        }

        loop {
            let wall_elapsed_ms = anchor_at.elapsed().as_millis() as i64;
            if wall_elapsed_ms >= target_elapsed_ms {
                return;
            }
            sleep(SLEEP_STEP).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_packet_anchors_without_sleeping() {
        let mut pacer = Pacer::new();
        let start = Instant::now();
        pacer.wait_for(Some(0)).await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn no_dts_passes_through_unpaced() {
        let mut pacer = Pacer::new();
        pacer.wait_for(Some(0)).await;
        let start = Instant::now();
        pacer.wait_for(None).await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn large_jump_reanchors_instead_of_sleeping() {
        let mut pacer = Pacer::new();
        pacer.wait_for(Some(0)).await;
        let start = Instant::now();
        pacer.wait_for(Some(60_000)).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
