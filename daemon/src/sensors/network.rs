use sysinfo::Networks;
use tokio::time::Instant;

use super::chain::round1;

const BYTES_PER_MEGABIT: f64 = 1_048_576.0 / 8.0;

/// Cumulative byte counters summed over every interface.
pub trait TrafficCounter {
    /// `(bytes_received, bytes_sent)`, or `None` if the counters cannot be read.
    fn totals(&mut self) -> Option<(u64, u64)>;
}

/// Interface counters from `sysinfo`.
pub struct SysinfoTraffic {
    networks: Networks,
}

impl SysinfoTraffic {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl TrafficCounter for SysinfoTraffic {
    fn totals(&mut self) -> Option<(u64, u64)> {
        self.networks.refresh();
        if self.networks.is_empty() {
            return None;
        }
        let totals = self
            .networks
            .values()
            .fold((0u64, 0u64), |(rx, tx), data| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });
        Some(totals)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkCounterSample {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub at: Instant,
}

/// Turns successive counter samples into megabit-per-second rates. Keeps only
/// the previous sample.
#[derive(Debug, Default)]
pub struct ThroughputMeter {
    last: Option<NetworkCounterSample>,
}

impl ThroughputMeter {
    /// Records a sample and returns `(down_mbps, up_mbps)` since the previous
    /// one. The first sample, or one taken with no elapsed time, yields zeros.
    pub fn sample(&mut self, bytes_received: u64, bytes_sent: u64, at: Instant) -> (f64, f64) {
        let current = NetworkCounterSample {
            bytes_received,
            bytes_sent,
            at,
        };
        let previous = self.last.replace(current);

        let Some(previous) = previous else {
            return (0.0, 0.0);
        };
        let elapsed = current.at.saturating_duration_since(previous.at).as_secs_f64();
        if elapsed <= 0.0 {
            return (0.0, 0.0);
        }

        (
            rate_mbps(previous.bytes_received, current.bytes_received, elapsed),
            rate_mbps(previous.bytes_sent, current.bytes_sent, elapsed),
        )
    }
}

/// A counter that went backwards (interface reset) reads as zero.
fn rate_mbps(before: u64, after: u64, elapsed_secs: f64) -> f64 {
    let delta = after.saturating_sub(before) as f64;
    round1(delta / elapsed_secs / BYTES_PER_MEGABIT)
}
