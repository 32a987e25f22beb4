use tokio::time::Instant;

use super::network::{ThroughputMeter, TrafficCounter};
use super::{Reading, SensorBackend, SensorCategory, SensorSource};
use self::Reduce::{First, Max, Mean};
use super::SensorBackend::{Builtin, HardwareMonitor, Nvml, Registry, ThermalZone};

/// One full hardware reading, built fresh every slow tick and pushed immediately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cpu_temp: i32,
    pub cpu_usage: i32,
    /// GHz, one decimal.
    pub cpu_clock: f64,
    pub ram_used: i32,
    pub ram_total: i32,
    pub gpu_temp: i32,
    pub gpu_usage: i32,
    /// Mbps, one decimal.
    pub net_down: f64,
    /// Mbps, one decimal.
    pub net_up: f64,
}

/// A logical metric resolved through its own fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CpuTemp,
    CpuLoad,
    CpuClock,
    GpuTemp,
    GpuLoad,
    RamUsed,
    RamTotal,
}

/// How multiple matching readings from one step collapse into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    First,
    Mean,
    Max,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainStep {
    pub backend: SensorBackend,
    pub fragments: &'static [&'static str],
    pub reduce: Reduce,
}

const fn step(
    backend: SensorBackend,
    fragments: &'static [&'static str],
    reduce: Reduce,
) -> ChainStep {
    ChainStep { backend, fragments, reduce }
}

const CPU_TEMP_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["cpu package"], First),
    step(HardwareMonitor, &["core max"], First),
    step(Registry, &["cpu", "temp"], First),
    step(Registry, &["package", "temp"], First),
    step(Registry, &["core", "temp"], First),
    step(ThermalZone, &[], Max),
    step(Builtin, &["package"], First),
    step(Builtin, &["core"], Max),
    step(Builtin, &["tctl"], First),
];

const CPU_LOAD_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["cpu total"], First),
    step(Registry, &["cpu", "usage"], First),
    step(Builtin, &["cpu total"], First),
];

const CPU_CLOCK_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["cpu core"], Mean),
    step(Registry, &["core", "clock"], Mean),
    step(Builtin, &["cpu core"], Mean),
];

const GPU_TEMP_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["gpu core"], First),
    step(Nvml, &["gpu"], First),
];

const GPU_LOAD_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["gpu core"], First),
    step(Nvml, &["gpu"], First),
];

const RAM_USED_STEPS: &[ChainStep] = &[
    step(HardwareMonitor, &["memory used"], First),
    step(Builtin, &["memory used"], First),
];

const RAM_TOTAL_STEPS: &[ChainStep] = &[step(Builtin, &["memory total"], First)];

impl Metric {
    pub fn category(self) -> SensorCategory {
        match self {
            Metric::CpuTemp | Metric::GpuTemp => SensorCategory::Temperature,
            Metric::CpuLoad | Metric::GpuLoad => SensorCategory::Load,
            Metric::CpuClock => SensorCategory::Clock,
            Metric::RamUsed | Metric::RamTotal => SensorCategory::Data,
        }
    }

    /// Canonical step order before the configured backend priority is applied.
    pub fn steps(self) -> &'static [ChainStep] {
        match self {
            Metric::CpuTemp => CPU_TEMP_STEPS,
            Metric::CpuLoad => CPU_LOAD_STEPS,
            Metric::CpuClock => CPU_CLOCK_STEPS,
            Metric::GpuTemp => GPU_TEMP_STEPS,
            Metric::GpuLoad => GPU_LOAD_STEPS,
            Metric::RamUsed => RAM_USED_STEPS,
            Metric::RamTotal => RAM_TOTAL_STEPS,
        }
    }

    /// Inclusive upper bound of a plausible reading. Zero and below never count.
    fn plausible_max(self) -> f64 {
        match self.category() {
            SensorCategory::Temperature => 150.0,
            SensorCategory::Load => 100.0,
            SensorCategory::Clock => 10_000.0,
            SensorCategory::Data => 4096.0,
        }
    }

    pub fn classify(self, value: f64) -> Reading {
        if value.is_finite() && value > 0.0 && value <= self.plausible_max() {
            Reading::Value(value)
        } else {
            Reading::Invalid(value)
        }
    }
}

/// Owns every sensor source and resolves each [`Metric`] to the first plausible
/// reading along its chain.
pub struct SensorAggregator {
    sources: Vec<Box<dyn SensorSource>>,
    priority: Vec<SensorBackend>,
    traffic: Box<dyn TrafficCounter>,
    throughput: ThroughputMeter,
}

impl SensorAggregator {
    pub fn new(
        sources: Vec<Box<dyn SensorSource>>,
        priority: Vec<SensorBackend>,
        traffic: Box<dyn TrafficCounter>,
    ) -> Self {
        Self {
            sources,
            priority,
            traffic,
            throughput: ThroughputMeter::default(),
        }
    }

    /// The metric's steps, stably re-ordered by backend priority. Backends
    /// missing from the priority list are dropped.
    pub fn chain(&self, metric: Metric) -> Vec<ChainStep> {
        let mut steps: Vec<(usize, ChainStep)> = metric
            .steps()
            .iter()
            .filter_map(|s| {
                self.priority
                    .iter()
                    .position(|b| *b == s.backend)
                    .map(|rank| (rank, *s))
            })
            .collect();
        steps.sort_by_key(|(rank, _)| *rank);
        steps.into_iter().map(|(_, s)| s).collect()
    }

    /// Runs a single chain step.
    pub fn run_step(&mut self, metric: Metric, step: &ChainStep) -> Reading {
        let Some(source) = self
            .sources
            .iter_mut()
            .find(|s| s.backend() == step.backend)
        else {
            return Reading::Unavailable;
        };
        if !source.is_available() {
            return Reading::Unavailable;
        }

        let values = match source.query(metric.category(), step.fragments) {
            Ok(values) => values,
            Err(e) => {
                log::debug!("{metric:?}: {e}");
                return Reading::Unavailable;
            }
        };
        // Each value is checked on its own so one stuck sensor cannot hide the rest.
        let (plausible, rejected): (Vec<f64>, Vec<f64>) = values
            .into_iter()
            .partition(|v| matches!(metric.classify(*v), Reading::Value(_)));
        match (reduce(&plausible, step.reduce), rejected.first()) {
            (Some(value), _) => Reading::Value(value),
            (None, Some(bad)) => Reading::Invalid(*bad),
            (None, None) => Reading::Unavailable,
        }
    }

    /// First plausible reading along the chain, or `None` if it is exhausted.
    pub fn resolve(&mut self, metric: Metric) -> Option<f64> {
        for step in self.chain(metric) {
            match self.run_step(metric, &step) {
                Reading::Value(v) => return Some(v),
                Reading::Invalid(v) => {
                    log::debug!("{metric:?}: {:?} returned implausible {v}", step.backend)
                }
                Reading::Unavailable => {}
            }
        }
        None
    }

    /// Collects every metric. Missing metrics default to zero; this never fails.
    pub fn snapshot(&mut self, now: Instant) -> MetricsSnapshot {
        let (net_down, net_up) = match self.traffic.totals() {
            Some((received, sent)) => self.throughput.sample(received, sent, now),
            None => (0.0, 0.0),
        };
        let clock_mhz = self.resolve(Metric::CpuClock).unwrap_or(0.0);

        MetricsSnapshot {
            cpu_temp: self.resolve_int(Metric::CpuTemp),
            cpu_usage: self.resolve_int(Metric::CpuLoad),
            cpu_clock: round1(clock_mhz / 1000.0),
            ram_used: self.resolve_int(Metric::RamUsed),
            ram_total: self.resolve_int(Metric::RamTotal),
            gpu_temp: self.resolve_int(Metric::GpuTemp),
            gpu_usage: self.resolve_int(Metric::GpuLoad),
            net_down,
            net_up,
        }
    }

    fn resolve_int(&mut self, metric: Metric) -> i32 {
        self.resolve(metric).map(|v| v as i32).unwrap_or(0)
    }
}

fn reduce(values: &[f64], how: Reduce) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match how {
        Reduce::First => values.first().copied(),
        Reduce::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        Reduce::Max => values.iter().copied().reduce(f64::max),
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
