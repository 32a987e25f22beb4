/// Hardware sensor sources and the fallback chain that turns them into a
/// [`MetricsSnapshot`](chain::MetricsSnapshot).
///
/// Every concrete source is checked once when it is constructed. A source that
/// fails that check reports [`SensorError::Unavailable`] for the rest of the
/// process lifetime; hardware-monitor services rarely come back without a
/// restart of the observer, so there is no mid-run retry.
use serde::Deserialize;

pub mod builtin;
pub mod chain;
pub mod hwmon;
pub mod network;
pub mod nvml;
pub mod registry;
pub mod thermal_zone;

pub use chain::{MetricsSnapshot, SensorAggregator};

/// Kind of reading a sensor reports. Values are always in the unit listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    /// Degrees Celsius.
    Temperature,
    /// Percent, 0–100.
    Load,
    /// Megahertz.
    Clock,
    /// Gigabytes.
    Data,
}

/// Identifies a concrete sensor source. Also the vocabulary of the
/// `[sensors] priority` config list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorBackend {
    /// LibreHardwareMonitor WMI namespace.
    HardwareMonitor,
    /// HWiNFO shared sensor table in the registry.
    Registry,
    /// ACPI thermal zones.
    ThermalZone,
    /// OS built-in counters via `sysinfo`.
    Builtin,
    /// NVIDIA Management Library.
    Nvml,
}

impl SensorBackend {
    /// Canonical fallback order used when the config does not override it.
    pub const DEFAULT_PRIORITY: [SensorBackend; 5] = [
        SensorBackend::HardwareMonitor,
        SensorBackend::Registry,
        SensorBackend::ThermalZone,
        SensorBackend::Builtin,
        SensorBackend::Nvml,
    ];
}

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The source failed its startup check or is not supported on this platform.
    #[error("{0:?} source is unavailable")]
    Unavailable(SensorBackend),

    /// The source is up but this particular query failed.
    #[error("{backend:?} query failed: {detail}")]
    Query {
        backend: SensorBackend,
        detail: String,
    },
}

/// Outcome of one step in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// A plausible value.
    Value(f64),
    /// The source is missing, failed, or had no matching sensor.
    Unavailable,
    /// A value was present but zero, non-finite or outside the plausible range.
    Invalid(f64),
}

/// A provider of named numeric readings.
pub trait SensorSource {
    fn backend(&self) -> SensorBackend;

    /// Result of the one-time capability check done at construction.
    fn is_available(&self) -> bool;

    /// Returns every reading in `category` whose label contains all of
    /// `fragments` (case-insensitive). An empty `fragments` slice matches
    /// every sensor in the category.
    fn query(
        &mut self,
        category: SensorCategory,
        fragments: &[&str],
    ) -> Result<Vec<f64>, SensorError>;
}

/// Case-insensitive "label contains every fragment" test shared by all sources.
pub fn label_matches(label: &str, fragments: &[&str]) -> bool {
    let label = label.to_lowercase();
    fragments
        .iter()
        .all(|fragment| label.contains(&fragment.to_lowercase()))
}

/// Detects every backend named in `priority` and returns the sources in that order.
/// Unavailable sources are kept; the chain skips them per query.
pub fn detect_sources(priority: &[SensorBackend]) -> Vec<Box<dyn SensorSource>> {
    let mut sources: Vec<Box<dyn SensorSource>> = Vec::with_capacity(priority.len());
    for backend in priority {
        let source: Box<dyn SensorSource> = match backend {
            SensorBackend::HardwareMonitor => Box::new(hwmon::HardwareMonitorSource::detect()),
            SensorBackend::Registry => Box::new(registry::RegistrySource::detect()),
            SensorBackend::ThermalZone => Box::new(thermal_zone::ThermalZoneSource::detect()),
            SensorBackend::Builtin => Box::new(builtin::BuiltinSource::detect()),
            SensorBackend::Nvml => Box::new(nvml::NvmlSource::detect()),
        };
        if source.is_available() {
            log::info!("Sensor source {backend:?} available");
        } else {
            log::info!("Sensor source {backend:?} unavailable, skipping");
        }
        sources.push(source);
    }
    sources
}
