/// LibreHardwareMonitor sensors, read through the WMI namespace it publishes
/// (`root\LibreHardwareMonitor`, class `Sensor`). LHM has to run elevated with
/// its WMI provider enabled; otherwise the namespace is missing or empty and
/// this source stays unavailable.
use super::{SensorBackend, SensorCategory, SensorError, SensorSource};

/// WMI `SensorType` string for a category.
pub fn sensor_type(category: SensorCategory) -> &'static str {
    match category {
        SensorCategory::Temperature => "Temperature",
        SensorCategory::Load => "Load",
        SensorCategory::Clock => "Clock",
        SensorCategory::Data => "Data",
    }
}

pub struct HardwareMonitorSource {
    #[cfg(windows)]
    conn: Option<wmi::WMIConnection>,
}

#[cfg(windows)]
mod imp {
    use serde::Deserialize;

    pub const NAMESPACE: &str = r"root\LibreHardwareMonitor";

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct LhmSensor {
        pub name: String,
        pub value: Option<f32>,
    }

    pub fn select(sensor_type: &str) -> String {
        format!("SELECT Name, Value FROM Sensor WHERE SensorType='{sensor_type}'")
    }
}

impl HardwareMonitorSource {
    #[cfg(windows)]
    pub fn detect() -> Self {
        let conn = match wmi::WMIConnection::with_namespace_path(imp::NAMESPACE) {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("LibreHardwareMonitor WMI namespace not reachable: {e}");
                return Self { conn: None };
            }
        };

        let check: Result<Vec<imp::LhmSensor>, _> = conn.raw_query(imp::select("Temperature"));
        match check {
            Ok(sensors) if !sensors.is_empty() => {
                log::info!("LibreHardwareMonitor connected ({} temperature sensors)", sensors.len());
                Self { conn: Some(conn) }
            }
            Ok(_) => {
                log::warn!("LibreHardwareMonitor: no sensors found (run as Admin?)");
                Self { conn: None }
            }
            Err(e) => {
                log::warn!("LibreHardwareMonitor test query failed: {e}");
                Self { conn: None }
            }
        }
    }

    #[cfg(not(windows))]
    pub fn detect() -> Self {
        Self {}
    }
}

impl SensorSource for HardwareMonitorSource {
    fn backend(&self) -> SensorBackend {
        SensorBackend::HardwareMonitor
    }

    fn is_available(&self) -> bool {
        #[cfg(windows)]
        {
            self.conn.is_some()
        }
        #[cfg(not(windows))]
        {
            false
        }
    }

    #[cfg(windows)]
    fn query(
        &mut self,
        category: SensorCategory,
        fragments: &[&str],
    ) -> Result<Vec<f64>, SensorError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or(SensorError::Unavailable(SensorBackend::HardwareMonitor))?;
        let sensors: Vec<imp::LhmSensor> = conn
            .raw_query(imp::select(sensor_type(category)))
            .map_err(|e| SensorError::Query {
                backend: SensorBackend::HardwareMonitor,
                detail: e.to_string(),
            })?;
        Ok(sensors
            .into_iter()
            .filter(|s| super::label_matches(&s.name, fragments))
            .filter_map(|s| s.value.map(f64::from))
            .collect())
    }

    #[cfg(not(windows))]
    fn query(&mut self, _: SensorCategory, _: &[&str]) -> Result<Vec<f64>, SensorError> {
        Err(SensorError::Unavailable(SensorBackend::HardwareMonitor))
    }
}
