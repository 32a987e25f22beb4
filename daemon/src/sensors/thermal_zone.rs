/// ACPI thermal zones (`root\WMI`, `MSAcpi_ThermalZoneTemperature`). Only
/// answers temperature queries; the zones have no meaningful labels, so name
/// fragments are ignored and every zone is returned.
use super::{SensorBackend, SensorCategory, SensorError, SensorSource};

/// Converts the WMI reading (tenths of a Kelvin) to degrees Celsius.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn decikelvin_to_celsius(raw: u32) -> f64 {
    raw as f64 / 10.0 - 273.15
}

pub struct ThermalZoneSource {
    #[cfg(windows)]
    conn: Option<wmi::WMIConnection>,
}

#[cfg(windows)]
mod imp {
    use serde::Deserialize;

    pub const NAMESPACE: &str = r"root\WMI";
    pub const QUERY: &str = "SELECT CurrentTemperature FROM MSAcpi_ThermalZoneTemperature";

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct ThermalZone {
        pub current_temperature: Option<u32>,
    }
}

impl ThermalZoneSource {
    #[cfg(windows)]
    pub fn detect() -> Self {
        let conn = match wmi::WMIConnection::with_namespace_path(imp::NAMESPACE) {
            Ok(conn) => conn,
            Err(e) => {
                log::debug!("root\\WMI namespace not reachable: {e}");
                return Self { conn: None };
            }
        };
        let zones: Result<Vec<imp::ThermalZone>, _> = conn.raw_query(imp::QUERY);
        match zones {
            Ok(zones) if !zones.is_empty() => Self { conn: Some(conn) },
            Ok(_) => {
                log::debug!("No ACPI thermal zones exposed");
                Self { conn: None }
            }
            Err(e) => {
                // Usually access denied when not elevated.
                log::debug!("ACPI thermal zone query failed: {e}");
                Self { conn: None }
            }
        }
    }

    #[cfg(not(windows))]
    pub fn detect() -> Self {
        Self {}
    }
}

impl SensorSource for ThermalZoneSource {
    fn backend(&self) -> SensorBackend {
        SensorBackend::ThermalZone
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
    fn query(&mut self, category: SensorCategory, _: &[&str]) -> Result<Vec<f64>, SensorError> {
        if category != SensorCategory::Temperature {
            return Ok(Vec::new());
        }
        let conn = self
            .conn
            .as_ref()
            .ok_or(SensorError::Unavailable(SensorBackend::ThermalZone))?;
        let zones: Vec<imp::ThermalZone> =
            conn.raw_query(imp::QUERY).map_err(|e| SensorError::Query {
                backend: SensorBackend::ThermalZone,
                detail: e.to_string(),
            })?;
        Ok(zones
            .into_iter()
            .filter_map(|z| z.current_temperature)
            .map(decikelvin_to_celsius)
            .collect())
    }

    #[cfg(not(windows))]
    fn query(&mut self, _: SensorCategory, _: &[&str]) -> Result<Vec<f64>, SensorError> {
        Err(SensorError::Unavailable(SensorBackend::ThermalZone))
    }
}
