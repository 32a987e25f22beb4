/// NVIDIA Management Library, the vendor GPU SDK behind nvidia-smi. Reports the
/// first GPU's core temperature and utilization under the label "GPU".
///
/// The NVML handle is initialised once at detection time and shut down when the
/// source is dropped.
use super::{SensorBackend, SensorCategory, SensorError, SensorSource};

#[cfg(feature = "nvml")]
use nvml_wrapper::{enum_wrappers::device::TemperatureSensor, Nvml};

const GPU_LABEL: &str = "GPU";
const GPU_INDEX: u32 = 0;

pub struct NvmlSource {
    #[cfg(feature = "nvml")]
    nvml: Option<Nvml>,
}

impl NvmlSource {
    #[cfg(feature = "nvml")]
    pub fn detect() -> Self {
        match Nvml::init() {
            Ok(nvml) => {
                log::info!("NVML initialized (fallback for GPU)");
                Self { nvml: Some(nvml) }
            }
            Err(e) => {
                log::debug!("NVML init failed: {e}");
                Self { nvml: None }
            }
        }
    }

    #[cfg(not(feature = "nvml"))]
    pub fn detect() -> Self {
        Self {}
    }

    #[cfg(feature = "nvml")]
    fn read(&self, category: SensorCategory) -> Result<Option<f64>, SensorError> {
        let nvml = self
            .nvml
            .as_ref()
            .ok_or(SensorError::Unavailable(SensorBackend::Nvml))?;
        let query_err = |e: nvml_wrapper::error::NvmlError| SensorError::Query {
            backend: SensorBackend::Nvml,
            detail: e.to_string(),
        };
        let device = nvml.device_by_index(GPU_INDEX).map_err(query_err)?;
        match category {
            SensorCategory::Temperature => Ok(Some(
                device.temperature(TemperatureSensor::Gpu).map_err(query_err)? as f64,
            )),
            SensorCategory::Load => Ok(Some(device.utilization_rates().map_err(query_err)?.gpu as f64)),
            _ => Ok(None),
        }
    }
}

impl SensorSource for NvmlSource {
    fn backend(&self) -> SensorBackend {
        SensorBackend::Nvml
    }

    fn is_available(&self) -> bool {
        #[cfg(feature = "nvml")]
        {
            self.nvml.is_some()
        }
        #[cfg(not(feature = "nvml"))]
        {
            false
        }
    }

    #[cfg(feature = "nvml")]
    fn query(
        &mut self,
        category: SensorCategory,
        fragments: &[&str],
    ) -> Result<Vec<f64>, SensorError> {
        if !super::label_matches(GPU_LABEL, fragments) {
            return Ok(Vec::new());
        }
        Ok(self.read(category)?.into_iter().collect())
    }

    #[cfg(not(feature = "nvml"))]
    fn query(&mut self, _: SensorCategory, _: &[&str]) -> Result<Vec<f64>, SensorError> {
        Err(SensorError::Unavailable(SensorBackend::Nvml))
    }
}
