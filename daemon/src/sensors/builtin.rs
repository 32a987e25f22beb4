/// OS built-in counters via `sysinfo`. The last link of most chains and the
/// only source that works on every platform.
///
/// `sysinfo` has no notion of named sensors for CPU load, clock or memory, so
/// this source publishes them under fixed labels ("CPU Total", "CPU Core #n",
/// "Memory Used", "Memory Total") next to the component temperature labels,
/// and the shared fragment matching does the rest.
use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::{label_matches, SensorBackend, SensorCategory, SensorError, SensorSource};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub struct BuiltinSource {
    system: System,
    components: Components,
}

impl BuiltinSource {
    pub fn detect() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // The first usage figure is only meaningful relative to a previous refresh.
        system.refresh_cpu_usage();
        Self {
            system,
            components: Components::new_with_refreshed_list(),
        }
    }

    fn labelled(&mut self, category: SensorCategory) -> Vec<(String, f64)> {
        match category {
            SensorCategory::Temperature => {
                self.components.refresh();
                self.components
                    .iter()
                    .map(|c| (c.label().to_string(), c.temperature() as f64))
                    .collect()
            }
            SensorCategory::Load => {
                self.system.refresh_cpu_usage();
                vec![("CPU Total".to_string(), self.system.global_cpu_usage() as f64)]
            }
            SensorCategory::Clock => {
                self.system.refresh_cpu_frequency();
                self.system
                    .cpus()
                    .iter()
                    .enumerate()
                    .map(|(i, cpu)| (format!("CPU Core #{}", i + 1), cpu.frequency() as f64))
                    .collect()
            }
            SensorCategory::Data => {
                self.system.refresh_memory();
                vec![
                    (
                        "Memory Used".to_string(),
                        self.system.used_memory() as f64 / BYTES_PER_GB,
                    ),
                    (
                        "Memory Total".to_string(),
                        self.system.total_memory() as f64 / BYTES_PER_GB,
                    ),
                ]
            }
        }
    }
}

impl SensorSource for BuiltinSource {
    fn backend(&self) -> SensorBackend {
        SensorBackend::Builtin
    }

    fn is_available(&self) -> bool {
        true
    }

    fn query(
        &mut self,
        category: SensorCategory,
        fragments: &[&str],
    ) -> Result<Vec<f64>, SensorError> {
        Ok(self
            .labelled(category)
            .into_iter()
            .filter(|(label, _)| label_matches(label, fragments))
            .map(|(_, value)| value)
            .collect())
    }
}
