/// HWiNFO's shared sensor table. With "Gadget" reporting enabled HWiNFO mirrors
/// the selected sensors into `HKCU\Software\HWiNFO64\VSB` as numbered value
/// groups: `LabelN`, `ValueN` (formatted, with unit) and `ValueRawN`.
///
/// The table carries no sensor type, so the category is inferred from the unit
/// suffix of the formatted value.
use super::{label_matches, SensorBackend, SensorCategory, SensorError, SensorSource};

pub const VSB_KEY: &str = r"Software\HWiNFO64\VSB";

/// One parsed `LabelN`/`ValueN`/`ValueRawN` group.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub label: String,
    pub category: SensorCategory,
    pub value: f64,
}

/// Builds an entry from the raw registry strings. Returns `None` when the unit
/// is not one of ours or the raw value does not parse.
pub fn parse_entry(label: &str, formatted: &str, raw: &str) -> Option<RegistryEntry> {
    let (category, scale) = unit_category(formatted)?;
    // HWiNFO follows the user's locale for the decimal separator.
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    Some(RegistryEntry {
        label: label.to_string(),
        category,
        value: value * scale,
    })
}

/// Category and multiplier to the category's canonical unit.
fn unit_category(formatted: &str) -> Option<(SensorCategory, f64)> {
    let unit = formatted
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ',' || c == '-')
        .trim();
    match unit {
        "°C" | "C" => Some((SensorCategory::Temperature, 1.0)),
        "%" => Some((SensorCategory::Load, 1.0)),
        "MHz" => Some((SensorCategory::Clock, 1.0)),
        "GHz" => Some((SensorCategory::Clock, 1000.0)),
        "GB" => Some((SensorCategory::Data, 1.0)),
        "MB" => Some((SensorCategory::Data, 1.0 / 1024.0)),
        _ => None,
    }
}

pub struct RegistrySource {
    available: bool,
}

impl RegistrySource {
    pub fn detect() -> Self {
        let available = match imp::read_entries() {
            Ok(entries) if !entries.is_empty() => {
                log::info!("HWiNFO sensor table found ({} entries)", entries.len());
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::debug!("HWiNFO sensor table not readable: {e}");
                false
            }
        };
        Self { available }
    }
}

impl SensorSource for RegistrySource {
    fn backend(&self) -> SensorBackend {
        SensorBackend::Registry
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn query(
        &mut self,
        category: SensorCategory,
        fragments: &[&str],
    ) -> Result<Vec<f64>, SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable(SensorBackend::Registry));
        }
        // The table is rewritten in place on every HWiNFO poll; re-read it each time.
        let entries = imp::read_entries().map_err(|e| SensorError::Query {
            backend: SensorBackend::Registry,
            detail: e.to_string(),
        })?;
        Ok(entries
            .into_iter()
            .filter(|e| e.category == category && label_matches(&e.label, fragments))
            .map(|e| e.value)
            .collect())
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    use super::{parse_entry, RegistryEntry, VSB_KEY};

    pub fn read_entries() -> io::Result<Vec<RegistryEntry>> {
        let key = RegKey::predef(HKEY_CURRENT_USER).open_subkey(VSB_KEY)?;
        let mut entries = Vec::new();
        for index in 0.. {
            let Ok(label) = key.get_value::<String, _>(format!("Label{index}")) else {
                break;
            };
            let formatted: String = key.get_value(format!("Value{index}")).unwrap_or_default();
            let raw: String = key.get_value(format!("ValueRaw{index}")).unwrap_or_default();
            if let Some(entry) = parse_entry(&label, &formatted, &raw) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(not(windows))]
mod imp {
    use std::io;

    use super::RegistryEntry;

    pub fn read_entries() -> io::Result<Vec<RegistryEntry>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "the HWiNFO registry table only exists on Windows",
        ))
    }
}
