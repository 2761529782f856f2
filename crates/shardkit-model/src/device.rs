use crate::targeting::{Abi, Language};
use serde::{Deserialize, Serialize};

/// Description of one concrete device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    /// Supported ABIs in order of preference.
    #[serde(default)]
    pub supported_abis: Vec<Abi>,
    /// Screen density in dpi.
    pub screen_density: u32,
    #[serde(default)]
    pub supported_locales: Vec<String>,
}

impl DeviceSpec {
    /// Languages of the supported locales; unparsable locales are skipped.
    pub fn languages(&self) -> Vec<Language> {
        let mut out: Vec<Language> = self
            .supported_locales
            .iter()
            .filter_map(|l| Language::from_locale(l).ok())
            .collect();
        out.sort();
        out.dedup();
        out
    }
}
