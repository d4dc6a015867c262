use serde::{Deserialize, Serialize};

use crate::snapshot::RawSnapshot;

/// One entry of the scope selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOption {
    pub name: String,
    /// `None` when the upstream omitted the ISO2 code; such an option cannot be selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl RegionOption {
    pub fn is_selectable(&self) -> bool {
        self.code.as_deref().is_some_and(|code| !code.trim().is_empty())
    }
}

/// Build selector options from a country list, in fetch order.
///
/// Duplicates are kept and nothing is validated.
pub fn region_catalog(countries: &[RawSnapshot]) -> Vec<RegionOption> {
    countries
        .iter()
        .map(|raw| RegionOption {
            name: raw.country.clone().unwrap_or_default(),
            code: raw
                .country_info
                .as_ref()
                .and_then(|info| info.iso2.clone()),
        })
        .collect()
}
