use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::colors::{lighten, parse_hex_rgb};

/// Statistic category that drives colour coding and summary/chart focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cases,
    Recovered,
    Deaths,
}

impl Metric {
    /// Display order of the summary cards.
    pub const ALL: [Metric; 3] = [Metric::Cases, Metric::Recovered, Metric::Deaths];

    /// Wire/key form, matching the upstream field names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::Recovered => "recovered",
            Self::Deaths => "deaths",
        }
    }

    /// Summary card title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Cases => "Coronavirus Cases",
            Self::Recovered => "Recovered",
            Self::Deaths => "Deaths",
        }
    }

    /// Whether the card uses the red accent. Recovered is the only green one.
    pub fn is_red(self) -> bool {
        !matches!(self, Self::Recovered)
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::Cases => "#CC1034",
            Self::Recovered => "#7dd71d",
            Self::Deaths => "#fb4443",
        }
    }

    pub fn color_rgb(self) -> (u8, u8, u8) {
        parse_hex_rgb(self.hex()).unwrap_or((204, 16, 52))
    }

    /// Lighter shade used for the bubble fill and the chart area.
    pub fn fill_rgb(self) -> (u8, u8, u8) {
        let (r, g, b) = self.color_rgb();
        lighten(r, g, b, 0.12)
    }

    /// Metres of bubble radius per square root of the counter.
    pub fn radius_multiplier(self) -> f64 {
        match self {
            Self::Cases => 800.0,
            Self::Recovered => 1200.0,
            Self::Deaths => 2000.0,
        }
    }

    /// Bubble radius in metres for a counter value. Negative values draw nothing.
    pub fn bubble_radius_m(self, value: i64) -> f64 {
        (value.max(0) as f64).sqrt() * self.radius_multiplier()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cases" => Ok(Self::Cases),
            "recovered" => Ok(Self::Recovered),
            "deaths" => Ok(Self::Deaths),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}
