use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named static dataset served when live sources are unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackProfile {
    Normal,
    Attack,
}

impl FallbackProfile {
    pub const ALL: [FallbackProfile; 2] = [FallbackProfile::Normal, FallbackProfile::Attack];

    pub fn name(self) -> &'static str {
        match self {
            FallbackProfile::Normal => "normal",
            FallbackProfile::Attack => "attack",
        }
    }
}

impl fmt::Display for FallbackProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fallback profile {0:?} (expected \"normal\" or \"attack\")")]
pub struct UnknownProfile(pub String);

impl FromStr for FallbackProfile {
    type Err = UnknownProfile;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(FallbackProfile::Normal),
            "attack" => Ok(FallbackProfile::Attack),
            _ => Err(UnknownProfile(raw.to_string())),
        }
    }
}
