//! Device classification from the `User-Agent` header

use serde::{Deserialize, Serialize};
use std::fmt;
use woothee::parser::Parser;

/// Coarse device class recorded with every visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Mobile,
    Desktop,
}

impl Device {
    /// Classify a user agent. Anything that is not recognized as a phone,
    /// including tablets and a missing or empty header, counts as `Desktop`.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return Device::Desktop;
        };

        match Parser::new().parse(ua) {
            Some(result)
                if matches!(result.category, "smartphone" | "mobilephone")
                    && !is_tablet(&result.os, ua) =>
            {
                Device::Mobile
            }
            _ => Device::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mobile => "Mobile",
            Device::Desktop => "Desktop",
        }
    }
}

/// woothee files tablets under "smartphone". iPads report their own OS name;
/// Android tablets are the Android agents without the `Mobile` token.
fn is_tablet(os: &str, ua: &str) -> bool {
    os == "iPad" || (os == "Android" && !ua.contains("Mobile"))
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
