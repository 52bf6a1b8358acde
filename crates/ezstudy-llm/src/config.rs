// Configuration sent along with every request, plus where the service lives

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ServiceError};

/// Answer length and depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Balanced,
    Concise,
    Detailed,
}

/// What the assistant is doing with the student
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Tutor,
    Quiz,
    Summarize,
    Explain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    Friendly,
    Formal,
    Encouraging,
}

macro_rules! impl_choice {
    ($ty:ident, $label:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ServiceError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ServiceError::InvalidConfig(format!(
                        "unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }
    };
}

impl_choice!(Tone, "tone", { Balanced => "balanced", Concise => "concise", Detailed => "detailed" });
impl_choice!(Mode, "mode", {
    Tutor => "tutor",
    Quiz => "quiz",
    Summarize => "summarize",
    Explain => "explain",
});
impl_choice!(Personality, "personality", {
    Friendly => "friendly",
    Formal => "formal",
    Encouraging => "encouraging",
});

/// Tone/mode/personality selection of the console
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub personality: Personality,
}

impl AiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }
}

/// Geolocation is never collected; the fields are kept so the service sees
/// the shape it expects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub label: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Local date and time of the machine sending the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    pub device_date: String,
    pub device_time: String,
    pub device_year: i32,
    pub device_month: String,
    pub device_timezone: String,
    pub location: Location,
}

impl DeviceContext {
    pub fn capture() -> Self {
        let now = Local::now();
        let device_timezone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| now.format("UTC%:z").to_string());

        Self {
            device_date: now.format("%Y-%m-%d").to_string(),
            device_time: now.format("%H:%M:%S").to_string(),
            device_year: now.year(),
            device_month: now.format("%B").to_string(),
            device_timezone,
            location: Location::default(),
        }
    }
}

/// Where the completion/analysis service lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL, e.g. "http://localhost:5000"; requests go to `{base}/api/chat`
    pub backend_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    120
}
