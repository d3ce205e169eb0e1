//! Launch settings
//!
//! The invocation handed to the runtime is fixed at build time; these values
//! are grouped here so the bootstrap and the runtime read them from one place.

use serde::{Deserialize, Serialize};

/// Directory added to the runtime's module search path.
pub const MODULE_DIR: &str = "lib";
/// Entry script the runtime loads, relative to the working directory.
pub const ENTRY_SCRIPT: &str = "lib/iston.js";
/// Marker telling the entry script to resolve paths relative to the install.
pub const PORTABLE_MARKER: &str = "ISTON_PORTABLE=1";

/// Everything the bootstrap needs to drive one launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSettings {
    pub module_dir: String,
    pub entry_script: String,
    pub portable_marker: String,
    pub limits: EngineLimits,
}

/// Resource caps applied when the runtime is constructed.
///
/// `None` leaves the runtime's own default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    pub memory_limit: Option<usize>,
    pub max_stack_size: Option<usize>,
}

impl LaunchSettings {
    /// The module-search-path switch, e.g. `-Ilib`.
    pub fn module_path_flag(&self) -> String {
        format!("-I{}", self.module_dir)
    }

    /// Compact JSON form, used when logging the effective launch.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| format!("<unserializable: {err}>"))
    }
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            module_dir: MODULE_DIR.to_string(),
            entry_script: ENTRY_SCRIPT.to_string(),
            portable_marker: PORTABLE_MARKER.to_string(),
            limits: EngineLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_invocation() {
        let settings = LaunchSettings::default();
        assert_eq!(settings.module_path_flag(), "-Ilib");
        assert_eq!(settings.entry_script, "lib/iston.js");
        assert_eq!(settings.portable_marker, "ISTON_PORTABLE=1");
        assert_eq!(settings.limits, EngineLimits::default());
    }

    #[test]
    fn json_form_names_every_field() {
        let json = LaunchSettings::default().to_json();
        let parsed: LaunchSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, LaunchSettings::default());
        assert!(json.contains("\"entry_script\":\"lib/iston.js\""));
    }
}
