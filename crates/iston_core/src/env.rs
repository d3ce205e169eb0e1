//! Environment vector handed to the runtime
//!
//! Only the portable-mode marker is passed. The host process environment is
//! not copied in; see DESIGN.md for why the runtime does not inherit it.

use crate::error::{AllocationFailure, BootstrapError};
use crate::settings::LaunchSettings;

/// Ordered `NAME=VALUE` entries. The native NULL terminator is the slice end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVector {
    entries: Vec<String>,
}

impl EnvironmentVector {
    /// The vector containing exactly the portable-mode marker.
    pub fn portable(settings: &LaunchSettings) -> Result<Self, BootstrapError> {
        let marker = &settings.portable_marker;
        if split_entry(marker).map_or(true, |(name, _)| name.is_empty()) {
            return Err(BootstrapError::MalformedMarker(marker.clone()));
        }

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(1)
            .map_err(AllocationFailure::EnvironmentVector)?;
        entries.push(marker.clone());

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entries split at the first `=`.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|entry| split_entry(entry))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

fn split_entry(entry: &str) -> Option<(&str, &str)> {
    entry.split_once('=')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portable_vector_holds_marker_once() {
        let env = EnvironmentVector::portable(&LaunchSettings::default()).unwrap();
        assert_eq!(env.entries(), ["ISTON_PORTABLE=1"]);
        assert_eq!(env.get("ISTON_PORTABLE"), Some("1"));
        assert_eq!(
            env.entries().iter().filter(|e| *e == "ISTON_PORTABLE=1").count(),
            1
        );
    }

    #[test]
    fn value_may_contain_equals() {
        let settings = LaunchSettings {
            portable_marker: "ISTON_PORTABLE=a=b".into(),
            ..LaunchSettings::default()
        };
        let env = EnvironmentVector::portable(&settings).unwrap();
        assert_eq!(env.pairs().collect::<Vec<_>>(), vec![("ISTON_PORTABLE", "a=b")]);
    }

    #[test]
    fn marker_without_name_is_rejected() {
        for marker in ["ISTON_PORTABLE", "=1", ""] {
            let settings = LaunchSettings {
                portable_marker: marker.into(),
                ..LaunchSettings::default()
            };
            let err = EnvironmentVector::portable(&settings).unwrap_err();
            assert!(matches!(err, BootstrapError::MalformedMarker(_)), "{marker}");
        }
    }
}
