//! Argument vector handed to the runtime
//!
//! A fixed three-token prefix (program name placeholder, module search path
//! switch, entry script) followed by every host argument after the host's
//! own program name. Built once into an exact-capacity buffer and never
//! modified afterwards.

use std::ffi::{OsStr, OsString};

use crate::error::{AllocationFailure, BootstrapError};
use crate::settings::LaunchSettings;

/// Composed runtime argv. Owned by the launch session until teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector {
    tokens: Vec<OsString>,
}

impl ArgumentVector {
    /// Number of tokens the bootstrap places before the forwarded host args.
    pub const PREFIX_LEN: usize = 3;

    /// `host_args[0]` is the host program name and is not forwarded.
    pub fn compose<S: AsRef<OsStr>>(
        settings: &LaunchSettings,
        host_args: &[S],
    ) -> Result<Self, BootstrapError> {
        let (_, forwarded) = host_args
            .split_first()
            .ok_or(BootstrapError::MissingProgramName)?;

        let prefix: [OsString; Self::PREFIX_LEN] = [
            OsString::new(),
            OsString::from(settings.module_path_flag()),
            OsString::from(&settings.entry_script),
        ];

        let requested = Self::PREFIX_LEN + forwarded.len();
        let mut tokens = Vec::new();
        tokens
            .try_reserve_exact(requested)
            .map_err(|source| AllocationFailure::ArgumentVector { requested, source })?;

        tokens.extend(prefix);
        tokens.extend(forwarded.iter().map(|arg| arg.as_ref().to_os_string()));
        debug_assert_eq!(tokens.len(), requested);

        Ok(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_slice(&self) -> &[OsString] {
        &self.tokens
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.tokens.iter().map(OsString::as_os_str)
    }

    /// Placeholder program name seen by the runtime (always empty).
    pub fn program_name(&self) -> &OsStr {
        &self.tokens[0]
    }

    /// Host arguments forwarded after the fixed prefix.
    pub fn forwarded(&self) -> &[OsString] {
        &self.tokens[Self::PREFIX_LEN..]
    }

    /// Tokens as UTF-8, replacing invalid sequences. Used only at the script
    /// boundary where the runtime needs text.
    pub fn to_strings_lossy(&self) -> Vec<String> {
        self.iter()
            .map(|token| token.to_string_lossy().into_owned())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.tokens.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(host: &[&str]) -> ArgumentVector {
        ArgumentVector::compose(&LaunchSettings::default(), host).unwrap()
    }

    #[test]
    fn program_name_only_yields_prefix() {
        let args = compose(&["iston"]);
        assert_eq!(args.to_strings_lossy(), vec!["", "-Ilib", "lib/iston.js"]);
        assert!(args.forwarded().is_empty());
        assert_eq!(args.program_name(), OsStr::new(""));
    }

    #[test]
    fn forwards_flag_and_value_in_order() {
        let args = compose(&["iston", "--flag", "value"]);
        assert_eq!(
            args.to_strings_lossy(),
            vec!["", "-Ilib", "lib/iston.js", "--flag", "value"]
        );
    }

    #[test]
    fn length_and_tail_follow_host_args() {
        let host: Vec<String> = std::iter::once("iston".to_string())
            .chain((0..17).map(|i| format!("arg-{i}")))
            .collect();

        for n in 1..=host.len() {
            let args = ArgumentVector::compose(&LaunchSettings::default(), &host[..n]).unwrap();
            assert_eq!(args.len(), 3 + (n - 1));
            assert_eq!(args.capacity(), args.len());

            let tail: Vec<&str> = args.forwarded().iter().map(|t| t.to_str().unwrap()).collect();
            let expected: Vec<&str> = host[1..n].iter().map(String::as_str).collect();
            assert_eq!(tail, expected);
        }
    }

    #[test]
    fn forwarded_tokens_are_not_normalized() {
        let args = compose(&["iston", "", "  spaced  ", "-Iother", "--", "lib/iston.js"]);
        assert_eq!(
            args.to_strings_lossy()[3..],
            ["", "  spaced  ", "-Iother", "--", "lib/iston.js"]
        );
    }

    #[test]
    fn empty_host_args_are_rejected() {
        let host: [&str; 0] = [];
        let err = ArgumentVector::compose(&LaunchSettings::default(), &host).unwrap_err();
        assert!(matches!(err, BootstrapError::MissingProgramName));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_host_args_survive_composition() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"caf\xe9");
        let host = [OsStr::new("iston"), raw];
        let args = ArgumentVector::compose(&LaunchSettings::default(), &host).unwrap();
        assert_eq!(args.forwarded()[0], raw);
    }
}
