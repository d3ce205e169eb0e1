//! Command line as the script runtime reads it
//!
//! `argv[0]` is the program name. Switches come next: `-I<dir>` or
//! `-I <dir>` extend the module search path and `--` ends the switches. The
//! first remaining token names the script; everything after it belongs to
//! the script.

use std::path::PathBuf;

use iston_core::{ArgumentVector, ParseFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program_name: String,
    pub include_dirs: Vec<PathBuf>,
    pub script: PathBuf,
    pub script_args: Vec<String>,
}

impl Invocation {
    pub fn parse(args: &ArgumentVector) -> Result<Self, ParseFailure> {
        Self::from_tokens(args.to_strings_lossy())
    }

    fn from_tokens(tokens: Vec<String>) -> Result<Self, ParseFailure> {
        let mut tokens = tokens.into_iter();
        let program_name = tokens.next().unwrap_or_default();
        let mut include_dirs = Vec::new();

        let script = loop {
            let token = tokens.next().ok_or(ParseFailure::MissingScript)?;

            if token == "--" {
                break tokens.next().ok_or(ParseFailure::MissingScript)?;
            }

            if let Some(dir) = token.strip_prefix("-I") {
                let dir = if dir.is_empty() {
                    tokens
                        .next()
                        .ok_or_else(|| ParseFailure::MissingSwitchArgument(token.clone()))?
                } else {
                    dir.to_string()
                };
                include_dirs.push(PathBuf::from(dir));
                continue;
            }

            if token.starts_with('-') {
                return Err(ParseFailure::UnrecognizedSwitch(token));
            }

            break token;
        };

        Ok(Self {
            program_name,
            include_dirs,
            script: PathBuf::from(script),
            script_args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iston_core::LaunchSettings;

    fn parse(tokens: &[&str]) -> Result<Invocation, ParseFailure> {
        Invocation::from_tokens(tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn composed_vector_splits_into_switches_script_and_args() {
        let args =
            ArgumentVector::compose(&LaunchSettings::default(), &["iston", "--flag", "value"])
                .unwrap();
        let invocation = Invocation::parse(&args).unwrap();

        assert_eq!(invocation.program_name, "");
        assert_eq!(invocation.include_dirs, vec![PathBuf::from("lib")]);
        assert_eq!(invocation.script, PathBuf::from("lib/iston.js"));
        assert_eq!(invocation.script_args, ["--flag", "value"]);
    }

    #[test]
    fn separate_include_argument_and_double_dash() {
        let invocation = parse(&["", "-I", "a", "-Ib", "--", "-odd-name.js", "x"]).unwrap();
        assert_eq!(
            invocation.include_dirs,
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
        assert_eq!(invocation.script, PathBuf::from("-odd-name.js"));
        assert_eq!(invocation.script_args, ["x"]);
    }

    #[test]
    fn switch_like_tokens_after_script_are_script_args() {
        let invocation = parse(&["", "main.js", "-Inope", "--"]).unwrap();
        assert!(invocation.include_dirs.is_empty());
        assert_eq!(invocation.script_args, ["-Inope", "--"]);
    }

    #[test]
    fn rejects_bad_command_lines() {
        assert!(matches!(parse(&[""]), Err(ParseFailure::MissingScript)));
        assert!(matches!(parse(&["", "-Ilib"]), Err(ParseFailure::MissingScript)));
        assert!(matches!(parse(&["", "--"]), Err(ParseFailure::MissingScript)));
        assert!(matches!(
            parse(&["", "-I"]),
            Err(ParseFailure::MissingSwitchArgument(s)) if s == "-I"
        ));
        assert!(matches!(
            parse(&["", "-w", "main.js"]),
            Err(ParseFailure::UnrecognizedSwitch(s)) if s == "-w"
        ));
    }
}
