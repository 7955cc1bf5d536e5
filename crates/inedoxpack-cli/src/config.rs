//! Environment configuration.

use std::io;
use std::path::PathBuf;

/// Directory packages are written to when no absolute output path is given.
pub const OUTPUT_DIR_VAR: &str = "INEDOXPACK_OUTDIR";

/// `tracing` filter directives for diagnostic logging.
pub const LOG_FILTER_VAR: &str = "INEDOXPACK_LOG";

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings that come from the process environment rather than arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base for relative source paths.
    pub current_dir: PathBuf,

    /// Base for the output package path.
    pub output_dir: PathBuf,

    pub log_filter: String,
}

impl Settings {
    /// Read settings from the environment.
    pub fn from_env() -> io::Result<Self> {
        Ok(Self::from_lookup(
            |key| std::env::var(key).ok(),
            std::env::current_dir()?,
        ))
    }

    /// Build settings from a variable lookup; empty values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, current_dir: PathBuf) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let output_dir = var(OUTPUT_DIR_VAR)
            .map(|dir| current_dir.join(dir))
            .unwrap_or_else(|| current_dir.clone());

        Self {
            output_dir,
            log_filter: var(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            current_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned(), PathBuf::from("/work"))
    }

    #[test]
    fn Settings___no_variables___uses_current_directory_and_default_filter() {
        let settings = settings(&[]);

        assert_eq!(settings.output_dir, PathBuf::from("/work"));
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn Settings___output_dir_set___overrides_default() {
        let settings = settings(&[(OUTPUT_DIR_VAR, "/packages")]);

        assert_eq!(settings.output_dir, PathBuf::from("/packages"));
        assert_eq!(settings.current_dir, PathBuf::from("/work"));
    }

    #[test]
    fn Settings___relative_output_dir___resolves_against_current_directory() {
        let settings = settings(&[(OUTPUT_DIR_VAR, "out")]);

        assert_eq!(settings.output_dir, PathBuf::from("/work/out"));
    }

    #[test]
    fn Settings___empty_values___are_ignored() {
        let settings = settings(&[(OUTPUT_DIR_VAR, ""), (LOG_FILTER_VAR, "  ")]);

        assert_eq!(settings.output_dir, PathBuf::from("/work"));
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn Settings___log_filter___is_read() {
        let settings = settings(&[(LOG_FILTER_VAR, "inedoxpack_assembly=debug")]);

        assert_eq!(settings.log_filter, "inedoxpack_assembly=debug");
    }
}
