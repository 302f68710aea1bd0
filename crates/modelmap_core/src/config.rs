//! Mapping configuration.

/// Environment variable that switches flush validation to strict mode.
///
/// Unlike a bare presence check, `0`, `false`, `no` and `off` (any case)
/// leave the mapping lenient, so the variable can be exported as off.
/// Every other non-empty value turns strict mode on. See [`parse_flag`].
pub const STRICT_VERSIONING_ENV: &str = "MODELMAP_STRICT_VERSIONING";

/// Configuration for a [`crate::ModelMapping`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the versioning hook validates audited entities and aborts
    /// the flush on a violation.
    pub strict_versioning: bool,

    /// Whether the commit log is flushed on every commit.
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_versioning: false,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from the process environment.
    ///
    /// Only [`STRICT_VERSIONING_ENV`] is consulted; when absent the
    /// configuration is lenient.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let strict = lookup(STRICT_VERSIONING_ENV)
            .as_deref()
            .is_some_and(parse_flag);
        Self::default().strict_versioning(strict)
    }

    /// Sets strict flush validation.
    #[must_use]
    pub const fn strict_versioning(mut self, value: bool) -> Self {
        self.strict_versioning = value;
        self
    }

    /// Sets whether to flush the commit log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// Interprets an environment flag.
///
/// Any non-empty value turns the flag on, except the usual spellings of "off".
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !["0", "false", "no", "off"]
            .iter()
            .any(|off| value.eq_ignore_ascii_case(off))
}
