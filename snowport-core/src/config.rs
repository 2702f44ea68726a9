//! Runtime configuration.
//!
//! Defaults suit a headless run; `from_env()` applies overrides from:
//! - `SNOWPORT_STAGING_DIR`: host directory for snapshot staging files
//! - `SNOWPORT_MAX_GUEST_STRING`: longest C string read out of guest memory

use std::path::PathBuf;

pub const ENV_STAGING_DIR: &str = "SNOWPORT_STAGING_DIR";
pub const ENV_MAX_GUEST_STRING: &str = "SNOWPORT_MAX_GUEST_STRING";

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Host directory holding snapshot staging files.
    pub staging_dir: PathBuf,

    /// Where the staging directory appears inside the guest (WASI preopen).
    pub guest_staging_dir: String,

    /// Guest argv, including argv[0].
    pub args: Vec<String>,

    /// Share the host's stdin/stdout/stderr with the guest.
    pub inherit_stdio: bool,

    /// Upper bound when scanning guest memory for a NUL terminator.
    pub max_guest_string_len: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("snowport-staging"),
            guest_staging_dir: "/tmp".to_owned(),
            args: vec!["snowport-core".to_owned()],
            inherit_stdio: true,
            max_guest_string_len: 4096,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_STAGING_DIR).filter(|v| !v.trim().is_empty()) {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAX_GUEST_STRING) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_guest_string_len = n,
                _ => log::warn!("ignoring {ENV_MAX_GUEST_STRING}={raw:?}"),
            }
        }
        self
    }

    /// Append guest arguments after argv[0].
    pub fn with_guest_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}
