//! `xmdrc` configuration file parser.
//!
//! One setting per line:
//!
//! | Key                   | Type    | Default      |
//! |-----------------------|---------|--------------|
//! | `max_loop_iterations` | integer | `10000`      |
//! | `max_recursion_depth` | integer | `100`        |
//! | `max_output_size`     | bytes   | `1048576`    |
//! | `allow_file_access`   | boolean | `true`       |
//! | `import_paths`        | list    | `., ..`      |
//!
//! Lines starting with `#` or `;` are comments.  Values may be quoted.
//! `import_paths` takes a comma-separated list.  Unknown keys and bad values
//! are reported but do not stop the rest of the file from loading.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Evaluator limits and permissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Iterations allowed per loop statement.
    pub max_loop_iterations: usize,
    /// Nested user function calls allowed.
    pub max_recursion_depth: usize,
    /// Bytes of output one evaluation may produce.
    pub max_output_size: usize,
    /// Gates `File.*` and `import`.
    pub allow_file_access: bool,
    /// Directories searched by `import`, in order.
    pub import_paths: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_loop_iterations: 10_000,
            max_recursion_depth: 100,
            max_output_size: 1024 * 1024,
            allow_file_access: true,
            import_paths: vec![PathBuf::from("."), PathBuf::from("..")],
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string on top of the defaults.
    ///
    /// Returns the config and a list of any problems found.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected 'key = value', got '{line}'"),
                });
                continue;
            };
            if let Err(message) = config.set(key.trim(), unquote(value.trim())) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Set one key.  `Err` carries a human-readable reason.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "max_loop_iterations" => self.max_loop_iterations = parse_count(key, value)?,
            "max_recursion_depth" => self.max_recursion_depth = parse_count(key, value)?,
            "max_output_size" => self.max_output_size = parse_count(key, value)?,
            "allow_file_access" => self.allow_file_access = parse_bool(key, value)?,
            "import_paths" => {
                self.import_paths = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }

    /// Override settings from `XMD_*` environment variables.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_vars(std::env::vars())
    }

    fn apply_vars(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, value) in vars {
            let Some(key) = name.strip_prefix("XMD_") else { continue };
            let key = key.to_ascii_lowercase();
            if !ENV_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Err(e) = self.set(&key, value.trim()) {
                problems.push(format!("{name}: {e}"));
            }
        }
        problems
    }

    /// Per-user config file, e.g. `~/.config/xmd/xmdrc`, then `./.xmdrc`.
    /// Returns the first that exists.
    pub fn default_path() -> Option<PathBuf> {
        let user = ProjectDirs::from("", "", "xmd").map(|dirs| dirs.config_dir().join("xmdrc"));
        user.into_iter()
            .chain(std::iter::once(PathBuf::from(".xmdrc")))
            .find(|p| p.is_file())
    }

    /// Render as a config file that [`Config::load_str`] reads back.
    pub fn to_rc_string(&self) -> String {
        let paths: Vec<String> = self
            .import_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        format!(
            "max_loop_iterations = {}\nmax_recursion_depth = {}\nmax_output_size = {}\nallow_file_access = {}\nimport_paths = {}\n",
            self.max_loop_iterations,
            self.max_recursion_depth,
            self.max_output_size,
            self.allow_file_access,
            paths.join(", "),
        )
    }
}

/// Keys that may come from `XMD_<KEY>` variables.
const ENV_KEYS: &[&str] = &[
    "max_loop_iterations",
    "max_recursion_depth",
    "max_output_size",
    "allow_file_access",
];

// ── Value parsing ─────────────────────────────────────────────────────────────

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn parse_count(key: &str, value: &str) -> Result<usize, String> {
    value
        .replace('_', "")
        .parse()
        .map_err(|_| format!("{key}: expected a non-negative integer, got '{value}'"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{key}: expected a boolean, got '{value}'")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_loop_iterations, 10_000);
        assert_eq!(cfg.max_recursion_depth, 100);
        assert_eq!(cfg.max_output_size, 1024 * 1024);
        assert!(cfg.allow_file_access);
        assert_eq!(cfg.import_paths.len(), 2);
    }

    #[test]
    fn key_value_lines() {
        let (cfg, errs) = Config::load_str(
            "max_loop_iterations = 50\n\
             allow_file_access = no\n\
             import_paths = \"lib, vendor/xmd\"",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.max_loop_iterations, 50);
        assert!(!cfg.allow_file_access);
        assert_eq!(cfg.import_paths, vec![PathBuf::from("lib"), PathBuf::from("vendor/xmd")]);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let (cfg, errs) = Config::load_str("# comment\n; another\n\nmax_output_size = 1_000\n");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.max_output_size, 1000);
    }

    #[test]
    fn errors_carry_line_numbers_and_loading_continues() {
        let (cfg, errs) = Config::load_str("colour = blue\nmax_recursion_depth = lots\nnot a setting\nmax_recursion_depth = 7");
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0].line, 1);
        assert!(errs[0].message.contains("unknown setting"));
        assert_eq!(errs[1].line, 2);
        assert_eq!(errs[2].line, 3);
        assert_eq!(cfg.max_recursion_depth, 7);
    }

    #[test]
    fn env_overrides() {
        let mut cfg = Config::default();
        let problems = cfg.apply_vars([
            ("XMD_MAX_LOOP_ITERATIONS".to_owned(), "12".to_owned()),
            ("XMD_ALLOW_FILE_ACCESS".to_owned(), "false".to_owned()),
            ("XMD_IMPORT_PATHS".to_owned(), "/etc".to_owned()),
            ("HOME".to_owned(), "/root".to_owned()),
        ]);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(cfg.max_loop_iterations, 12);
        assert!(!cfg.allow_file_access);
        assert_eq!(cfg.import_paths, Config::default().import_paths);
    }

    #[test]
    fn env_bad_value_reported() {
        let mut cfg = Config::default();
        let problems = cfg.apply_vars([("XMD_MAX_OUTPUT_SIZE".to_owned(), "huge".to_owned())]);
        assert_eq!(problems.len(), 1);
        assert_eq!(cfg.max_output_size, 1024 * 1024);
    }

    #[test]
    fn rc_string_reads_back() {
        let mut cfg = Config::default();
        cfg.max_loop_iterations = 3;
        cfg.allow_file_access = false;
        let (back, errs) = Config::load_str(&cfg.to_rc_string());
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(back, cfg);
    }

    #[test]
    fn load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xmdrc");
        std::fs::write(&path, "max_recursion_depth = 9\n").unwrap();
        let (cfg, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(cfg.max_recursion_depth, 9);
    }
}
