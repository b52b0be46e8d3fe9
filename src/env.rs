use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: variables consulted by built-ins (for example `HOME` for a bare `cd`).
/// - `current_dir`: the interpreter's working directory, kept in sync by `cd`.
///
/// External programs inherit the real process environment; `vars` only affects
/// lookups made inside the interpreter.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The working directory of the interpreter process.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// An environment with no captured variables.
    ///
    /// Lookups still fall back to the process environment.
    pub fn empty() -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Mask a variable with an empty value so the process-environment fallback
    /// is not consulted either.
    pub fn unset_var(&mut self, key: &str) {
        self.vars.insert(key.to_string(), String::new());
    }

    /// The home directory used by a bare `cd`; an empty value counts as unset.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
