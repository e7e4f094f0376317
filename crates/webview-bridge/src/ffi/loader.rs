//! Locating the `webview` shared library
//!
//! Resolution order:
//! 1. an explicit override (`WEBVIEW_PATH` when built with [`LibraryResolver::from_env`])
//! 2. the platform file name in each search path, in order
//!
//! Search paths are the user-added ones, then the current directory, then the
//! system library directories.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the library file directly
pub const WEBVIEW_PATH_ENV: &str = "WEBVIEW_PATH";

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// Library file not found in search paths
    #[error("Library not found: {name} (searched {searched} directories)")]
    LibraryNotFound { name: String, searched: usize },

    /// Symbol not found in library
    #[error("Symbol '{symbol}' not found in library '{library}'")]
    SymbolNotFound { library: String, symbol: String },

    /// The dynamic loader rejected the file
    #[error("Failed to load library '{library}': {message}")]
    LoadFailed { library: String, message: String },
}

/// Platform file name of the library, e.g. `webview-x64.so`
pub fn platform_library_name() -> String {
    if cfg!(target_os = "windows") {
        "webview.dll".to_string()
    } else if cfg!(target_os = "macos") {
        "webview.dylib".to_string()
    } else {
        format!("webview-{}.so", arch_suffix(std::env::consts::ARCH))
    }
}

/// Architecture suffix used in library file names
fn arch_suffix(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

/// Resolves the path of the `webview` library
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    override_path: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    file_names: Vec<String>,
}

impl LibraryResolver {
    /// Resolver over the default search paths, without override
    pub fn new() -> Self {
        let name = platform_library_name();
        let prefixed = if cfg!(target_os = "windows") {
            None
        } else {
            Some(format!("lib{}", name))
        };

        Self {
            override_path: None,
            search_paths: Self::default_search_paths(),
            file_names: std::iter::once(name).chain(prefixed).collect(),
        }
    }

    /// Resolver honoring `WEBVIEW_PATH`
    pub fn from_env() -> Self {
        let resolver = Self::new();
        match std::env::var_os(WEBVIEW_PATH_ENV) {
            Some(path) if !path.is_empty() => resolver.with_override(PathBuf::from(path)),
            _ => resolver,
        }
    }

    /// Use `path` as the library, skipping the search
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    /// Add a search path ahead of the existing ones
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.insert(0, path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// File names tried in every search path, in priority order
    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    /// Platform default search paths
    ///
    /// - Linux: /usr/lib, /usr/local/lib, /lib (and the lib64 variants)
    /// - macOS: /usr/lib, /usr/local/lib, /opt/homebrew/lib
    /// - Windows: System32
    ///
    /// The current working directory always comes first.
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/lib"));
            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            match std::env::var("SystemRoot") {
                Ok(root) => paths.push(Path::new(&root).join("System32")),
                Err(_) => paths.push(PathBuf::from("C:\\Windows\\System32")),
            }
        }

        paths
    }

    /// Resolve the library path
    ///
    /// An override is returned as-is; the loader reports it if it does not
    /// exist.
    pub fn resolve(&self) -> Result<PathBuf, LoadError> {
        if let Some(path) = &self.override_path {
            return Ok(path.clone());
        }

        for dir in &self.search_paths {
            for name in &self.file_names {
                let candidate = dir.join(name);
                if is_file(&candidate) {
                    tracing::debug!(path = %candidate.display(), "resolved webview library");
                    return Ok(candidate);
                }
            }
        }

        Err(LoadError::LibraryNotFound {
            name: self.file_names.join(" or "),
            searched: self.search_paths.len(),
        })
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_directory_is_searched_first() {
        let resolver = LibraryResolver::new();
        if let Ok(cwd) = std::env::current_dir() {
            assert_eq!(resolver.search_paths()[0], cwd);
        }
    }

    #[test]
    fn test_added_search_path_takes_priority() {
        let mut resolver = LibraryResolver::new();
        resolver.add_search_path("/custom/path");
        assert_eq!(resolver.search_paths()[0], PathBuf::from("/custom/path"));
    }

    #[test]
    fn test_override_skips_search() {
        let resolver = LibraryResolver::new().with_override("/nowhere/webview.so");
        assert_eq!(resolver.resolve().unwrap(), PathBuf::from("/nowhere/webview.so"));
    }

    #[test]
    fn test_platform_name() {
        let name = platform_library_name();
        #[cfg(target_os = "linux")]
        assert!(name.starts_with("webview-") && name.ends_with(".so"));
        #[cfg(target_os = "macos")]
        assert_eq!(name, "webview.dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(name, "webview.dll");
        assert!(!name.is_empty());
    }

    #[test]
    fn test_arch_suffix() {
        assert_eq!(arch_suffix("x86_64"), "x64");
        assert_eq!(arch_suffix("aarch64"), "arm64");
        assert_eq!(arch_suffix("riscv64"), "riscv64");
    }
}
