//! storage maps cache roles to directories.
//!
//! Target listings and generated nested-rule files live under a
//! per-user cache. A JSON configuration file can reroute each role;
//! standard locations are searched unless an explicit path is given.

extern crate serde;
extern crate serde_json;

use self::serde::Deserialize;
use crate::error::PipelineError;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// DirectoryMapping locates the cache directory for each storage
/// role.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectoryMapping {
    /// target_listing holds cached per-makefile target listings.
    pub target_listing: PathBuf,

    /// nested_rule holds generated nested-rule makefiles.
    pub nested_rule: PathBuf,

    /// tmp holds short-lived working files.
    pub tmp: PathBuf,
}

impl DirectoryMapping {
    /// with_defaults places every role under the user cache
    /// directory.
    pub fn with_defaults() -> DirectoryMapping {
        let base: PathBuf = cache_home().join("nestmake");
        DirectoryMapping {
            target_listing: base.join("target-listing"),
            nested_rule: base.join("nested-rule"),
            tmp: base.join("tmp"),
        }
    }

    /// ensure creates every mapped directory.
    pub fn ensure(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.target_listing)?;
        fs::create_dir_all(&self.nested_rule)?;
        fs::create_dir_all(&self.tmp)?;
        Ok(())
    }
}

impl Default for DirectoryMapping {
    /// default generates the standard cache mapping.
    fn default() -> Self {
        DirectoryMapping::with_defaults()
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

fn cache_home() -> PathBuf {
    match env::var("XDG_CACHE_HOME") {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => home_dir().join(".cache"),
    }
}

fn config_home() -> PathBuf {
    match env::var("XDG_CONFIG_HOME") {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => home_dir().join(".config"),
    }
}

/// ConfigFile models the configuration file layout.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    directories: Option<ConfigDirectories>,
}

/// ConfigDirectories reroutes cache roles.
#[derive(Debug, Deserialize)]
struct ConfigDirectories {
    #[serde(rename = "target-listing")]
    target_listing: Option<String>,

    #[serde(rename = "nested-rule")]
    nested_rule: Option<String>,

    tmp: Option<String>,
}

fn expand_tilde(value: &str, home: &Path) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if value == "~" => home.to_path_buf(),
        None => PathBuf::from(value),
    }
}

fn standard_config_file() -> Option<PathBuf> {
    let candidates: [PathBuf; 2] = [
        config_home().join("nestmake/config.json"),
        home_dir().join(".nestmake.json"),
    ];

    candidates.into_iter().find(|path| path.is_file())
}

/// load_directory_mapping builds the cache mapping, overlaying the
/// configuration file when one exists.
pub fn load_directory_mapping(
    config_path: Option<&Path>,
) -> Result<DirectoryMapping, PipelineError> {
    let mut mapping: DirectoryMapping = DirectoryMapping::with_defaults();

    let path: Option<PathBuf> = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => standard_config_file(),
    };

    let path: PathBuf = match path {
        Some(path) => path,
        None => return Ok(mapping),
    };

    debug!(config = %path.display(), "loading configuration file");

    let text: String = fs::read_to_string(&path)
        .map_err(|err| PipelineError::Config(format!("{}: {}", path.display(), err)))?;
    let config: ConfigFile = serde_json::from_str(&text)
        .map_err(|err| PipelineError::Config(format!("{}: {}", path.display(), err)))?;

    if let Some(directories) = config.directories {
        let home: PathBuf = home_dir();

        if let Some(value) = directories.target_listing {
            mapping.target_listing = expand_tilde(&value, &home);
        }

        if let Some(value) = directories.nested_rule {
            mapping.nested_rule = expand_tilde(&value, &home);
        }

        if let Some(value) = directories.tmp {
            mapping.tmp = expand_tilde(&value, &home);
        }
    }

    Ok(mapping)
}

/// cache_file_name derives a flat cache filename from a path by
/// escaping separators, so one cache directory serves all projects.
pub fn cache_file_name(path: &Path, extension: &str) -> String {
    let escaped: String = path
        .display()
        .to_string()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '!',
            other => other,
        })
        .collect();

    format!("{}.{}", escaped, extension)
}

#[test]
fn test_default_mapping_roles_are_distinct() {
    let mapping: DirectoryMapping = DirectoryMapping::with_defaults();
    assert_ne!(mapping.target_listing, mapping.nested_rule);
    assert_ne!(mapping.target_listing, mapping.tmp);
    assert_ne!(mapping.nested_rule, mapping.tmp);
}

#[test]
fn test_expand_tilde() {
    let home: &Path = Path::new("/home/build");
    assert_eq!(
        expand_tilde("~/cache", home),
        PathBuf::from("/home/build/cache")
    );
    assert_eq!(expand_tilde("~", home), PathBuf::from("/home/build"));
    assert_eq!(expand_tilde("/var/cache", home), PathBuf::from("/var/cache"));
}

#[test]
fn test_cache_file_name_escapes_separators() {
    assert_eq!(
        cache_file_name(Path::new("/work/project/Makefile"), "json"),
        "!work!project!Makefile.json"
    );
}

#[test]
fn test_load_directory_mapping_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path: PathBuf = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{"directories": {"target-listing": "/var/cache/listings", "tmp": "/tmp/nestmake"}}"#,
    )
    .unwrap();

    let mapping: DirectoryMapping = load_directory_mapping(Some(&config_path)).unwrap();
    assert_eq!(mapping.target_listing, PathBuf::from("/var/cache/listings"));
    assert_eq!(mapping.tmp, PathBuf::from("/tmp/nestmake"));
    assert_eq!(
        mapping.nested_rule,
        DirectoryMapping::with_defaults().nested_rule
    );
}

#[test]
fn test_load_directory_mapping_rejects_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let config_path: PathBuf = dir.path().join("config.json");
    std::fs::write(&config_path, "not json").unwrap();
    assert!(matches!(
        load_directory_mapping(Some(&config_path)),
        Err(PipelineError::Config(_))
    ));
}
