//! Configuration file management for larder.
//!
//! Provides a TOML-based config file at `~/.config/larder/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use larder_db::config::DbConfig;

/// Environment variable naming the catalog file.
pub const CATALOG_ENV_VAR: &str = "LARDER_CATALOG";
/// Environment variable naming the default family.
pub const FAMILY_ENV_VAR: &str = "LARDER_FAMILY";
/// Environment variable naming the acting member.
pub const MEMBER_ENV_VAR: &str = "LARDER_MEMBER";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub household: HouseholdSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Catalog TOML path; `catalog.toml` next to the config file when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Who is acting when `--family` / `--as` are not given.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HouseholdSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the larder config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/larder` or `~/.config/larder`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("larder");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("larder")
}

/// Return the path to the larder config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default catalog location.
pub fn default_catalog_path() -> PathBuf {
    config_dir().join("catalog.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The database URL may carry a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Command-line overrides, all optional.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides<'a> {
    pub database_url: Option<&'a str>,
    pub catalog: Option<&'a str>,
    pub family: Option<&'a str>,
    pub member: Option<&'a str>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct LarderConfig {
    pub db_config: DbConfig,
    pub catalog_path: PathBuf,
    pub family: Option<String>,
    pub member: Option<String>,
}

fn pick(flag: Option<&str>, env_var: &str, file: Option<&str>) -> Option<String> {
    flag.map(str::to_owned)
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
        .or_else(|| file.map(str::to_owned))
}

impl LarderConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `--database-url` > `LARDER_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Catalog: `--catalog` > `LARDER_CATALOG` > `catalog.path` > `<config dir>/catalog.toml`
    /// - Family / member: `--family` / `--as` > `LARDER_FAMILY` / `LARDER_MEMBER` > `[household]`
    pub fn resolve(overrides: Overrides<'_>) -> Self {
        let file_config = load_config().ok();

        let db_url = pick(
            overrides.database_url,
            DbConfig::ENV_VAR,
            file_config.as_ref().map(|c| c.database.url.as_str()),
        )
        .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let catalog_path = pick(
            overrides.catalog,
            CATALOG_ENV_VAR,
            file_config
                .as_ref()
                .and_then(|c| c.catalog.path.as_deref())
                .and_then(|p| p.to_str()),
        )
        .map(PathBuf::from)
        .unwrap_or_else(default_catalog_path);

        let household = file_config.as_ref().map(|c| &c.household);
        let family = pick(
            overrides.family,
            FAMILY_ENV_VAR,
            household.and_then(|h| h.family.as_deref()),
        );
        let member = pick(
            overrides.member,
            MEMBER_ENV_VAR,
            household.and_then(|h| h.member.as_deref()),
        );

        Self {
            db_config: DbConfig::new(db_url),
            catalog_path,
            family,
            member,
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point the config directory at an empty temp dir for the duration of
    /// a test.
    struct IsolatedConfig {
        tmp: tempfile::TempDir,
        orig_xdg: Option<String>,
    }

    impl IsolatedConfig {
        fn new() -> Self {
            let tmp = tempfile::TempDir::new().unwrap();
            let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
            unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
            for var in [DbConfig::ENV_VAR, CATALOG_ENV_VAR, FAMILY_ENV_VAR, MEMBER_ENV_VAR] {
                unsafe { std::env::remove_var(var) };
            }
            Self { tmp, orig_xdg }
        }
    }

    impl Drop for IsolatedConfig {
        fn drop(&mut self) {
            match self.orig_xdg.take() {
                Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
                None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
            }
            for var in [DbConfig::ENV_VAR, CATALOG_ENV_VAR, FAMILY_ENV_VAR, MEMBER_ENV_VAR] {
                unsafe { std::env::remove_var(var) };
            }
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let iso = IsolatedConfig::new();

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            catalog: CatalogSection {
                path: Some(iso.tmp.path().join("stores.toml")),
            },
            household: HouseholdSection {
                family: Some("Rivera".into()),
                member: None,
            },
        };
        save_config(&original).unwrap();
        assert!(config_path().starts_with(iso.tmp.path()));

        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.catalog.path, original.catalog.path);
        assert_eq!(loaded.household.family.as_deref(), Some("Rivera"));
        assert!(loaded.household.member.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let _iso = IsolatedConfig::new();
        save_config(&ConfigFile {
            database: DatabaseSection {
                url: "postgresql://localhost:5432/larder".into(),
            },
            catalog: CatalogSection::default(),
            household: HouseholdSection::default(),
        })
        .unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn minimal_config_file_parses() {
        let config: ConfigFile =
            toml::from_str("[database]\nurl = \"postgresql://x:5432/y\"\n").unwrap();
        assert!(config.catalog.path.is_none());
        assert!(config.household.family.is_none());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        let _iso = IsolatedConfig::new();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(FAMILY_ENV_VAR, "EnvFamily") };

        let config = LarderConfig::resolve(Overrides {
            database_url: Some("postgresql://cli:5432/clidb"),
            family: Some("CliFamily"),
            ..Overrides::default()
        });
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
        assert_eq!(config.family.as_deref(), Some("CliFamily"));
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        let _iso = IsolatedConfig::new();
        save_config(&ConfigFile {
            database: DatabaseSection {
                url: "postgresql://file:5432/filedb".into(),
            },
            catalog: CatalogSection::default(),
            household: HouseholdSection {
                family: Some("FileFamily".into()),
                member: Some("Alex".into()),
            },
        })
        .unwrap();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(CATALOG_ENV_VAR, "/etc/larder/catalog.toml") };

        let config = LarderConfig::resolve(Overrides::default());
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.catalog_path, PathBuf::from("/etc/larder/catalog.toml"));
        assert_eq!(config.family.as_deref(), Some("FileFamily"));
        assert_eq!(config.member.as_deref(), Some("Alex"));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let _iso = IsolatedConfig::new();

        let config = LarderConfig::resolve(Overrides::default());
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.catalog_path, default_catalog_path());
        assert!(config.family.is_none());
        assert!(config.member.is_none());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("larder/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
