//! Service configuration structures and resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SetupError, ValidationErrorKind};

use super::snapshot::EnvSnapshot;

/// PostgreSQL configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub port: u16,
    pub host: String,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    /// System account the server runs under; also names the connection URL user.
    pub admin_user: String,
    /// Root of the versioned binary tree (`<root>/<N>/bin`).
    pub bin_root: PathBuf,
}

impl PostgresConfig {
    /// Resolve for a `manage` invocation.
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, SetupError> {
        Self::resolve_with(env, false)
    }

    /// Resolve for a `setup` invocation.
    ///
    /// Additionally honors the legacy `DATA_DIR` variable, which wins over
    /// `PG_DATA` when both are set.
    pub fn resolve_setup(env: &EnvSnapshot) -> Result<Self, SetupError> {
        Self::resolve_with(env, true)
    }

    fn resolve_with(env: &EnvSnapshot, legacy_data_dir: bool) -> Result<Self, SetupError> {
        let port = resolve_port(env, "PG_PORT", 5432)?;
        let mut data_dir = env.get("PG_DATA").unwrap_or("/var/lib/postgresql/data");
        if legacy_data_dir {
            if let Some(dir) = env.get("DATA_DIR") {
                data_dir = dir;
            }
        }
        let config = Self {
            port,
            host: "127.0.0.1".to_string(),
            data_dir: PathBuf::from(non_empty("data directory", data_dir)?),
            log_file: PathBuf::from(non_empty(
                "log file",
                env.get("PG_LOG").unwrap_or("/var/log/postgresql/postgresql.log"),
            )?),
            admin_user: non_empty("admin user", env.get("PG_USER").unwrap_or("postgres"))?,
            bin_root: PathBuf::from("/usr/lib/postgresql"),
        };
        debug!(port = config.port, data_dir = %config.data_dir.display(), "resolved postgres config");
        Ok(config)
    }
}

/// Redis configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub port: u16,
    pub host: String,
    pub conf_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    /// System account the server runs under.
    pub run_user: String,
    pub password: Option<String>,
    /// Append-only log flag, `"yes"` or `"no"`.
    pub append_only: String,
}

impl RedisConfig {
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, SetupError> {
        let port = resolve_port(env, "REDIS_PORT", 6379)?;
        let conf_path = PathBuf::from(non_empty(
            "config path",
            env.get("REDIS_CONF").unwrap_or("/etc/redis/redis.conf"),
        )?);

        let append_only = env.get("APPENDONLY").unwrap_or("yes").to_string();
        if append_only != "yes" && append_only != "no" {
            return Err(SetupError::Validation {
                kind: ValidationErrorKind::InvalidFlag {
                    var: "APPENDONLY".to_string(),
                    value: append_only,
                },
            });
        }

        // Env wins outright; otherwise fall back to an existing config file.
        let password = env
            .get("REDIS_PASSWORD")
            .map(str::to_string)
            .or_else(|| read_redis_password(&conf_path));

        Ok(Self {
            port,
            host: "127.0.0.1".to_string(),
            conf_path,
            data_dir: PathBuf::from(non_empty(
                "data directory",
                env.get("REDIS_DATA_DIR").unwrap_or("/var/lib/redis"),
            )?),
            log_file: PathBuf::from("/var/log/redis/redis-server.log"),
            run_user: "redis".to_string(),
            password,
            append_only,
        })
    }
}

/// Scan an existing Redis config for a `requirepass` directive.
///
/// Best effort by design: an unreadable file and an absent directive both
/// collapse to `None` ("no password"), never an error.
pub fn read_redis_password(conf_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(conf_path).ok()?;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("requirepass") {
            if let Some(pass) = line.split_whitespace().nth(1) {
                return Some(pass.to_string());
            }
        }
    }
    None
}

/// OpenTelemetry Collector configuration.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// Install base directory (`BASE_DIR`, falling back to `$HOME`).
    pub base_dir: PathBuf,
    /// Pinned release version.
    pub version: String,
    pub binary_name: String,
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    /// Presence-only sentinel suppressing re-installation.
    pub marker_path: PathBuf,
    /// Expected SHA-256 of the release archive, when pinned.
    pub expected_sha256: Option<String>,
    pub force_update: bool,
    /// CPU architecture string used for platform mapping.
    pub machine: String,
    pub host: String,
    /// The collector's prometheus self-metrics port; doubles as the probe port.
    pub metrics_port: u16,
}

impl OtelConfig {
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, SetupError> {
        let base_dir = env
            .get("BASE_DIR")
            .or_else(|| env.get("HOME"))
            .ok_or(SetupError::Validation {
                kind: ValidationErrorKind::EmptyField {
                    field: "install base directory (BASE_DIR or HOME)",
                },
            })?;
        let base_dir = PathBuf::from(base_dir);
        let version = non_empty("collector version", env.get("OTEL_VERSION").unwrap_or("0.137.0"))?;
        let binary_name = "otelcol-contrib".to_string();

        Ok(Self {
            binary_path: base_dir.join(&binary_name),
            config_path: base_dir.join("otel-config.yaml"),
            marker_path: base_dir.join(".bootstrap_done_otel_only"),
            base_dir,
            version,
            binary_name,
            expected_sha256: env.get("OTEL_SHA256").map(str::to_string),
            force_update: env.get("OTEL_FORCE_UPDATE") == Some("1"),
            machine: std::env::consts::ARCH.to_string(),
            host: "127.0.0.1".to_string(),
            metrics_port: 8888,
        })
    }
}

/// Google Cloud CLI configuration.
#[derive(Debug, Clone)]
pub struct GcloudConfig {
    pub key_url: String,
    pub keyring_path: PathBuf,
    pub repo_url: String,
    pub suite: String,
    pub repo_file: PathBuf,
    pub package: String,
    /// Exact version pin (`GCLOUD_VERSION`), installed as `<pkg>=<ver>-*`.
    pub version: Option<String>,
}

impl GcloudConfig {
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, SetupError> {
        Ok(Self {
            key_url: "https://packages.cloud.google.com/apt/doc/apt-key.gpg".to_string(),
            keyring_path: PathBuf::from("/usr/share/keyrings/cloud.google.gpg"),
            repo_url: "https://packages.cloud.google.com/apt".to_string(),
            suite: "cloud-sdk".to_string(),
            repo_file: PathBuf::from("/etc/apt/sources.list.d/google-cloud-sdk.list"),
            package: "google-cloud-cli".to_string(),
            version: env.get("GCLOUD_VERSION").map(str::to_string),
        })
    }
}

/// Parse and range-check a port variable. Rejects 0 and anything above 65535.
fn resolve_port(env: &EnvSnapshot, var: &str, default: u16) -> Result<u16, SetupError> {
    match env.get(var) {
        None => Ok(default),
        Some(raw) => {
            let invalid = || SetupError::Validation {
                kind: ValidationErrorKind::InvalidPort {
                    var: var.to_string(),
                    value: raw.to_string(),
                },
            };
            let port: u16 = raw.trim().parse().map_err(|_| invalid())?;
            if port == 0 {
                return Err(invalid());
            }
            Ok(port)
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, SetupError> {
    if value.trim().is_empty() {
        return Err(SetupError::Validation {
            kind: ValidationErrorKind::EmptyField { field },
        });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_defaults() {
        let env = EnvSnapshot::default();
        let config = PostgresConfig::resolve(&env).unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/postgresql/data"));
        assert_eq!(config.admin_user, "postgres");
        assert_eq!(config.bin_root, PathBuf::from("/usr/lib/postgresql"));
    }

    #[test]
    fn test_postgres_env_overrides_round_trip() {
        let env = EnvSnapshot::from_pairs([
            ("PG_PORT", "5433"),
            ("PG_DATA", "/srv/pgdata"),
            ("PG_LOG", "/srv/pg.log"),
            ("PG_USER", "dba"),
        ]);
        let config = PostgresConfig::resolve(&env).unwrap();
        assert_eq!(config.port, 5433);
        assert_eq!(config.data_dir, PathBuf::from("/srv/pgdata"));
        assert_eq!(config.log_file, PathBuf::from("/srv/pg.log"));
        assert_eq!(config.admin_user, "dba");
    }

    #[test]
    fn test_postgres_legacy_data_dir_only_for_setup() {
        let env = EnvSnapshot::from_pairs([("PG_DATA", "/a"), ("DATA_DIR", "/b")]);
        assert_eq!(
            PostgresConfig::resolve(&env).unwrap().data_dir,
            PathBuf::from("/a")
        );
        assert_eq!(
            PostgresConfig::resolve_setup(&env).unwrap().data_dir,
            PathBuf::from("/b")
        );
    }

    #[test]
    fn test_port_zero_rejected() {
        let env = EnvSnapshot::from_pairs([("PG_PORT", "0")]);
        let err = PostgresConfig::resolve(&env).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Validation {
                kind: ValidationErrorKind::InvalidPort { .. }
            }
        ));
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        for raw in ["65536", "70000", "-1", "abc", ""] {
            let env = EnvSnapshot::from_pairs([("REDIS_PORT", raw)]);
            // Empty values count as unset, so the default applies.
            if raw.is_empty() {
                assert_eq!(RedisConfig::resolve(&env).unwrap().port, 6379);
            } else {
                assert!(RedisConfig::resolve(&env).is_err(), "accepted {raw}");
            }
        }
    }

    #[test]
    fn test_port_bounds_accepted() {
        for (raw, expected) in [("1", 1u16), ("65535", 65535u16)] {
            let env = EnvSnapshot::from_pairs([("REDIS_PORT", raw)]);
            assert_eq!(RedisConfig::resolve(&env).unwrap().port, expected);
        }
    }

    #[test]
    fn test_redis_defaults() {
        let env = EnvSnapshot::default();
        let config = RedisConfig::resolve(&env).unwrap();
        assert_eq!(config.port, 6379);
        assert_eq!(config.conf_path, PathBuf::from("/etc/redis/redis.conf"));
        assert_eq!(config.append_only, "yes");
        assert_eq!(config.run_user, "redis");
        assert!(config.password.is_none());
    }

    #[test]
    fn test_redis_append_only_validated() {
        let env = EnvSnapshot::from_pairs([("APPENDONLY", "maybe")]);
        let err = RedisConfig::resolve(&env).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Validation {
                kind: ValidationErrorKind::InvalidFlag { .. }
            }
        ));

        let env = EnvSnapshot::from_pairs([("APPENDONLY", "no")]);
        assert_eq!(RedisConfig::resolve(&env).unwrap().append_only, "no");
    }

    #[test]
    fn test_redis_password_env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        std::fs::write(&conf, "requirepass filepass\n").unwrap();
        let env = EnvSnapshot::from_pairs([
            ("REDIS_CONF", conf.to_str().unwrap()),
            ("REDIS_PASSWORD", "envpass"),
        ]);
        let config = RedisConfig::resolve(&env).unwrap();
        assert_eq!(config.password.as_deref(), Some("envpass"));
    }

    #[test]
    fn test_redis_password_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        std::fs::write(&conf, "port 6379\nrequirepass s3cret extra\n").unwrap();
        let env = EnvSnapshot::from_pairs([("REDIS_CONF", conf.to_str().unwrap())]);
        let config = RedisConfig::resolve(&env).unwrap();
        assert_eq!(config.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_redis_password_missing_file_is_none() {
        assert_eq!(read_redis_password(Path::new("/nonexistent/redis.conf")), None);
    }

    #[test]
    fn test_redis_password_directive_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("redis.conf");
        std::fs::write(&conf, "port 6379\nbind 127.0.0.1\n").unwrap();
        assert_eq!(read_redis_password(&conf), None);
    }

    #[test]
    fn test_otel_resolution() {
        let env = EnvSnapshot::from_pairs([
            ("BASE_DIR", "/opt/otel"),
            ("OTEL_VERSION", "0.140.1"),
            ("OTEL_SHA256", "abc123"),
            ("OTEL_FORCE_UPDATE", "1"),
        ]);
        let config = OtelConfig::resolve(&env).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/opt/otel"));
        assert_eq!(config.version, "0.140.1");
        assert_eq!(config.binary_path, PathBuf::from("/opt/otel/otelcol-contrib"));
        assert_eq!(config.config_path, PathBuf::from("/opt/otel/otel-config.yaml"));
        assert_eq!(
            config.marker_path,
            PathBuf::from("/opt/otel/.bootstrap_done_otel_only")
        );
        assert_eq!(config.expected_sha256.as_deref(), Some("abc123"));
        assert!(config.force_update);
        assert_eq!(config.metrics_port, 8888);
    }

    #[test]
    fn test_otel_base_dir_falls_back_to_home() {
        let env = EnvSnapshot::from_pairs([("HOME", "/home/dev")]);
        let config = OtelConfig::resolve(&env).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/home/dev"));
        assert!(!config.force_update);
    }

    #[test]
    fn test_otel_requires_base_dir() {
        let env = EnvSnapshot::default();
        assert!(OtelConfig::resolve(&env).is_err());
    }

    #[test]
    fn test_gcloud_defaults_and_pin() {
        let env = EnvSnapshot::default();
        let config = GcloudConfig::resolve(&env).unwrap();
        assert_eq!(config.package, "google-cloud-cli");
        assert_eq!(config.suite, "cloud-sdk");
        assert!(config.version.is_none());

        let env = EnvSnapshot::from_pairs([("GCLOUD_VERSION", "444.0.0")]);
        let config = GcloudConfig::resolve(&env).unwrap();
        assert_eq!(config.version.as_deref(), Some("444.0.0"));
    }
}
