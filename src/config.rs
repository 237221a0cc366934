use std::{net::SocketAddr, path::PathBuf};

use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// `None` issues tokens without an `exp` claim.
    pub ttl_minutes: Option<i64>,
}

/// Argon2 work factor.
#[derive(Debug, Clone, Copy)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Disk { assets_dir: PathBuf },
    S3(S3Config),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub storage: StorageConfig,
    pub cors_origin: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("APP_PORT").or_else(|| get("PORT")) {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid port {v:?}"))?,
            None => 3001,
        };

        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        let ttl_minutes = parse_or(&get, "JWT_TTL_MINUTES", 60 * 24 * 7_i64)?;
        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "socialite".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "socialite-users".into()),
            ttl_minutes: (ttl_minutes > 0).then_some(ttl_minutes),
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&get, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("disk") {
            "disk" => StorageConfig::Disk {
                assets_dir: get("ASSETS_DIR")
                    .unwrap_or_else(|| "public/assets".into())
                    .into(),
            },
            "s3" => StorageConfig::S3(S3Config {
                endpoint: get("MINIO_ENDPOINT").context("MINIO_ENDPOINT must be set")?,
                bucket: get("MINIO_BUCKET").context("MINIO_BUCKET must be set")?,
                access_key: get("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY must be set")?,
                secret_key: get("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY must be set")?,
                region: get("MINIO_REGION").unwrap_or_else(|| "us-east-1".into()),
            }),
            other => bail!("unknown STORAGE_BACKEND {other:?}, expected disk or s3"),
        };

        let max_upload_mb = parse_or(&get, "MAX_UPLOAD_MB", 30_usize)?;

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10_u32)?,
            jwt,
            hash,
            storage,
            cors_origin: get("CORS_ORIGIN"),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
impl AppConfig {
    /// Cheap hashing, disk storage under `dir/assets`.
    pub(crate) fn for_tests(dir: &std::path::Path) -> Self {
        let assets = dir.join("assets").display().to_string();
        Self::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".into()),
            "ASSETS_DIR" => Some(assets.clone()),
            "PASSWORD_HASH_MEMORY_KIB" => Some("1024".into()),
            "PASSWORD_HASH_ITERATIONS" => Some("1".into()),
            _ => None,
        })
        .expect("test config")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {v:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cr3t")])).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.jwt.issuer, "socialite");
        assert_eq!(cfg.jwt.ttl_minutes, Some(60 * 24 * 7));
        assert_eq!(cfg.max_upload_bytes, 30 * 1024 * 1024);
        assert!(matches!(cfg.storage, StorageConfig::Disk { .. }));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("JWT_TTL_MINUTES", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, None);
    }

    #[test]
    fn port_falls_back_to_port_var() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("PORT", "8088")])).unwrap();
        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.socket_addr().unwrap().port(), 8088);
    }

    #[test]
    fn s3_backend_requires_bucket_settings() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("STORAGE_BACKEND", "s3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MINIO_ENDPOINT"));

        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("STORAGE_BACKEND", "s3"),
            ("MINIO_ENDPOINT", "http://localhost:9000"),
            ("MINIO_BUCKET", "pictures"),
            ("MINIO_ACCESS_KEY", "minio"),
            ("MINIO_SECRET_KEY", "minio123"),
        ]))
        .unwrap();
        match cfg.storage {
            StorageConfig::S3(s3) => {
                assert_eq!(s3.bucket, "pictures");
                assert_eq!(s3.region, "us-east-1");
            }
            other => panic!("unexpected storage config {other:?}"),
        }
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("PASSWORD_HASH_ITERATIONS", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PASSWORD_HASH_ITERATIONS"));
    }
}
