//! Typed provisioning settings, read once from the environment file.

use std::fmt;

use crate::{
    envfile::EnvFile,
    error::{Error, Result},
};

pub const STORAGES: &str = "DOKKU_STORAGES";
pub const DOMAINS: &str = "DOKKU_DOMAINS";
pub const REDIRECTS: &str = "DOKKU_REDIRECTS";
pub const LETSENCRYPT: &str = "DOKKU_LETSENCRYPT";

/// Host directory (relative to the app's storage root) mounted into the
/// container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMount {
    pub host_dir: String,
    pub container_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub from: String,
    pub to: String,
}

/// Dokku service plugins that can be created and linked to an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Redis,
    Memcached,
    Postgres,
    Mysql,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Redis,
        ServiceKind::Memcached,
        ServiceKind::Postgres,
        ServiceKind::Mysql,
    ];

    /// The plugin's command namespace, as in `redis:create`.
    pub fn plugin(self) -> &'static str {
        match self {
            ServiceKind::Redis => "redis",
            ServiceKind::Memcached => "memcached",
            ServiceKind::Postgres => "postgres",
            ServiceKind::Mysql => "mysql",
        }
    }

    /// The setting listing service names of this kind.
    pub fn setting(self) -> &'static str {
        match self {
            ServiceKind::Redis => "DOKKU_REDIS",
            ServiceKind::Memcached => "DOKKU_MEMCACHED",
            ServiceKind::Postgres => "DOKKU_POSTGRES",
            ServiceKind::Mysql => "DOKKU_MYSQL",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plugin())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningPlan {
    pub storages: Vec<StorageMount>,
    pub domains: Vec<String>,
    pub redirects: Vec<Redirect>,
    pub letsencrypt: bool,
    pub services: Vec<(ServiceKind, Vec<String>)>,
}

impl ProvisioningPlan {
    /// Reads settings from `env`, falling back to `fallback` for keys the file
    /// does not set.
    pub fn from_settings(env: &EnvFile, fallback: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let setting = |key: &str| {
            env.get(key)
                .map(str::to_string)
                .or_else(|| fallback(key))
                .unwrap_or_default()
        };

        let storages = split_pairs(STORAGES, &setting(STORAGES))?
            .into_iter()
            .map(|(host_dir, container_dir)| StorageMount {
                host_dir,
                container_dir,
            })
            .collect();

        let redirects = split_pairs(REDIRECTS, &setting(REDIRECTS))?
            .into_iter()
            .map(|(from, to)| Redirect { from, to })
            .collect();

        let services = ServiceKind::ALL
            .iter()
            .map(|&kind| (kind, split_list(&setting(kind.setting()))))
            .collect();

        Ok(Self {
            storages,
            domains: split_list(&setting(DOMAINS)),
            redirects,
            letsencrypt: is_enabled(&setting(LETSENCRYPT)),
            services,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn split_pairs(setting: &'static str, value: &str) -> Result<Vec<(String, String)>> {
    value
        .split_whitespace()
        .map(|entry| match entry.split_once(':') {
            Some((left, right)) if !left.is_empty() && !right.is_empty() => {
                Ok((left.to_string(), right.to_string()))
            }
            _ => Err(Error::InvalidPair {
                setting,
                entry: entry.to_string(),
            }),
        })
        .collect()
}

fn is_enabled(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !["0", "false", "no"]
            .iter()
            .any(|off| value.eq_ignore_ascii_case(off))
}
