use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Address of this host, recorded as `ip` on every backend.  Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    pub etcd_endpoints: Vec<String>,
    pub backends_prefix: String,
    pub io_timeout_secs: u64,
    pub dry_run: bool,
    pub json_report: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_ip: None,
            etcd_endpoints: vec!["http://127.0.0.1:2379".into()],
            backends_prefix: "backends".into(),
            io_timeout_secs: 10,
            dry_run: false,
            json_report: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| Error::Configuration(format!("failed to load configuration: {}", e)))?;
        config.validate()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("registrar.toml"))
            .merge(Json::file("registrar.json"))
            .merge(Env::prefixed("REGISTRAR_"))
            // Plain HOST_IP, as injected by existing deployments.
            .merge(Env::raw().only(&["HOST_IP"]))
    }

    fn validate(mut self) -> Result<Self> {
        let host_ip = self
            .host_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| {
                Error::Configuration("HOST_IP (or REGISTRAR_HOST_IP) is not set".into())
            })?
            .to_string();
        self.host_ip = Some(host_ip);

        if self.etcd_endpoints.is_empty() {
            return Err(Error::Configuration("etcd_endpoints must not be empty".into()));
        }
        if self.io_timeout_secs == 0 {
            return Err(Error::Configuration("io_timeout_secs must be positive".into()));
        }
        Ok(self)
    }

    /// The validated host address.
    pub fn host_ip(&self) -> &str {
        self.host_ip.as_deref().unwrap_or_default()
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}
