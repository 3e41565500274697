use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

const DEFAULT_HOST_ADDRESS: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 14002;
const DEFAULT_EXPORTER_PORT: u16 = 9651;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storj_host_address: String,
    pub storj_api_port: u16,
    pub exporter_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storj_host_address = env_string(
            &lookup,
            "STORJ_HOST_ADDRESS",
            DEFAULT_HOST_ADDRESS.to_string(),
        );
        let storj_api_port = env_u16(&lookup, "STORJ_API_PORT", DEFAULT_API_PORT)?;
        let exporter_port = env_u16(&lookup, "STORJ_EXPORTER_PORT", DEFAULT_EXPORTER_PORT)?;

        let config = Self {
            storj_host_address,
            storj_api_port,
            exporter_port,
        };
        config.upstream_base_url()?;
        Ok(config)
    }

    /// Base URL of the node's local dashboard API, with a trailing slash.
    pub fn upstream_base_url(&self) -> Result<Url> {
        let raw = format!(
            "http://{}:{}/",
            self.storj_host_address, self.storj_api_port
        );
        let url = Url::parse(&raw).with_context(|| {
            format!(
                "invalid STORJ_HOST_ADDRESS {:?}",
                self.storj_host_address
            )
        })?;
        if url.host_str().is_none() {
            return Err(anyhow!("STORJ_HOST_ADDRESS missing host"));
        }
        Ok(url)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.exporter_port))
    }
}

fn env_string<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    env_optional(lookup, key).unwrap_or(default)
}

fn env_u16<F>(lookup: &F, key: &str, default: u16) -> Result<u16>
where
    F: Fn(&str) -> Option<String>,
{
    match env_optional(lookup, key) {
        Some(value) => value
            .parse::<u16>()
            .with_context(|| format!("invalid {key}: {value:?}")),
        None => Ok(default),
    }
}

fn env_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
