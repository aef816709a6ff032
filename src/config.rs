use axum::http::HeaderValue;
use clap::Parser;
use secrecy::SecretString;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use url::Url;

pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/distilbert-base-uncased-finetuned-sst-2-english";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Hugging Face API token sent as a bearer credential
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    pub hf_api_token: Option<String>,

    /// Hosted inference endpoint for the sentiment model
    #[arg(long, env = "HF_MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    pub model_url: String,

    /// Timeout in seconds for a single upstream call
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins, comma separated, or "*" for any origin
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HF_API_TOKEN environment variable not set")]
    MissingApiToken,
    #[error("invalid model URL {url:?}: {source}")]
    InvalidModelUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("cannot resolve host {0:?}")]
    InvalidHost(String),
    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),
}

/// Everything the relay needs to reach the upstream. Built once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub model_url: Url,
    pub api_token: SecretString,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    AllowAll,
    AllowOrigins(Vec<HeaderValue>),
}

impl Config {
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let api_token = self
            .hf_api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingApiToken)?;

        let model_url = Url::parse(&self.model_url).map_err(|source| ConfigError::InvalidModelUrl {
            url: self.model_url.clone(),
            source,
        })?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(RelayConfig {
            model_url,
            api_token: SecretString::from(api_token.to_owned()),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn cors_policy(&self) -> Result<CorsPolicy, ConfigError> {
        let origins: Vec<&str> = self
            .allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.is_empty() || origins.contains(&"*") {
            return Ok(CorsPolicy::AllowAll);
        }

        origins
            .into_iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CorsPolicy::AllowOrigins)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The exporter listens on the same host as the API.
    pub fn metrics_address(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let Some(port) = self.metrics_port else {
            return Ok(None);
        };

        (self.host.as_str(), port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidHost(self.host.clone()))
    }
}
