//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Every setting
//! is optional.

use comfy_relay_client::{ClientConfig, PollPolicy};
use comfy_relay_gateway::GatewayConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host of the generation backend.
    #[serde(default = "default_comfyui_host")]
    pub comfyui_host: String,

    /// Port of the generation backend.
    #[serde(default = "default_comfyui_port")]
    pub comfyui_port: u16,

    /// Overall budget for one generation job, in seconds.
    #[serde(default = "default_comfy_timeout")]
    pub comfy_timeout: u64,

    /// Address the API listens on.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Port the API listens on.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Checkpoint used when a request does not name one.
    #[serde(default = "default_checkpoint")]
    pub default_checkpoint: String,

    /// Consecutive transient poll failures tolerated before a job is
    /// abandoned. Unset means only the job timeout applies.
    #[serde(default)]
    pub poll_max_consecutive_failures: Option<u32>,
}

fn default_comfyui_host() -> String {
    "127.0.0.1".to_string()
}

fn default_comfyui_port() -> u16 {
    8188
}

fn default_comfy_timeout() -> u64 {
    600
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_checkpoint() -> String {
    GatewayConfig::default().default_checkpoint
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(
            config::Config::builder().add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Base URL of the generation backend.
    #[must_use]
    pub fn backend_url(&self) -> String {
        format!("http://{}:{}", self.comfyui_host, self.comfyui_port)
    }

    /// Socket address the API binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Job client settings.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(self.backend_url());
        client.poll = PollPolicy {
            max_consecutive_failures: self.poll_max_consecutive_failures,
            ..PollPolicy::default()
        };
        client
    }

    /// Gateway settings.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            job_timeout: Duration::from_secs(self.comfy_timeout),
            default_checkpoint: self.default_checkpoint.clone(),
        }
    }
}
