//! Env-driven configuration for the service and the CLI.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::workflow::DEFAULT_REQUIRED_NODE;

const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_COMFYUI_SERVER: &str = "127.0.0.1:8188";
const DEFAULT_STATIC_DIR: &str = "./static";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: String,
    /// Server used when a request leaves its `server` field empty.
    pub comfyui_server: String,
    /// Node id every submitted workflow must contain.
    pub required_node: String,
    pub static_dir: String,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn dotenv_load_from(path: &Path) {
        if let Err(e) = dotenv::from_path(path) {
            tracing::warn!("Could not load env file {}: {}", path.display(), e);
        }
    }

    pub fn new() -> Self {
        Config {
            api_host: var_or("API_HOST", DEFAULT_API_HOST),
            api_port: var_or("API_PORT", &DEFAULT_API_PORT.to_string()),
            comfyui_server: var_or("COMFYUI_SERVER", DEFAULT_COMFYUI_SERVER),
            required_node: var_or("REQUIRED_NODE", DEFAULT_REQUIRED_NODE),
            static_dir: var_or("STATIC_DIR", DEFAULT_STATIC_DIR),
        }
    }

    /// Address to bind, falling back to defaults on unparsable values.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip: IpAddr = self.api_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_HOST '{}', falling back to {}", self.api_host, DEFAULT_API_HOST);
            IpAddr::from([127, 0, 0, 1])
        });
        let port: u16 = self.api_port.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid API_PORT '{}', falling back to {}", self.api_port, DEFAULT_API_PORT);
            DEFAULT_API_PORT
        });
        SocketAddr::new(ip, port)
    }

    /// Effective settings keyed by their environment variable names.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("API_HOST", &self.api_host),
            ("API_PORT", &self.api_port),
            ("COMFYUI_SERVER", &self.comfyui_server),
            ("REQUIRED_NODE", &self.required_node),
            ("STATIC_DIR", &self.static_dir),
        ]
    }

    /// Log the settings in effect, CLI overrides and defaults included.
    pub fn print_env_vars(&self) {
        for (name, value) in self.entries() {
            tracing::info!("{}: {}", name, value);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
