use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use crate::error::ConfigError;

pub const DEFAULT_MODEL_PATH: &str = "artifacts/booking_model.json";
pub const DEFAULT_META_PATH: &str = "artifacts/booking_model.meta.json";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    pub meta_path: PathBuf,
    pub addr: SocketAddr,
    /// Log a summary of every feature vector (`LOG_PRED=1`).
    pub log_predictions: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read settings through `lookup` so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.into());
        let meta_path = lookup("META_PATH").unwrap_or_else(|| DEFAULT_META_PATH.into());

        let ip = match lookup("BIND_ADDR") {
            Some(v) => v.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
                var: "BIND_ADDR",
                value: v,
                expected: "IP address",
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match lookup("PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: v,
                expected: "port number",
            })?,
            None => DEFAULT_PORT,
        };
        let log_predictions = match lookup("LOG_PRED").as_deref() {
            None | Some("" | "0" | "false") => false,
            Some("1" | "true") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_PRED",
                    value: other.to_string(),
                    expected: "flag (0/1/true/false)",
                })
            }
        };

        Ok(Self {
            model_path: model_path.into(),
            meta_path: meta_path.into(),
            addr: SocketAddr::new(ip, port),
            log_predictions,
        })
    }
}
