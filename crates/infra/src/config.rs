//! Process configuration from environment variables.

use std::net::SocketAddr;

use chrono::NaiveTime;
use thiserror::Error;

use eafoods_observability::LogFormat;
use eafoods_preorders::DeliverySchedule;
use eafoods_products::{StockUpdateWindow, parse_utc_offset};
use eafoods_reporting::ReportPolicy;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_STOCK_UPDATE_WINDOWS: &str = "08:00-12:00,18:00-19:00";
pub const DEFAULT_UTC_OFFSET: &str = "+00:00";
pub const DEFAULT_ORDER_CUTOFF: &str = "18:00";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, reason: impl ToString) -> Self {
        Self {
            var,
            reason: reason.to_string(),
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `true` when `JWT_SECRET` was not set and the dev default is in use.
    pub jwt_secret_is_default: bool,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub stock_window: StockUpdateWindow,
    pub delivery_schedule: DeliverySchedule,
    pub report_policy: ReportPolicy,
    pub log_format: LogFormat,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::new("BIND_ADDR", e))?;

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEFAULT_JWT_SECRET.to_string(), true),
        };

        let offset = parse_utc_offset(
            &get("LOCAL_UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string()),
        )
        .map_err(|e| ConfigError::new("LOCAL_UTC_OFFSET", e))?;

        let stock_window = StockUpdateWindow::parse(
            &get("STOCK_UPDATE_WINDOWS").unwrap_or_else(|| DEFAULT_STOCK_UPDATE_WINDOWS.to_string()),
            offset,
        )
        .map_err(|e| ConfigError::new("STOCK_UPDATE_WINDOWS", e))?;

        let cutoff_raw = get("ORDER_CUTOFF").unwrap_or_else(|| DEFAULT_ORDER_CUTOFF.to_string());
        let cutoff = NaiveTime::parse_from_str(cutoff_raw.trim(), "%H:%M")
            .map_err(|e| ConfigError::new("ORDER_CUTOFF", e))?;

        let report_policy = if parse_bool("REPORT_INCLUDE_PENDING", get("REPORT_INCLUDE_PENDING"))? {
            ReportPolicy::ConfirmedAndPending
        } else {
            ReportPolicy::ConfirmedOnly
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::new("LOG_FORMAT", e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            database_url: get("DATABASE_URL"),
            stock_window,
            delivery_schedule: DeliverySchedule::new(cutoff, offset),
            report_policy,
            log_format,
            seed_demo_data: parse_bool("SEED_DEMO_DATA", get("SEED_DEMO_DATA"))?,
        })
    }
}

fn parse_bool(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::new(var, format!("'{other}' is not a boolean"))),
    }
}
