// src/config.rs

use std::{env, fmt, net::SocketAddr, time::Duration};

use chrono::FixedOffset;
use dotenvy::dotenv;
use url::Url;

use crate::services::access::AccessComparison;

/// Upper bound accepted for a class's grace period.
pub const MAX_FREE_DAYS: u32 = 366;
/// Maximum number of payment records accepted in a single request.
pub const MAX_PAYMENTS_PER_REQUEST: u64 = 2000;
/// Maximum number of exam result rows accepted in a single request.
pub const MAX_EXAM_ROWS_PER_REQUEST: u64 = 5000;
/// Parts nested deeper than this under one root are re-rooted. Keeps the
/// serialized tree within serde_json's default recursion limit for clients.
pub const MAX_EXAM_PART_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Browser origins allowed by CORS (already validated as URLs).
    pub allowed_origins: Vec<String>,
    /// Offset used to interpret naive timestamps coming from the portal backends.
    pub portal_offset: FixedOffset,
    pub access_comparison: AccessComparison,
    pub cache_ttl: Duration,
    pub log_dir: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {}: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "BIND_ADDR", value: v })?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let allowed_origins = parse_origins(
            &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        )?;

        let portal_offset = match env::var("PORTAL_UTC_OFFSET") {
            Ok(v) => parse_utc_offset(&v).ok_or(ConfigError::Invalid { key: "PORTAL_UTC_OFFSET", value: v })?,
            Err(_) => FixedOffset::east_opt(5 * 3600 + 30 * 60).ok_or(ConfigError::Invalid {
                key: "PORTAL_UTC_OFFSET",
                value: "+05:30".to_string(),
            })?,
        };

        let access_comparison = match env::var("ACCESS_COMPARISON") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "ACCESS_COMPARISON", value: v })?,
            Err(_) => AccessComparison::default(),
        };

        let cache_ttl = match env::var("CACHE_TTL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| ConfigError::Invalid { key: "CACHE_TTL_SECS", value: v })?,
            ),
            Err(_) => Duration::from_secs(900),
        };

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            jwt_secret,
            rust_log,
            bind_addr,
            allowed_origins,
            portal_offset,
            access_comparison,
            cache_ttl,
            log_dir,
        })
    }
}

/// Splits a comma separated origin list, rejecting anything that is not an http(s) origin.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let invalid = || ConfigError::Invalid {
                key: "ALLOWED_ORIGINS",
                value: s.to_string(),
            };
            let url = Url::parse(s).map_err(|_| invalid())?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(invalid());
            }
            // Origin headers never carry a path or trailing slash.
            Ok(url.origin().ascii_serialization())
        })
        .collect()
}

/// Parses `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
