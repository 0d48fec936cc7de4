//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::game::arena::DEFAULT_BALL_RADIUS;
use crate::game::{FieldSize, PaddleSize, SessionConfig};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Human readable or JSON log lines
    pub log_format: LogFormat,

    /// Playing field dimensions
    pub field: FieldSize,
    pub ball_radius: f32,
    pub paddle_size: PaddleSize,
    /// Vertical impulse applied per MOVE_PADDLE command
    pub paddle_impulse: f32,
    /// Serve speed bound
    pub ball_speed: f32,
    /// Fixed RNG seed (random when unset)
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            field: FieldSize {
                width: 20.0,
                height: 10.0,
            },
            ball_radius: DEFAULT_BALL_RADIUS,
            paddle_size: session.paddle_size,
            paddle_impulse: session.paddle_impulse,
            ball_speed: session.ball_speed,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let config = Self {
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            field: FieldSize {
                width: positive(&lookup, "FIELD_WIDTH", defaults.field.width)?,
                height: positive(&lookup, "FIELD_HEIGHT", defaults.field.height)?,
            },
            ball_radius: positive(&lookup, "BALL_RADIUS", defaults.ball_radius)?,
            paddle_size: PaddleSize {
                width: positive(&lookup, "PADDLE_WIDTH", defaults.paddle_size.width)?,
                height: positive(&lookup, "PADDLE_HEIGHT", defaults.paddle_size.height)?,
            },
            paddle_impulse: positive(&lookup, "PADDLE_IMPULSE", defaults.paddle_impulse)?,
            ball_speed: positive(&lookup, "BALL_SPEED", defaults.ball_speed)?,
            seed: parse_optional(&lookup, "SESSION_SEED")?,
        };

        if config.paddle_size.height >= config.field.height {
            return Err(ConfigError::Invalid("PADDLE_HEIGHT"));
        }
        if config.ball_radius * 2.0 >= config.field.height {
            return Err(ConfigError::Invalid("BALL_RADIUS"));
        }

        Ok(config)
    }

    /// Session tunables derived from this configuration
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            paddle_size: self.paddle_size,
            paddle_impulse: self.paddle_impulse,
            ball_speed: self.ball_speed,
            seed: self.seed,
        }
    }
}

fn parse_optional<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .map(|raw| raw.trim().parse().map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

fn positive<F>(lookup: &F, key: &'static str, default: f32) -> Result<f32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_optional::<F, f32>(lookup, key)? {
        None => Ok(default),
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
