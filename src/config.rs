use crate::compile::EventShape;
use crate::domain::Decimal;
use crate::engine::{AccountingParams, DEFAULT_DUST_THRESHOLD};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub events_path: Option<String>,
    pub event_shape: EventShape,
    pub share_decimals: u32,
    pub collateral_decimals: u32,
    pub dust_threshold: Decimal,
    pub metadata_source: MetadataSource,
    pub rollback_to_block: Option<u64>,
    /// Undo history kept behind the cursor; older blocks become final.
    pub history_retention_blocks: Option<u64>,
}

/// Where market outcome lists come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    None,
    File(String),
    Http(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let events_path = env_map
            .get("EVENTS_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let event_shape = match env_map
            .get("EVENT_SHAPE")
            .map(|s| s.as_str())
            .unwrap_or("current")
        {
            "current" => EventShape::Current,
            "legacy" => EventShape::Legacy,
            other => {
                return Err(ConfigError::InvalidValue(
                    "EVENT_SHAPE".to_string(),
                    format!("must be current or legacy, got {}", other),
                ))
            }
        };

        let share_decimals = parse_decimals(&env_map, "SHARE_DECIMALS", "18")?;
        let collateral_decimals = parse_decimals(&env_map, "COLLATERAL_DECIMALS", "6")?;

        let dust_threshold = env_map
            .get("DUST_THRESHOLD")
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_DUST_THRESHOLD)
            .parse::<Decimal>()
            .ok()
            .filter(|d| !d.is_negative())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DUST_THRESHOLD".to_string(),
                    "must be a non-negative decimal".to_string(),
                )
            })?;

        let metadata_source = match (
            env_map.get("MARKET_METADATA_FILE"),
            env_map.get("MARKET_METADATA_URL"),
        ) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "MARKET_METADATA_URL".to_string(),
                    "set only one of MARKET_METADATA_FILE and MARKET_METADATA_URL".to_string(),
                ))
            }
            (Some(path), None) => MetadataSource::File(path.clone()),
            (None, Some(url)) => MetadataSource::Http(url.trim_end_matches('/').to_string()),
            (None, None) => MetadataSource::None,
        };

        let rollback_to_block = parse_block_count(&env_map, "ROLLBACK_TO_BLOCK")?;
        let history_retention_blocks = parse_block_count(&env_map, "HISTORY_RETENTION_BLOCKS")?;

        Ok(Config {
            database_path,
            events_path,
            event_shape,
            share_decimals,
            collateral_decimals,
            dust_threshold,
            metadata_source,
            rollback_to_block,
            history_retention_blocks,
        })
    }

    pub fn accounting_params(&self) -> AccountingParams {
        AccountingParams {
            share_decimals: self.share_decimals,
            collateral_decimals: self.collateral_decimals,
            dust_threshold: self.dust_threshold,
        }
    }
}

fn parse_decimals(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u32, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u32>()
        .ok()
        .filter(|d| *d <= 28)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "must be 0..=28".to_string()))
}

fn parse_block_count(
    env_map: &HashMap<String, String>,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    env_map
        .get(key)
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string()))
        })
        .transpose()
}
