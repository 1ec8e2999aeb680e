use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::SuretyError;

/// Base units per payment token. All balances, fees and premiums are
/// integer base units; fractional token amounts never appear in state.
pub const UNIT: u64 = 100_000_000;

// Airline admission constants
pub const MIN_FUNDING_FEE: u64 = 10 * UNIT; // Participation fee an airline must escrow
pub const BOOTSTRAP_AIRLINE_COUNT: usize = 4; // Below this, admission needs no votes

// Insurance constants
pub const MAX_PREMIUM: u64 = UNIT; // Cap on a single purchase, bounds insurer exposure
pub const PAYOUT_NUMERATOR: u64 = 3; // 1.5x payout for airline-caused delay
pub const PAYOUT_DENOMINATOR: u64 = 2;

// Oracle protocol constants
pub const ORACLE_REGISTRATION_FEE: u64 = UNIT; // One-time bond paid at registration
pub const ORACLE_INDEX_COUNT: usize = 3; // Indexes assigned to each oracle
pub const ORACLE_INDEX_RANGE: u8 = 10; // Indexes are drawn from 0..10
pub const CONSENSUS_THRESHOLD: usize = 3; // Matching reports needed to finalize a status
pub const MAX_RESPONSES_PER_REQUEST: u32 = 10; // Response bound before a request expires

/// Protocol parameters. `Default` carries the protocol constants; `load`
/// layers a TOML file and `SURETY_`-prefixed environment variables on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    pub min_funding_fee: u64,
    pub bootstrap_airline_count: usize,
    pub max_premium: u64,
    pub payout_numerator: u64,
    pub payout_denominator: u64,
    pub oracle_registration_fee: u64,
    pub oracle_index_range: u8,
    pub consensus_threshold: usize,
    pub max_responses_per_request: u32,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        SuretyConfig {
            min_funding_fee: MIN_FUNDING_FEE,
            bootstrap_airline_count: BOOTSTRAP_AIRLINE_COUNT,
            max_premium: MAX_PREMIUM,
            payout_numerator: PAYOUT_NUMERATOR,
            payout_denominator: PAYOUT_DENOMINATOR,
            oracle_registration_fee: ORACLE_REGISTRATION_FEE,
            oracle_index_range: ORACLE_INDEX_RANGE,
            consensus_threshold: CONSENSUS_THRESHOLD,
            max_responses_per_request: MAX_RESPONSES_PER_REQUEST,
        }
    }
}

impl SuretyConfig {
    /// Load parameters from an optional TOML file, then apply
    /// `SURETY_`-prefixed environment overrides. Missing keys keep their
    /// protocol defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SuretyError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("SURETY").try_parsing(true))
            .build()
            .map_err(|e| SuretyError::Config(e.to_string()))?;

        let cfg: SuretyConfig = settings
            .try_deserialize()
            .map_err(|e| SuretyError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject parameter combinations the protocol cannot run with.
    pub fn validate(&self) -> Result<(), SuretyError> {
        if self.min_funding_fee == 0 {
            return Err(SuretyError::Config(
                "min_funding_fee must be positive".to_string(),
            ));
        }
        if self.max_premium == 0 {
            return Err(SuretyError::Config(
                "max_premium must be positive".to_string(),
            ));
        }
        if self.payout_denominator == 0 {
            return Err(SuretyError::Config(
                "payout_denominator must be positive".to_string(),
            ));
        }
        if self.oracle_index_range == 0 {
            return Err(SuretyError::Config(
                "oracle_index_range must be positive".to_string(),
            ));
        }
        if self.consensus_threshold == 0 {
            return Err(SuretyError::Config(
                "consensus_threshold must be positive".to_string(),
            ));
        }
        if (self.max_responses_per_request as usize) < self.consensus_threshold {
            return Err(SuretyError::Config(
                "max_responses_per_request must allow the consensus threshold to be reached"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
