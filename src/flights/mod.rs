use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::airlines::AirlineRegistry;
use crate::errors::SuretyError;
use crate::utils::current_time;

/// Key identifying a flight: SHA-256 over (airline, flight code,
/// departure timestamp)
pub type FlightKey = [u8; 32];

/// Resolved status of a flight. The numeric codes are the wire values
/// oracles report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    pub fn as_code(self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<FlightStatus> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }

    /// A status an oracle may report; `Unknown` is only ever the initial
    /// state
    pub fn is_terminal(self) -> bool {
        self != FlightStatus::Unknown
    }
}

/// Compute the flight key for (airline, flight code, timestamp)
pub fn flight_key(airline: &[u8], flight_code: &str, timestamp: u64) -> FlightKey {
    let mut hasher = Sha256::new();
    hasher.update(airline);
    hasher.update(flight_code.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.finalize().into()
}

/// A registered flight and its insurance book
#[derive(Debug, Clone)]
pub struct Flight {
    pub airline: Vec<u8>,
    pub flight_code: String,
    pub timestamp: u64,
    pub status: FlightStatus,
    pub total_premium: u64,
    // Insurees in purchase order; repeat purchases do not re-append
    pub insurees: Vec<Vec<u8>>,
    pub premiums: HashMap<Vec<u8>, u64>,
    // Set once payouts for the resolved status have been processed
    pub settled: bool,
    pub registered_at: u64,
}

impl Flight {
    pub fn premium_total(&self) -> u64 {
        self.total_premium
    }

    /// Insurees in the order their first purchase was accepted
    pub fn insuree_list(&self) -> &[Vec<u8>] {
        &self.insurees
    }

    /// Sum of all premiums a single insuree has paid, zero when unknown
    pub fn insuree_amount(&self, insuree: &[u8]) -> u64 {
        self.premiums.get(insuree).copied().unwrap_or(0)
    }
}

/// Catalog of flights keyed by (airline, flight code, timestamp)
pub struct FlightRegistry {
    flights: HashMap<FlightKey, Flight>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        FlightRegistry {
            flights: HashMap::new(),
        }
    }

    /// Register a flight for an airline. The airline must be registered
    /// and funded at creation time; registry state is read by reference,
    /// never copied.
    pub fn register(
        &mut self,
        airlines: &AirlineRegistry,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<FlightKey, SuretyError> {
        if !airlines.is_participant(airline) {
            return Err(SuretyError::UnauthorizedAirline);
        }

        let key = flight_key(airline, flight_code, timestamp);
        if self.flights.contains_key(&key) {
            return Err(SuretyError::DuplicateFlight);
        }

        self.flights.insert(
            key,
            Flight {
                airline: airline.to_vec(),
                flight_code: flight_code.to_string(),
                timestamp,
                status: FlightStatus::Unknown,
                total_premium: 0,
                insurees: Vec::new(),
                premiums: HashMap::new(),
                settled: false,
                registered_at: current_time(),
            },
        );
        info!(
            "flight {} at {} registered by {}",
            flight_code,
            timestamp,
            hex::encode(airline)
        );
        Ok(key)
    }

    pub fn get(&self, key: &FlightKey) -> Result<&Flight, SuretyError> {
        self.flights.get(key).ok_or(SuretyError::FlightNotFound)
    }

    pub fn get_mut(&mut self, key: &FlightKey) -> Result<&mut Flight, SuretyError> {
        self.flights.get_mut(key).ok_or(SuretyError::FlightNotFound)
    }

    pub fn status(&self, key: &FlightKey) -> Result<FlightStatus, SuretyError> {
        Ok(self.get(key)?.status)
    }

    /// Write the terminal status a consensus round produced. The status
    /// transitions at most once; a flight already resolved is left
    /// untouched and `false` is returned.
    pub fn resolve(&mut self, key: &FlightKey, status: FlightStatus) -> Result<bool, SuretyError> {
        if !status.is_terminal() {
            return Err(SuretyError::InvalidStatusCode);
        }
        let flight = self.get_mut(key)?;
        if flight.status != FlightStatus::Unknown {
            debug!(
                "flight {} already resolved to {:?}, ignoring {:?}",
                flight.flight_code, flight.status, status
            );
            return Ok(false);
        }
        flight.status = status;
        info!(
            "flight {} at {} resolved to {:?}",
            flight.flight_code, flight.timestamp, status
        );
        Ok(true)
    }

    pub fn flight_count(&self) -> usize {
        self.flights.len()
    }
}

impl Default for FlightRegistry {
    fn default() -> Self {
        FlightRegistry::new()
    }
}
