use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::errors::SuretyError;
use crate::utils::current_time;

/// Admission state of an airline. Airlines without any record are
/// implicitly unregistered; a record in `Unregistered` state only tracks
/// funding paid ahead of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    PendingVote,
    Registered,
}

/// Airline participation record
#[derive(Debug, Clone)]
pub struct Airline {
    pub public_key: Vec<u8>,
    pub state: RegistrationState,
    // Monotonically non-decreasing once funded
    pub funding_balance: u64,
    // Fixed at proposal time: false for bootstrap-phase candidates
    pub requires_votes: bool,
    // Every voter that has cast a ballot, yes or no
    pub votes_received: HashSet<Vec<u8>>,
    // Running yes-count, kept so votes never need re-scanning
    pub yes_votes: usize,
    pub proposed_at: u64,
    pub registered_at: Option<u64>,
}

impl Airline {
    fn new(public_key: Vec<u8>) -> Self {
        Airline {
            public_key,
            state: RegistrationState::Unregistered,
            funding_balance: 0,
            requires_votes: true,
            votes_received: HashSet::new(),
            yes_votes: 0,
            proposed_at: 0,
            registered_at: None,
        }
    }
}

/// Admission-control state machine for airlines: funding plus a
/// multiparty vote threshold once the bootstrap phase is over.
pub struct AirlineRegistry {
    airlines: HashMap<Vec<u8>, Airline>,
    registered_count: usize,
    min_funding_fee: u64,
    bootstrap_airline_count: usize,
}

impl AirlineRegistry {
    pub fn new(min_funding_fee: u64, bootstrap_airline_count: usize) -> Self {
        AirlineRegistry {
            airlines: HashMap::new(),
            registered_count: 0,
            min_funding_fee,
            bootstrap_airline_count,
        }
    }

    /// Record a funding payment. Every payment must meet the minimum fee.
    /// The first funder becomes the founder and is registered outright; a
    /// bootstrap-admitted candidate is promoted by its funding. Returns
    /// whether the airline became registered by this call.
    pub fn fund(&mut self, airline: &[u8], amount: u64) -> Result<bool, SuretyError> {
        if amount < self.min_funding_fee {
            return Err(SuretyError::InsufficientFunding);
        }

        let founder = self.registered_count == 0;
        let record = self
            .airlines
            .entry(airline.to_vec())
            .or_insert_with(|| Airline::new(airline.to_vec()));
        record.funding_balance = record.funding_balance.saturating_add(amount);
        debug!(
            "airline {} funded, balance now {}",
            hex::encode(airline),
            record.funding_balance
        );

        let promote = founder
            || (record.state == RegistrationState::PendingVote && !record.requires_votes);
        if promote && record.state != RegistrationState::Registered {
            record.state = RegistrationState::Registered;
            record.registered_at = Some(current_time());
            self.registered_count += 1;
            info!("airline {} registered", hex::encode(airline));
            return Ok(true);
        }
        Ok(false)
    }

    /// Propose a candidate airline. Below the bootstrap count the
    /// candidate is admitted without votes and only awaits funding; at or
    /// above it the candidate awaits multiparty consensus. Returns whether
    /// the candidate became registered by this call (possible when a
    /// bootstrap candidate had already paid its fee).
    pub fn propose(&mut self, proposer: &[u8], candidate: &[u8]) -> Result<bool, SuretyError> {
        if !self.is_participant(proposer) {
            return Err(SuretyError::UnauthorizedAirline);
        }
        if let Some(record) = self.airlines.get(candidate) {
            if record.state != RegistrationState::Unregistered {
                return Err(SuretyError::DuplicateAirline);
            }
        }

        let bootstrap = self.registered_count < self.bootstrap_airline_count;
        let funded = {
            let record = self
                .airlines
                .entry(candidate.to_vec())
                .or_insert_with(|| Airline::new(candidate.to_vec()));
            record.state = RegistrationState::PendingVote;
            record.requires_votes = !bootstrap;
            record.proposed_at = current_time();
            record.funding_balance >= self.min_funding_fee
        };
        debug!(
            "airline {} proposed ({})",
            hex::encode(candidate),
            if bootstrap { "bootstrap" } else { "vote required" }
        );

        if bootstrap && funded {
            // The candidate paid its fee ahead of the proposal
            self.register(candidate);
            return Ok(true);
        }
        Ok(false)
    }

    /// Cast a ballot for a pending candidate. Each voter may appear once;
    /// the first ballot's effect is preserved on a duplicate. Yes-ballots
    /// count toward a simple majority of the airlines registered at the
    /// moment of the vote. Returns whether the candidate became
    /// registered by this call.
    pub fn vote(
        &mut self,
        voter: &[u8],
        candidate: &[u8],
        approve: bool,
    ) -> Result<bool, SuretyError> {
        if !self.is_participant(voter) {
            return Err(SuretyError::UnauthorizedAirline);
        }

        // Threshold is re-evaluated against the current registered count,
        // not fixed when voting opened
        let threshold = (self.registered_count + 1) / 2;

        let record = self
            .airlines
            .get_mut(candidate)
            .ok_or(SuretyError::UnknownAirline)?;
        if record.state != RegistrationState::PendingVote {
            return Err(SuretyError::AirlineNotPending);
        }
        if record.votes_received.contains(voter) {
            return Err(SuretyError::DuplicateVote);
        }

        record.votes_received.insert(voter.to_vec());
        if approve {
            record.yes_votes += 1;
        }
        debug!(
            "vote on {}: approve={}, yes={}/{}",
            hex::encode(candidate),
            approve,
            record.yes_votes,
            threshold
        );

        if approve && record.yes_votes >= threshold {
            self.register(candidate);
            return Ok(true);
        }
        Ok(false)
    }

    // Promote a known candidate to Registered
    fn register(&mut self, airline: &[u8]) {
        if let Some(record) = self.airlines.get_mut(airline) {
            if record.state != RegistrationState::Registered {
                record.state = RegistrationState::Registered;
                record.registered_at = Some(current_time());
                self.registered_count += 1;
                info!("airline {} registered", hex::encode(airline));
            }
        }
    }

    pub fn is_registered(&self, airline: &[u8]) -> bool {
        self.airlines
            .get(airline)
            .map(|a| a.state == RegistrationState::Registered)
            .unwrap_or(false)
    }

    pub fn is_funded(&self, airline: &[u8]) -> bool {
        self.airlines
            .get(airline)
            .map(|a| a.funding_balance >= self.min_funding_fee)
            .unwrap_or(false)
    }

    /// Registered and funded: allowed to propose, vote and register flights
    pub fn is_participant(&self, airline: &[u8]) -> bool {
        self.is_registered(airline) && self.is_funded(airline)
    }

    pub fn registered_count(&self) -> usize {
        self.registered_count
    }

    /// Total funding paid in by an airline, zero when unknown
    pub fn funding_record(&self, airline: &[u8]) -> u64 {
        self.airlines
            .get(airline)
            .map(|a| a.funding_balance)
            .unwrap_or(0)
    }

    pub fn get(&self, airline: &[u8]) -> Option<&Airline> {
        self.airlines.get(airline)
    }
}
