use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use crate::config::ORACLE_INDEX_COUNT;
use crate::errors::SuretyError;
use crate::flights::{FlightKey, FlightStatus};
use crate::utils::current_time;

/// A registered status oracle and its lifetime index assignment
#[derive(Debug, Clone)]
pub struct OracleInfo {
    pub public_key: Vec<u8>,
    // Assigned once at registration, never reassigned
    pub indexes: [u8; ORACLE_INDEX_COUNT],
    pub registered_at: u64,
}

impl OracleInfo {
    pub fn has_index(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Open,
    Resolved,
    Expired,
}

/// An open status lookup, sharded to the oracles whose assignment
/// contains the drawn index
#[derive(Debug)]
pub struct StatusRequest {
    pub index: u8,
    pub flight_key: FlightKey,
    pub opened_at: u64,
    pub state: RequestState,
    // Status code -> oracles that reported it
    pub responses: HashMap<FlightStatus, HashSet<Vec<u8>>>,
    // Every oracle that has responded, for duplicate detection
    pub responders: HashSet<Vec<u8>>,
    pub total_responses: u32,
}

impl StatusRequest {
    fn new(index: u8, flight_key: FlightKey) -> Self {
        StatusRequest {
            index,
            flight_key,
            opened_at: current_time(),
            state: RequestState::Open,
            responses: HashMap::new(),
            responders: HashSet::new(),
            total_responses: 0,
        }
    }

    pub fn response_count(&self, status: FlightStatus) -> usize {
        self.responses.get(&status).map(|s| s.len()).unwrap_or(0)
    }
}

/// What an accepted response did to its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Recorded, no terminal state reached yet
    Accepted,
    /// This response completed the majority; the flight status is final
    ConsensusReached(FlightStatus),
    /// The response bound was hit without a majority
    Expired,
}

/// Index-sharded request/response protocol resolving flight status by
/// majority agreement among independently-registered oracles.
pub struct OracleConsensus {
    oracles: HashMap<Vec<u8>, OracleInfo>,
    requests: HashMap<[u8; 32], StatusRequest>,
    registration_fee: u64,
    collected_fees: u64,
    index_range: u8,
    consensus_threshold: usize,
    max_responses_per_request: u32,
    rng: ChaCha20Rng,
}

impl OracleConsensus {
    pub fn new(
        registration_fee: u64,
        index_range: u8,
        consensus_threshold: usize,
        max_responses_per_request: u32,
    ) -> Self {
        Self::with_rng(
            registration_fee,
            index_range,
            consensus_threshold,
            max_responses_per_request,
            ChaCha20Rng::from_entropy(),
        )
    }

    /// Deterministic variant for tests and reproducible simulations
    pub fn with_seed(
        registration_fee: u64,
        index_range: u8,
        consensus_threshold: usize,
        max_responses_per_request: u32,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            registration_fee,
            index_range,
            consensus_threshold,
            max_responses_per_request,
            ChaCha20Rng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        registration_fee: u64,
        index_range: u8,
        consensus_threshold: usize,
        max_responses_per_request: u32,
        rng: ChaCha20Rng,
    ) -> Self {
        OracleConsensus {
            oracles: HashMap::new(),
            requests: HashMap::new(),
            registration_fee,
            collected_fees: 0,
            index_range,
            consensus_threshold,
            max_responses_per_request,
            rng,
        }
    }

    /// Key identifying a status request: SHA-256 over (index, flight key)
    pub fn request_key(index: u8, flight_key: &FlightKey) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([index]);
        hasher.update(flight_key);
        hasher.finalize().into()
    }

    // Three distinct indexes for one oracle. Collisions across different
    // oracles are expected; they are what lets several oracles answer the
    // same request.
    fn draw_indexes(&mut self) -> [u8; ORACLE_INDEX_COUNT] {
        let mut indexes = [0u8; ORACLE_INDEX_COUNT];
        for slot in 0..ORACLE_INDEX_COUNT {
            let mut candidate = self.rng.gen_range(0..self.index_range);
            while indexes[..slot].contains(&candidate) {
                candidate = self.rng.gen_range(0..self.index_range);
            }
            indexes[slot] = candidate;
        }
        indexes
    }

    /// Register an oracle against its one-time fee and assign its three
    /// indexes. Re-registering returns the existing assignment unchanged
    /// and charges nothing.
    pub fn register_oracle(
        &mut self,
        oracle: &[u8],
        fee: u64,
    ) -> Result<[u8; ORACLE_INDEX_COUNT], SuretyError> {
        if let Some(info) = self.oracles.get(oracle) {
            return Ok(info.indexes);
        }
        if fee < self.registration_fee {
            return Err(SuretyError::InsufficientFunding);
        }

        let indexes = self.draw_indexes();
        self.collected_fees = self.collected_fees.saturating_add(fee);
        self.oracles.insert(
            oracle.to_vec(),
            OracleInfo {
                public_key: oracle.to_vec(),
                indexes,
                registered_at: current_time(),
            },
        );
        info!(
            "oracle {} registered with indexes {:?}",
            hex::encode(oracle),
            indexes
        );
        Ok(indexes)
    }

    /// The caller's lifetime index assignment
    pub fn oracle_indexes(&self, oracle: &[u8]) -> Result<[u8; ORACLE_INDEX_COUNT], SuretyError> {
        self.oracles
            .get(oracle)
            .map(|info| info.indexes)
            .ok_or(SuretyError::UnregisteredOracle)
    }

    /// Open a status request for a flight and return the drawn index that
    /// shards it. An identical request still open is left as-is; a closed
    /// one is reopened fresh so a failed lookup can be retried.
    pub fn open_request(&mut self, flight_key: &FlightKey) -> u8 {
        let index = self.rng.gen_range(0..self.index_range);
        let key = Self::request_key(index, flight_key);

        let still_open = self
            .requests
            .get(&key)
            .map(|request| request.state == RequestState::Open)
            .unwrap_or(false);
        if still_open {
            debug!("request with index {} already open, reusing", index);
        } else {
            self.requests
                .insert(key, StatusRequest::new(index, *flight_key));
            info!("status request opened with index {}", index);
        }
        index
    }

    /// Record one oracle's report for a request. The response is accepted
    /// only from a registered oracle whose assignment contains the
    /// request's index, once per oracle per request, while the request is
    /// still open.
    pub fn submit_response(
        &mut self,
        oracle: &[u8],
        index: u8,
        flight_key: &FlightKey,
        status: FlightStatus,
    ) -> Result<ResponseOutcome, SuretyError> {
        if !status.is_terminal() {
            return Err(SuretyError::InvalidStatusCode);
        }
        let info = self
            .oracles
            .get(oracle)
            .ok_or(SuretyError::UnregisteredOracle)?;
        if !info.has_index(index) {
            return Err(SuretyError::IndexMismatch);
        }

        let key = Self::request_key(index, flight_key);
        let request = self
            .requests
            .get_mut(&key)
            .ok_or(SuretyError::RequestNotFound)?;
        if request.state != RequestState::Open {
            return Err(SuretyError::RequestClosed);
        }
        if !request.responders.insert(oracle.to_vec()) {
            return Err(SuretyError::DuplicateResponse);
        }

        request.total_responses += 1;
        let matching = {
            let reporters = request.responses.entry(status).or_default();
            reporters.insert(oracle.to_vec());
            reporters.len()
        };
        debug!(
            "response {:?} from {} on index {}: {}/{} matching",
            status,
            hex::encode(oracle),
            index,
            matching,
            self.consensus_threshold
        );

        if matching >= self.consensus_threshold {
            request.state = RequestState::Resolved;
            info!(
                "consensus reached on index {}: {:?} ({} matching reports)",
                index, status, matching
            );
            return Ok(ResponseOutcome::ConsensusReached(status));
        }
        if request.total_responses >= self.max_responses_per_request {
            request.state = RequestState::Expired;
            warn!(
                "request on index {} expired after {} responses without a majority",
                index, request.total_responses
            );
            return Ok(ResponseOutcome::Expired);
        }
        Ok(ResponseOutcome::Accepted)
    }

    pub fn request(&self, index: u8, flight_key: &FlightKey) -> Option<&StatusRequest> {
        self.requests.get(&Self::request_key(index, flight_key))
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Registration fees accumulated from oracles
    pub fn collected_fees(&self) -> u64 {
        self.collected_fees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: u64 = 100_000_000;
    const INDEX_RANGE: u8 = 10;
    const THRESHOLD: usize = 3;
    const MAX_RESPONSES: u32 = 10;

    fn consensus(seed: u64) -> OracleConsensus {
        OracleConsensus::with_seed(FEE, INDEX_RANGE, THRESHOLD, MAX_RESPONSES, seed)
    }

    fn test_flight_key() -> FlightKey {
        crate::flights::flight_key(b"airline0", "DL1270", 1_700_000_000)
    }

    // Register oracles until `n` of them are eligible for `index`,
    // returning the eligible identities in registration order
    fn register_eligible(consensus: &mut OracleConsensus, index: u8, n: usize) -> Vec<Vec<u8>> {
        let mut eligible = Vec::new();
        for i in 0..1000 {
            if eligible.len() == n {
                break;
            }
            let oracle = format!("oracle{}", i).into_bytes();
            let indexes = consensus.register_oracle(&oracle, FEE).unwrap();
            if indexes.contains(&index) {
                eligible.push(oracle);
            }
        }
        assert_eq!(eligible.len(), n, "not enough eligible oracles drawn");
        eligible
    }

    #[test]
    fn test_registration_fee_enforced() {
        let mut consensus = consensus(1);
        assert_eq!(
            consensus.register_oracle(b"oracle0", FEE - 1),
            Err(SuretyError::InsufficientFunding)
        );
        assert_eq!(consensus.oracle_count(), 0);

        consensus.register_oracle(b"oracle0", FEE).unwrap();
        assert_eq!(consensus.oracle_count(), 1);
        assert_eq!(consensus.collected_fees(), FEE);
    }

    #[test]
    fn test_assigned_indexes_are_distinct_and_in_range() {
        let mut consensus = consensus(2);
        for i in 0..50 {
            let oracle = format!("oracle{}", i).into_bytes();
            let indexes = consensus.register_oracle(&oracle, FEE).unwrap();
            assert!(indexes.iter().all(|&idx| idx < INDEX_RANGE));
            assert_ne!(indexes[0], indexes[1]);
            assert_ne!(indexes[0], indexes[2]);
            assert_ne!(indexes[1], indexes[2]);
        }
    }

    #[test]
    fn test_reregistration_keeps_assignment_and_charges_nothing() {
        let mut consensus = consensus(3);
        let first = consensus.register_oracle(b"oracle0", FEE).unwrap();
        let second = consensus.register_oracle(b"oracle0", 5 * FEE).unwrap();
        assert_eq!(first, second);
        assert_eq!(consensus.collected_fees(), FEE);
        assert_eq!(consensus.oracle_count(), 1);
    }

    #[test]
    fn test_indexes_query_requires_registration() {
        let consensus = consensus(4);
        assert_eq!(
            consensus.oracle_indexes(b"oracle0"),
            Err(SuretyError::UnregisteredOracle)
        );
    }

    #[test]
    fn test_response_with_foreign_index_is_rejected() {
        let mut consensus = consensus(5);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);

        // Find an oracle whose assignment does not contain the index
        let mut outsider = None;
        for i in 0..1000 {
            let oracle = format!("oracle{}", i).into_bytes();
            let indexes = consensus.register_oracle(&oracle, FEE).unwrap();
            if !indexes.contains(&index) {
                outsider = Some(oracle);
                break;
            }
        }
        let outsider = outsider.expect("no outsider oracle drawn");

        assert_eq!(
            consensus.submit_response(&outsider, index, &flight_key, FlightStatus::OnTime),
            Err(SuretyError::IndexMismatch)
        );
        // The rejection never touches the response book
        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.total_responses, 0);
        assert_eq!(request.response_count(FlightStatus::OnTime), 0);
    }

    #[test]
    fn test_unregistered_oracle_cannot_respond() {
        let mut consensus = consensus(6);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        assert_eq!(
            consensus.submit_response(b"stranger", index, &flight_key, FlightStatus::OnTime),
            Err(SuretyError::UnregisteredOracle)
        );
    }

    #[test]
    fn test_duplicate_response_is_rejected() {
        let mut consensus = consensus(7);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, 1);

        consensus
            .submit_response(&oracles[0], index, &flight_key, FlightStatus::OnTime)
            .unwrap();
        assert_eq!(
            consensus.submit_response(&oracles[0], index, &flight_key, FlightStatus::LateAirline),
            Err(SuretyError::DuplicateResponse)
        );

        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.total_responses, 1);
    }

    #[test]
    fn test_consensus_reached_on_third_matching_report() {
        let mut consensus = consensus(8);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, 4);

        assert_eq!(
            consensus
                .submit_response(&oracles[0], index, &flight_key, FlightStatus::LateAirline)
                .unwrap(),
            ResponseOutcome::Accepted
        );
        assert_eq!(
            consensus
                .submit_response(&oracles[1], index, &flight_key, FlightStatus::LateAirline)
                .unwrap(),
            ResponseOutcome::Accepted
        );
        assert_eq!(
            consensus
                .submit_response(&oracles[2], index, &flight_key, FlightStatus::LateAirline)
                .unwrap(),
            ResponseOutcome::ConsensusReached(FlightStatus::LateAirline)
        );

        // The request is terminal; a fourth report is rejected outright
        assert_eq!(
            consensus.submit_response(&oracles[3], index, &flight_key, FlightStatus::OnTime),
            Err(SuretyError::RequestClosed)
        );
        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.state, RequestState::Resolved);
    }

    #[test]
    fn test_disagreeing_reports_do_not_resolve() {
        let mut consensus = consensus(9);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, 4);

        let reports = [
            FlightStatus::LateAirline,
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
            FlightStatus::LateWeather,
        ];
        for (oracle, status) in oracles.iter().zip(reports) {
            assert_eq!(
                consensus
                    .submit_response(oracle, index, &flight_key, status)
                    .unwrap(),
                ResponseOutcome::Accepted
            );
        }

        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.state, RequestState::Open);
        assert_eq!(request.response_count(FlightStatus::LateAirline), 2);
    }

    #[test]
    fn test_request_expires_at_response_bound() {
        let mut consensus = consensus(10);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, MAX_RESPONSES as usize);

        // Two reports of each status: the bound is reached with no status
        // ever collecting three matching reports
        let statuses = [
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
            FlightStatus::LateWeather,
            FlightStatus::LateTechnical,
            FlightStatus::LateOther,
        ];
        for (i, oracle) in oracles.iter().enumerate() {
            let status = statuses[i % statuses.len()];
            let outcome = consensus
                .submit_response(oracle, index, &flight_key, status)
                .unwrap();
            if i as u32 == MAX_RESPONSES - 1 {
                assert_eq!(outcome, ResponseOutcome::Expired);
            } else {
                assert_eq!(outcome, ResponseOutcome::Accepted);
            }
        }
        assert_eq!(
            consensus.request(index, &flight_key).unwrap().state,
            RequestState::Expired
        );
    }

    #[test]
    fn test_expired_request_can_be_reopened() {
        let mut consensus = consensus(11);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, MAX_RESPONSES as usize);

        let statuses = [
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
            FlightStatus::LateWeather,
            FlightStatus::LateTechnical,
            FlightStatus::LateOther,
        ];
        for (i, oracle) in oracles.iter().enumerate() {
            consensus
                .submit_response(oracle, index, &flight_key, statuses[i % statuses.len()])
                .unwrap();
        }
        assert_eq!(
            consensus.request(index, &flight_key).unwrap().state,
            RequestState::Expired
        );

        // Draw requests until the expired index comes up again; the entry
        // must be replaced by a fresh open request
        for _ in 0..10_000 {
            if consensus.open_request(&flight_key) == index {
                break;
            }
        }
        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.state, RequestState::Open);
        assert_eq!(request.total_responses, 0);

        // Earlier responders may answer the fresh request
        assert_eq!(
            consensus
                .submit_response(&oracles[0], index, &flight_key, FlightStatus::LateAirline)
                .unwrap(),
            ResponseOutcome::Accepted
        );
    }

    #[test]
    fn test_open_request_reuses_open_entry() {
        let mut consensus = consensus(12);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, 1);
        consensus
            .submit_response(&oracles[0], index, &flight_key, FlightStatus::OnTime)
            .unwrap();

        // Re-draw until the same index comes up; the open request and its
        // recorded response must survive
        for _ in 0..10_000 {
            if consensus.open_request(&flight_key) == index {
                break;
            }
        }
        let request = consensus.request(index, &flight_key).unwrap();
        assert_eq!(request.total_responses, 1);
    }

    #[test]
    fn test_unknown_status_report_is_rejected() {
        let mut consensus = consensus(13);
        let flight_key = test_flight_key();
        let index = consensus.open_request(&flight_key);
        let oracles = register_eligible(&mut consensus, index, 1);
        assert_eq!(
            consensus.submit_response(&oracles[0], index, &flight_key, FlightStatus::Unknown),
            Err(SuretyError::InvalidStatusCode)
        );
    }
}
