use log::warn;
use serde::Serialize;

use crate::airlines::AirlineRegistry;
use crate::config::{ORACLE_INDEX_COUNT, SuretyConfig};
use crate::errors::SuretyError;
use crate::events::{Event, EventDispatcher};
use crate::flights::{flight_key, FlightKey, FlightRegistry, FlightStatus};
use crate::insurance::InsurancePool;
use crate::ledger::{CreditWithdrawal, Ledger, PaymentGateway};
use crate::oracles::{OracleConsensus, ResponseOutcome};

/// An accepted state mutation. The command log holds every accepted
/// command in application order; rejected commands never appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    FundAirline {
        airline: Vec<u8>,
        amount: u64,
    },
    ProposeAirline {
        proposer: Vec<u8>,
        candidate: Vec<u8>,
    },
    VoteAirline {
        voter: Vec<u8>,
        candidate: Vec<u8>,
        approve: bool,
    },
    RegisterFlight {
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
    },
    PurchaseInsurance {
        insuree: Vec<u8>,
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
        premium: u64,
    },
    RegisterOracle {
        oracle: Vec<u8>,
        fee: u64,
    },
    OpenStatusRequest {
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
        index: u8,
    },
    SubmitOracleResponse {
        oracle: Vec<u8>,
        index: u8,
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
        status: FlightStatus,
    },
    WithdrawCredit {
        account: Vec<u8>,
        amount: u64,
    },
}

/// Coordinating facade over every store. Each operation validates and
/// applies one command atomically: methods take `&mut self`, so callers
/// sharing the app serialize through a single arbitration lock, and
/// cross-store preconditions are checked in the same step as the
/// mutation they gate.
pub struct SuretyApp {
    config: SuretyConfig,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    insurance: InsurancePool,
    oracles: OracleConsensus,
    ledger: Ledger,
    withdrawal: CreditWithdrawal,
    events: EventDispatcher,
    command_log: Vec<Command>,
}

impl SuretyApp {
    pub fn new(config: SuretyConfig, gateway: Box<dyn PaymentGateway>) -> Result<Self, SuretyError> {
        config.validate()?;
        let oracles = OracleConsensus::new(
            config.oracle_registration_fee,
            config.oracle_index_range,
            config.consensus_threshold,
            config.max_responses_per_request,
        );
        Ok(Self::assemble(config, gateway, oracles))
    }

    /// Deterministic variant: oracle index draws replay identically for a
    /// given seed
    pub fn with_seed(
        config: SuretyConfig,
        gateway: Box<dyn PaymentGateway>,
        seed: u64,
    ) -> Result<Self, SuretyError> {
        config.validate()?;
        let oracles = OracleConsensus::with_seed(
            config.oracle_registration_fee,
            config.oracle_index_range,
            config.consensus_threshold,
            config.max_responses_per_request,
            seed,
        );
        Ok(Self::assemble(config, gateway, oracles))
    }

    fn assemble(
        config: SuretyConfig,
        gateway: Box<dyn PaymentGateway>,
        oracles: OracleConsensus,
    ) -> Self {
        let airlines = AirlineRegistry::new(config.min_funding_fee, config.bootstrap_airline_count);
        let insurance = InsurancePool::new(
            config.max_premium,
            config.payout_numerator,
            config.payout_denominator,
        );
        SuretyApp {
            config,
            airlines,
            flights: FlightRegistry::new(),
            insurance,
            oracles,
            ledger: Ledger::new(),
            withdrawal: CreditWithdrawal::new(gateway),
            events: EventDispatcher::new(),
            command_log: Vec::new(),
        }
    }

    /// Observer registry for collaborator-facing events
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    /// Accepted commands in application order
    pub fn command_log(&self) -> &[Command] {
        &self.command_log
    }

    pub fn fund_airline(&mut self, airline: &[u8], amount: u64) -> Result<(), SuretyError> {
        let registered = self.airlines.fund(airline, amount)?;
        self.command_log.push(Command::FundAirline {
            airline: airline.to_vec(),
            amount,
        });
        if registered {
            self.events.notify(&Event::AirlineRegistered {
                airline: airline.to_vec(),
            });
        }
        Ok(())
    }

    pub fn propose_airline(&mut self, proposer: &[u8], candidate: &[u8]) -> Result<(), SuretyError> {
        let registered = self.airlines.propose(proposer, candidate)?;
        self.command_log.push(Command::ProposeAirline {
            proposer: proposer.to_vec(),
            candidate: candidate.to_vec(),
        });
        if registered {
            self.events.notify(&Event::AirlineRegistered {
                airline: candidate.to_vec(),
            });
        }
        Ok(())
    }

    pub fn vote_airline(
        &mut self,
        voter: &[u8],
        candidate: &[u8],
        approve: bool,
    ) -> Result<(), SuretyError> {
        let registered = self.airlines.vote(voter, candidate, approve)?;
        self.command_log.push(Command::VoteAirline {
            voter: voter.to_vec(),
            candidate: candidate.to_vec(),
            approve,
        });
        if registered {
            self.events.notify(&Event::AirlineRegistered {
                airline: candidate.to_vec(),
            });
        }
        Ok(())
    }

    pub fn register_flight(
        &mut self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<FlightKey, SuretyError> {
        let key = self
            .flights
            .register(&self.airlines, airline, flight_code, timestamp)?;
        self.command_log.push(Command::RegisterFlight {
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
        });
        self.events.notify(&Event::FlightRegistered {
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
        });
        Ok(key)
    }

    pub fn purchase_insurance(
        &mut self,
        insuree: &[u8],
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
        premium: u64,
    ) -> Result<(), SuretyError> {
        let key = flight_key(airline, flight_code, timestamp);
        let flight = self.flights.get_mut(&key)?;
        self.insurance.purchase(flight, insuree, premium)?;
        self.command_log.push(Command::PurchaseInsurance {
            insuree: insuree.to_vec(),
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
            premium,
        });
        Ok(())
    }

    pub fn register_oracle(
        &mut self,
        oracle: &[u8],
        fee: u64,
    ) -> Result<[u8; ORACLE_INDEX_COUNT], SuretyError> {
        let known = self.oracles.oracle_indexes(oracle).is_ok();
        let indexes = self.oracles.register_oracle(oracle, fee)?;
        if !known {
            self.command_log.push(Command::RegisterOracle {
                oracle: oracle.to_vec(),
                fee,
            });
        }
        Ok(indexes)
    }

    pub fn oracle_indexes(
        &self,
        oracle: &[u8],
    ) -> Result<[u8; ORACLE_INDEX_COUNT], SuretyError> {
        self.oracles.oracle_indexes(oracle)
    }

    /// Open a consensus round for a registered flight and return the
    /// index that shards it
    pub fn request_flight_status(
        &mut self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<u8, SuretyError> {
        let key = flight_key(airline, flight_code, timestamp);
        self.flights.get(&key)?;
        let index = self.oracles.open_request(&key);
        self.command_log.push(Command::OpenStatusRequest {
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
            index,
        });
        self.events.notify(&Event::StatusRequestOpened {
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
            index,
        });
        Ok(index)
    }

    /// Record one oracle report. When the report completes the majority,
    /// the flight status is written (once), payouts are settled and the
    /// corresponding events fire, all within this call.
    pub fn submit_oracle_response(
        &mut self,
        oracle: &[u8],
        index: u8,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
        status: FlightStatus,
    ) -> Result<ResponseOutcome, SuretyError> {
        let key = flight_key(airline, flight_code, timestamp);
        self.flights.get(&key)?;

        let outcome = self.oracles.submit_response(oracle, index, &key, status)?;
        self.command_log.push(Command::SubmitOracleResponse {
            oracle: oracle.to_vec(),
            index,
            airline: airline.to_vec(),
            flight_code: flight_code.to_string(),
            timestamp,
            status,
        });

        match outcome {
            ResponseOutcome::ConsensusReached(resolved) => {
                if self.flights.resolve(&key, resolved)? {
                    self.events.notify(&Event::FlightStatusResolved {
                        airline: airline.to_vec(),
                        flight_code: flight_code.to_string(),
                        timestamp,
                        status: resolved,
                    });
                    let flight = self.flights.get_mut(&key)?;
                    let credited = self.insurance.settle(flight, &mut self.ledger);
                    for (passenger, amount) in credited {
                        self.events
                            .notify(&Event::PassengerCredited { passenger, amount });
                    }
                }
            }
            ResponseOutcome::Expired => {
                warn!(
                    "status request for flight {} at {} expired without a majority",
                    flight_code, timestamp
                );
            }
            ResponseOutcome::Accepted => {}
        }
        Ok(outcome)
    }

    pub fn withdraw_credit(&mut self, account: &[u8], amount: u64) -> Result<(), SuretyError> {
        self.withdrawal.withdraw(&mut self.ledger, account, amount)?;
        self.command_log.push(Command::WithdrawCredit {
            account: account.to_vec(),
            amount,
        });
        Ok(())
    }

    // Read-only queries

    pub fn is_airline_registered(&self, airline: &[u8]) -> bool {
        self.airlines.is_registered(airline)
    }

    pub fn registered_airlines(&self) -> usize {
        self.airlines.registered_count()
    }

    pub fn funding_record(&self, airline: &[u8]) -> u64 {
        self.airlines.funding_record(airline)
    }

    pub fn flight_status(
        &self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<FlightStatus, SuretyError> {
        self.flights
            .status(&flight_key(airline, flight_code, timestamp))
    }

    pub fn premium_total(
        &self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<u64, SuretyError> {
        Ok(self
            .flights
            .get(&flight_key(airline, flight_code, timestamp))?
            .premium_total())
    }

    pub fn insuree_list(
        &self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
    ) -> Result<Vec<Vec<u8>>, SuretyError> {
        Ok(self
            .flights
            .get(&flight_key(airline, flight_code, timestamp))?
            .insuree_list()
            .to_vec())
    }

    pub fn insuree_amount(
        &self,
        airline: &[u8],
        flight_code: &str,
        timestamp: u64,
        insuree: &[u8],
    ) -> Result<u64, SuretyError> {
        Ok(self
            .flights
            .get(&flight_key(airline, flight_code, timestamp))?
            .insuree_amount(insuree))
    }

    pub fn account_credit(&self, account: &[u8]) -> u64 {
        self.ledger.balance(account)
    }
}
