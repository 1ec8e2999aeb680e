pub mod airlines;
pub mod app;
pub mod config;
pub mod errors;
pub mod events;
pub mod flights;
pub mod insurance;
pub mod ledger;
pub mod oracles;
pub mod utils;

// Re-export commonly used items
pub use airlines::{Airline, AirlineRegistry, RegistrationState};
pub use app::{Command, SuretyApp};
pub use config::{SuretyConfig, UNIT};
pub use errors::SuretyError;
pub use events::{ChannelObserver, Event, EventDispatcher, EventObserver};
pub use flights::{flight_key, Flight, FlightKey, FlightRegistry, FlightStatus};
pub use insurance::InsurancePool;
pub use ledger::{CreditWithdrawal, Ledger, LogGateway, PaymentGateway};
pub use oracles::{OracleConsensus, OracleInfo, RequestState, ResponseOutcome, StatusRequest};
