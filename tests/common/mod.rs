#![allow(dead_code)]

use flightsurety_core::{FlightStatus, LogGateway, SuretyApp, SuretyConfig};

/// Fixed departure timestamp shared by the scenarios
pub const TIMESTAMP: u64 = 1_893_452_400;

pub fn test_app(seed: u64) -> SuretyApp {
    SuretyApp::with_seed(SuretyConfig::default(), Box::new(LogGateway), seed)
        .expect("default configuration is valid")
}

/// Admit, fund and (past the bootstrap phase) vote in `count` airlines
/// named airline0..airlineN. airline0 is the founder.
pub fn admit_airlines(app: &mut SuretyApp, count: usize) -> Vec<Vec<u8>> {
    let fee = app.config().min_funding_fee;
    let founder = b"airline0".to_vec();
    app.fund_airline(&founder, fee).unwrap();

    let mut airlines = vec![founder.clone()];
    for i in 1..count {
        let airline = format!("airline{}", i).into_bytes();
        app.propose_airline(&founder, &airline).unwrap();
        app.fund_airline(&airline, fee).unwrap();
        let mut voter = 0;
        while !app.is_airline_registered(&airline) {
            app.vote_airline(&airlines[voter], &airline, true).unwrap();
            voter += 1;
        }
        airlines.push(airline);
    }
    assert_eq!(app.registered_airlines(), count);
    airlines
}

/// Register oracles until `threshold` of them have answered the open
/// request for this flight with `status`, driving it to consensus.
/// Returns the request index.
pub fn reach_consensus(
    app: &mut SuretyApp,
    airline: &[u8],
    flight_code: &str,
    timestamp: u64,
    status: FlightStatus,
) -> u8 {
    let index = app
        .request_flight_status(airline, flight_code, timestamp)
        .unwrap();
    let threshold = app.config().consensus_threshold;
    let fee = app.config().oracle_registration_fee;

    let mut agreed = 0;
    for i in 0..1000 {
        if agreed == threshold {
            break;
        }
        let oracle = format!("oracle{}", i).into_bytes();
        let indexes = app.register_oracle(&oracle, fee).unwrap();
        if indexes.contains(&index) {
            app.submit_oracle_response(&oracle, index, airline, flight_code, timestamp, status)
                .unwrap();
            agreed += 1;
        }
    }
    assert_eq!(agreed, threshold, "not enough eligible oracles drawn");
    index
}
