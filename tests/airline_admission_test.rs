mod common;

use common::{admit_airlines, test_app};
use flightsurety_core::{ChannelObserver, Event, SuretyError};

#[test]
fn airline_cannot_propose_before_funding() {
    let mut app = test_app(1);
    assert_eq!(
        app.propose_airline(b"airline0", b"airline1"),
        Err(SuretyError::UnauthorizedAirline)
    );
    assert!(!app.is_airline_registered(b"airline1"));
}

#[test]
fn funding_is_recorded() {
    let mut app = test_app(2);
    let fee = app.config().min_funding_fee;

    app.fund_airline(b"airline0", fee).unwrap();
    assert_eq!(app.funding_record(b"airline0"), fee);

    // Below-fee payments are rejected and never recorded
    assert_eq!(
        app.fund_airline(b"airline1", fee - 1),
        Err(SuretyError::InsufficientFunding)
    );
    assert_eq!(app.funding_record(b"airline1"), 0);
}

#[test]
fn first_four_airlines_register_without_votes() {
    let mut app = test_app(3);
    let fee = app.config().min_funding_fee;

    app.fund_airline(b"airline0", fee).unwrap();
    for i in 1..4 {
        let airline = format!("airline{}", i).into_bytes();
        app.propose_airline(b"airline0", &airline).unwrap();
        app.fund_airline(&airline, fee).unwrap();
        assert!(app.is_airline_registered(&airline));
    }
    assert_eq!(app.registered_airlines(), 4);
}

#[test]
fn fifth_airline_needs_votes_and_voting_twice_fails() {
    let mut app = test_app(4);
    admit_airlines(&mut app, 4);
    let fee = app.config().min_funding_fee;

    app.propose_airline(b"airline0", b"airline4").unwrap();
    app.fund_airline(b"airline4", fee).unwrap();
    assert!(!app.is_airline_registered(b"airline4"));

    app.vote_airline(b"airline0", b"airline4", true).unwrap();
    // Voting a second time is rejected, whichever way the ballot goes
    assert_eq!(
        app.vote_airline(b"airline0", b"airline4", false),
        Err(SuretyError::DuplicateVote)
    );

    // The second yes-voter reaches ceil(4 / 2) = 2 and registers the
    // candidate
    app.vote_airline(b"airline1", b"airline4", true).unwrap();
    assert!(app.is_airline_registered(b"airline4"));
    assert_eq!(app.registered_airlines(), 5);
}

#[test]
fn sixth_airline_stays_out_without_majority() {
    let mut app = test_app(5);
    admit_airlines(&mut app, 5);

    app.propose_airline(b"airline1", b"airline5").unwrap();

    // Two yes and one no among five registered airlines; the threshold
    // is ceil(5 / 2) = 3
    app.vote_airline(b"airline0", b"airline5", true).unwrap();
    app.vote_airline(b"airline1", b"airline5", true).unwrap();
    app.vote_airline(b"airline2", b"airline5", false).unwrap();

    assert!(!app.is_airline_registered(b"airline5"));
    assert_eq!(app.registered_airlines(), 5);
}

#[test]
fn registration_events_are_emitted() {
    let mut app = test_app(6);
    let (observer, receiver) = ChannelObserver::channel("admission-watcher");
    app.events().register_observer(observer);

    admit_airlines(&mut app, 5);

    let registrations: Vec<Vec<u8>> = receiver
        .try_iter()
        .filter_map(|event| match event {
            Event::AirlineRegistered { airline } => Some(airline),
            _ => None,
        })
        .collect();
    assert_eq!(registrations.len(), 5);
    assert_eq!(registrations[0], b"airline0".to_vec());
    assert_eq!(registrations[4], b"airline4".to_vec());
}
