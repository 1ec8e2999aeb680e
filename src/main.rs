use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::DateTime;
use clap::Parser;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use flightsurety_core::{
    ChannelObserver, Event, FlightStatus, LogGateway, SuretyApp, SuretyConfig,
};

// Flight schedule the simulation registers, one departure per code
const FLIGHT_CODES: [&str; 6] = ["NY9200", "CA8300", "SF7100", "BA0900", "SA1200", "TN2300"];

// Statuses an oracle may report
const REPORTABLE_STATUSES: [FlightStatus; 5] = [
    FlightStatus::OnTime,
    FlightStatus::LateAirline,
    FlightStatus::LateWeather,
    FlightStatus::LateTechnical,
    FlightStatus::LateOther,
];

#[derive(Parser)]
#[command(
    name = "flightsurety",
    about = "Flight-delay insurance node: airline admission, premium intake and oracle consensus"
)]
struct Args {
    /// Path to a TOML parameter file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the active parameters as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Airlines to admit and fund
    #[arg(long, default_value_t = 4)]
    airlines: usize,

    /// Oracles to register
    #[arg(long, default_value_t = 25)]
    oracles: usize,

    /// Passengers buying insurance on every flight
    #[arg(long, default_value_t = 2)]
    passengers: usize,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the accepted command log as JSON before exiting
    #[arg(long)]
    dump_log: bool,
}

// Admit, fund and (past the bootstrap phase) vote in `count` airlines
fn init_airlines(app: &mut SuretyApp, count: usize) -> Vec<Vec<u8>> {
    info!("Registering {} airlines...", count);
    let fee = app.config().min_funding_fee;
    let mut airlines = Vec::with_capacity(count);

    let founder = b"airline0".to_vec();
    app.fund_airline(&founder, fee).expect("founder funding");
    airlines.push(founder.clone());

    for i in 1..count {
        let airline = format!("airline{}", i).into_bytes();
        app.propose_airline(&founder, &airline)
            .expect("airline proposal");
        app.fund_airline(&airline, fee).expect("airline funding");

        // Consensus-phase candidates need a majority of yes-votes
        let mut voter = 0;
        while !app.is_airline_registered(&airline) {
            app.vote_airline(&airlines[voter], &airline, true)
                .expect("airline vote");
            voter += 1;
        }
        airlines.push(airline);
    }
    airlines
}

// Register oracles and remember their index assignments
fn init_oracles(app: &mut SuretyApp, count: usize) -> Vec<(Vec<u8>, [u8; 3])> {
    info!("Registering {} oracles...", count);
    let fee = app.config().oracle_registration_fee;
    let mut oracles = Vec::with_capacity(count);
    for i in 0..count {
        let oracle = format!("oracle{}", i).into_bytes();
        let indexes = app.register_oracle(&oracle, fee).expect("oracle registration");
        debug!("Oracle {} registered with indexes {:?}", i, indexes);
        oracles.push((oracle, indexes));
    }
    oracles
}

// Register the flight schedule with randomized departures
fn init_flights(
    app: &mut SuretyApp,
    airlines: &[Vec<u8>],
    rng: &mut ChaCha20Rng,
) -> Vec<(Vec<u8>, String, u64)> {
    info!("Registering {} flights...", FLIGHT_CODES.len());
    let mut flights = Vec::with_capacity(FLIGHT_CODES.len());
    for (i, code) in FLIGHT_CODES.iter().enumerate() {
        let airline = airlines[i % airlines.len()].clone();
        let departure = flightsurety_core::utils::departure_in(rng.gen_range(600..7200));
        app.register_flight(&airline, code, departure)
            .expect("flight registration");
        let when = DateTime::from_timestamp(departure as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| departure.to_string());
        info!("Flight {} departs {}", code, when);
        flights.push((airline, code.to_string(), departure));
    }
    flights
}

// Every passenger buys a random premium on every flight
fn init_purchases(
    app: &mut SuretyApp,
    flights: &[(Vec<u8>, String, u64)],
    passengers: usize,
    rng: &mut ChaCha20Rng,
) {
    let max_premium = app.config().max_premium;
    for p in 0..passengers {
        let passenger = format!("passenger{}", p).into_bytes();
        for (airline, code, departure) in flights {
            let premium = rng.gen_range(1..=max_premium);
            app.purchase_insurance(&passenger, airline, code, *departure, premium)
                .expect("insurance purchase");
        }
    }
    info!(
        "{} passengers insured on {} flights",
        passengers,
        flights.len()
    );
}

// Answer status requests: draw one status per request and have every
// eligible oracle report it
fn spawn_oracle_responders(
    app: Arc<Mutex<SuretyApp>>,
    oracles: Vec<(Vec<u8>, [u8; 3])>,
    receiver: Receiver<Event>,
    running: Arc<AtomicBool>,
    seed: u64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        while running.load(Ordering::SeqCst) {
            let event = match receiver.recv_timeout(Duration::from_millis(200)) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let Event::StatusRequestOpened {
                airline,
                flight_code,
                timestamp,
                index,
            } = event
            else {
                continue;
            };

            let status = REPORTABLE_STATUSES[rng.gen_range(0..REPORTABLE_STATUSES.len())];
            info!(
                "Request for flight {} with index {}, oracles reporting {:?}",
                flight_code, index, status
            );
            for (oracle, indexes) in &oracles {
                if !indexes.contains(&index) {
                    continue;
                }
                let mut app = app.lock();
                match app.submit_oracle_response(
                    oracle,
                    index,
                    &airline,
                    &flight_code,
                    timestamp,
                    status,
                ) {
                    Ok(outcome) => {
                        debug!("Oracle response accepted: {:?}", outcome)
                    }
                    Err(err) => debug!("Oracle response rejected: {}", err),
                }
            }
        }
    })
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match SuretyConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };
    if args.dump_config {
        println!(
            "{}",
            toml::to_string_pretty(&config).expect("config serialization")
        );
        return;
    }

    let seed = args.seed.unwrap_or_else(flightsurety_core::utils::current_time);
    info!("Starting simulation with seed {}", seed);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    let mut app = SuretyApp::with_seed(config, Box::new(LogGateway), seed)
        .expect("app initialization");
    let (observer, receiver) = ChannelObserver::channel("oracle-daemon");
    app.events().register_observer(observer);

    let airlines = init_airlines(&mut app, args.airlines);
    let oracles = init_oracles(&mut app, args.oracles);
    let flights = init_flights(&mut app, &airlines, &mut rng);
    init_purchases(&mut app, &flights, args.passengers, &mut rng);

    let app = Arc::new(Mutex::new(app));
    let running = Arc::new(AtomicBool::new(true));
    let responders = spawn_oracle_responders(
        app.clone(),
        oracles,
        receiver,
        running.clone(),
        seed.wrapping_add(1),
    );

    // Open a consensus round per flight
    for (airline, code, departure) in &flights {
        app.lock()
            .request_flight_status(airline, code, *departure)
            .expect("status request");
    }

    // Wait for the responder thread to drive the rounds to resolution.
    // Requests sharded to fewer than three eligible oracles stay open.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        thread::sleep(Duration::from_millis(100));
        let app = app.lock();
        let resolved = flights
            .iter()
            .filter(|(airline, code, departure)| {
                app.flight_status(airline, code, *departure)
                    .map(|s| s != FlightStatus::Unknown)
                    .unwrap_or(false)
            })
            .count();
        if resolved == flights.len() || Instant::now() >= deadline {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    let _ = responders.join();

    let mut app = app.lock();
    println!("--- Flight statuses ---");
    for (airline, code, departure) in &flights {
        let status = app
            .flight_status(airline, code, *departure)
            .expect("registered flight");
        if status == FlightStatus::Unknown {
            warn!("Flight {} never reached a majority", code);
        }
        println!("{:8} {:?}", code, status);
    }

    println!("--- Passenger credit ---");
    for p in 0..args.passengers {
        let passenger = format!("passenger{}", p).into_bytes();
        let credit = app.account_credit(&passenger);
        println!("passenger{} {} base units", p, credit);
        if credit > 0 {
            // Withdraw half, leaving some balance visible in the summary
            app.withdraw_credit(&passenger, credit / 2)
                .expect("withdrawal");
            println!(
                "passenger{} withdrew {}, {} remaining",
                p,
                credit / 2,
                app.account_credit(&passenger)
            );
        }
    }

    println!("{} commands accepted", app.command_log().len());
    if args.dump_log {
        println!(
            "{}",
            serde_json::to_string_pretty(app.command_log()).expect("log serialization")
        );
    }
}
