use log::{debug, info};

use crate::errors::SuretyError;
use crate::flights::{Flight, FlightStatus};
use crate::ledger::Ledger;

/// Premium intake and payout computation. Per-flight policy records live
/// inside the `Flight`; this component owns the rules for mutating them
/// and is the only writer of passenger credit.
pub struct InsurancePool {
    max_premium: u64,
    payout_numerator: u64,
    payout_denominator: u64,
}

impl InsurancePool {
    pub fn new(max_premium: u64, payout_numerator: u64, payout_denominator: u64) -> Self {
        InsurancePool {
            max_premium,
            payout_numerator,
            payout_denominator,
        }
    }

    /// Accept a premium against a flight that has not yet resolved.
    /// Repeat purchases by the same insuree accumulate; the insuree list
    /// keeps first-purchase order.
    pub fn purchase(
        &self,
        flight: &mut Flight,
        insuree: &[u8],
        premium: u64,
    ) -> Result<(), SuretyError> {
        if flight.status != FlightStatus::Unknown {
            return Err(SuretyError::FlightAlreadyResolved);
        }
        if premium == 0 || premium > self.max_premium {
            return Err(SuretyError::PremiumOutOfRange);
        }

        flight.total_premium = flight.total_premium.saturating_add(premium);
        let entry = flight.premiums.entry(insuree.to_vec()).or_insert(0);
        if *entry == 0 {
            flight.insurees.push(insuree.to_vec());
        }
        *entry = entry.saturating_add(premium);

        debug!(
            "premium {} accepted on flight {} from {}, flight total {}",
            premium,
            flight.flight_code,
            hex::encode(insuree),
            flight.total_premium
        );
        Ok(())
    }

    /// Payout owed for a premium when delay is attributed to the airline
    pub fn payout_for(&self, premium: u64) -> u64 {
        premium * self.payout_numerator / self.payout_denominator
    }

    /// Settle a resolved flight. Airline-caused delay credits every
    /// insuree their payout; any other terminal status forfeits the
    /// premiums. Idempotent per flight: a repeat invocation is a no-op.
    /// Returns the (insuree, amount) pairs credited, in insuree order.
    pub fn settle(&self, flight: &mut Flight, ledger: &mut Ledger) -> Vec<(Vec<u8>, u64)> {
        if flight.settled || flight.status == FlightStatus::Unknown {
            return Vec::new();
        }
        flight.settled = true;

        if flight.status != FlightStatus::LateAirline {
            info!(
                "flight {} resolved to {:?}, premiums forfeited",
                flight.flight_code, flight.status
            );
            return Vec::new();
        }

        let mut credited = Vec::with_capacity(flight.insurees.len());
        for insuree in &flight.insurees {
            let premium = flight.premiums.get(insuree).copied().unwrap_or(0);
            let payout = self.payout_for(premium);
            ledger.credit(insuree, payout);
            credited.push((insuree.clone(), payout));
        }
        info!(
            "flight {} settled, {} insurees credited",
            flight.flight_code,
            credited.len()
        );
        credited
    }
}
