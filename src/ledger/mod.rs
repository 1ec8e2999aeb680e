use std::collections::HashMap;

use log::{debug, info};

use crate::errors::SuretyError;

/// External payment collaborator. The core signals it after a balance has
/// been debited; actual fund movement happens outside the core.
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    /// Transfer `amount` base units to the holder of `account`. An `Err`
    /// carries a collaborator-supplied reason.
    fn transfer(&self, account: &[u8], amount: u64) -> Result<(), String>;
}

/// Gateway that only records the transfer in the log. Used by the node
/// binary and by tests that do not care about the external leg.
pub struct LogGateway;

impl PaymentGateway for LogGateway {
    fn transfer(&self, account: &[u8], amount: u64) -> Result<(), String> {
        info!(
            "payment gateway: transferring {} base units to {}",
            amount,
            hex::encode(account)
        );
        Ok(())
    }
}

/// Account-balance store. Balances are mutated only through `credit` and
/// `debit`; no other component touches them directly.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: HashMap<Vec<u8>, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            accounts: HashMap::new(),
        }
    }

    /// Add `amount` to the account balance, creating the account on first
    /// credit. Balances saturate rather than wrap.
    pub fn credit(&mut self, account: &[u8], amount: u64) {
        let balance = self.accounts.entry(account.to_vec()).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!(
            "credited {} base units to {}, balance now {}",
            amount,
            hex::encode(account),
            *balance
        );
    }

    /// Remove `amount` from the account balance. Fails without touching
    /// the balance when it would go negative.
    pub fn debit(&mut self, account: &[u8], amount: u64) -> Result<(), SuretyError> {
        let balance = self
            .accounts
            .get_mut(account)
            .ok_or(SuretyError::InsufficientCredit)?;
        if *balance < amount {
            return Err(SuretyError::InsufficientCredit);
        }
        *balance -= amount;
        debug!(
            "debited {} base units from {}, balance now {}",
            amount,
            hex::encode(account),
            *balance
        );
        Ok(())
    }

    /// Current balance, zero for unknown accounts
    pub fn balance(&self, account: &[u8]) -> u64 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

/// Safe withdrawal of accumulated passenger credit. The debit happens
/// before the external transfer is signalled, so a re-entering caller
/// always observes the reduced balance.
pub struct CreditWithdrawal {
    gateway: Box<dyn PaymentGateway>,
}

impl CreditWithdrawal {
    pub fn new(gateway: Box<dyn PaymentGateway>) -> Self {
        CreditWithdrawal { gateway }
    }

    /// Debit `amount` from the account, then signal the payment
    /// collaborator. A failed transfer restores the balance inside the
    /// same critical section and surfaces the gateway's reason.
    pub fn withdraw(
        &self,
        ledger: &mut Ledger,
        account: &[u8],
        amount: u64,
    ) -> Result<(), SuretyError> {
        ledger.debit(account, amount)?;

        if let Err(reason) = self.gateway.transfer(account, amount) {
            ledger.credit(account, amount);
            return Err(SuretyError::PaymentFailed(reason));
        }

        info!(
            "withdrew {} base units for {}",
            amount,
            hex::encode(account)
        );
        Ok(())
    }
}
