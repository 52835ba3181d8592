//! Atomic token-budget ledger.
//!
//! Tracks token spend against a rolling accounting period. All updates go
//! through compare-and-swap loops, so concurrent sessions can charge the
//! ledger without a lock and the budget can never be overshot by a race.

use crate::{current_timestamp, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Token budget for one accounting period.
#[derive(Debug)]
pub struct BudgetLedger {
    budget_tokens: u64,
    period_secs: u64,
    spent: AtomicU64,
    period_start: AtomicU64,
}

impl BudgetLedger {
    /// Creates a ledger with a fresh period starting now.
    #[must_use]
    pub fn new(budget_tokens: u64, period_secs: u64) -> Self {
        Self {
            budget_tokens,
            period_secs,
            spent: AtomicU64::new(0),
            period_start: AtomicU64::new(current_timestamp()),
        }
    }

    /// Reserves `tokens` against the current period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BudgetExceeded`] when the charge would put the
    /// period over budget; the ledger is left unchanged in that case.
    pub fn try_charge(&self, tokens: u64) -> Result<()> {
        self.roll_period_if_elapsed();
        let result = self
            .spent
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |spent| {
                spent
                    .checked_add(tokens)
                    .filter(|total| *total <= self.budget_tokens)
            });
        match result {
            Ok(_) => Ok(()),
            Err(spent) => Err(Error::BudgetExceeded {
                spent_tokens: spent,
                budget_tokens: self.budget_tokens,
            }),
        }
    }

    /// Returns a reservation to the pool, e.g. when a call failed before
    /// consuming tokens.
    pub fn refund(&self, tokens: u64) {
        let _ = self
            .spent
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |spent| {
                Some(spent.saturating_sub(tokens))
            });
    }

    /// Tokens spent in the current period.
    #[must_use]
    pub fn spent(&self) -> u64 {
        self.roll_period_if_elapsed();
        self.spent.load(Ordering::Acquire)
    }

    /// Tokens remaining in the current period.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.budget_tokens.saturating_sub(self.spent())
    }

    /// Starts a new period when the current one has elapsed. The winner of
    /// the CAS resets the spend; losers see the new period already active.
    fn roll_period_if_elapsed(&self) {
        let now = current_timestamp();
        let start = self.period_start.load(Ordering::Acquire);
        if now.saturating_sub(start) < self.period_secs {
            return;
        }
        if self
            .period_start
            .compare_exchange(start, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.spent.store(0, Ordering::Release);
            tracing::debug!(budget_tokens = self.budget_tokens, "budget period rolled");
        }
    }
}
