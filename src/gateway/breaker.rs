//! Lock-free per-provider circuit breaker.
//!
//! State transitions use compare-and-swap so the hot path never takes a
//! lock: closed until the consecutive-failure threshold, open for the
//! cooldown, then exactly one caller wins the half-open trial.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// One trial call is in flight.
    HalfOpen,
}

/// Circuit breaker guarding one model provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_ms: u64,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    opened_at_ms: AtomicU64,
    trial_started_ms: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub const fn new(failure_threshold: u32, reset_ms: u64) -> Self {
        Self {
            failure_threshold,
            reset_ms,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            trial_started_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether a call may proceed right now.
    ///
    /// While open, the first caller after the cooldown wins the CAS into
    /// half-open and gets the trial; everyone else keeps being rejected
    /// until that trial reports back. A trial that never reports back (the
    /// caller dropped or timed out) holds the slot only for the cooldown;
    /// after that one caller may claim a fresh trial.
    pub fn allow(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => true,
            STATE_OPEN => {
                let now = now_ms();
                let opened = self.opened_at_ms.load(Ordering::Acquire);
                if now.saturating_sub(opened) < self.reset_ms {
                    return false;
                }
                // Timestamp before the state CAS so half-open readers never
                // see a stale trial start.
                self.trial_started_ms.store(now, Ordering::Release);
                self.state
                    .compare_exchange(
                        STATE_OPEN,
                        STATE_HALF_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            }
            _ => {
                let started = self.trial_started_ms.load(Ordering::Acquire);
                if now_ms().saturating_sub(started) < self.reset_ms {
                    return false;
                }
                // The in-flight trial was abandoned; one caller re-arms it.
                self.trial_started_ms
                    .compare_exchange(started, now_ms(), Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            }
        }
    }

    /// Records a successful call: closes the breaker and clears the
    /// failure streak.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    /// Records a failed call. A half-open trial failure reopens
    /// immediately; in closed state the breaker opens once the streak
    /// reaches the threshold.
    pub fn record_failure(&self) {
        if self.state.load(Ordering::Acquire) == STATE_HALF_OPEN {
            self.trip();
            return;
        }
        let streak = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if streak >= self.failure_threshold {
            self.trip();
        }
    }

    /// Current state, for logging and health surfaces.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    fn trip(&self) {
        self.opened_at_ms.store(now_ms(), Ordering::Release);
        self.state.store(STATE_OPEN, Ordering::Release);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
