//! Pass scheduling gate
//!
//! Only one pass runs at a time. Timer-driven passes additionally require the
//! desired state to have been modified no earlier than the start of the last
//! pass. Triggers arriving while a pass runs are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use tracing::debug;

/// Exclusion flag plus the start time of the last pass
#[derive(Debug, Default)]
pub struct PassGate {
    in_flight: AtomicBool,
    last_start: Mutex<Option<SystemTime>>,
}

impl PassGate {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a permit is currently held
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start time of the last pass that was let through
    #[must_use]
    pub fn last_start(&self) -> Option<SystemTime> {
        *self.last_start.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a pass if idle and `modified` is not older than the last start
    pub fn try_begin(self: &Arc<Self>, modified: SystemTime) -> Option<PassPermit> {
        let permit = self.acquire()?;
        let mut last = self.last_start.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|last| modified < last) {
            debug!("desired state unchanged since last pass");
            // dropping the permit releases the flag
            return None;
        }
        *last = Some(SystemTime::now());
        drop(last);
        Some(permit)
    }

    /// Begin a pass if idle, ignoring modification times
    pub fn begin_forced(self: &Arc<Self>) -> Option<PassPermit> {
        let permit = self.acquire()?;
        *self.last_start.lock().unwrap_or_else(PoisonError::into_inner) = Some(SystemTime::now());
        Some(permit)
    }

    fn acquire(self: &Arc<Self>) -> Option<PassPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(PassPermit {
            gate: Arc::clone(self),
        })
    }
}

/// Held for the duration of a pass; releases the gate on drop
#[derive(Debug)]
pub struct PassPermit {
    gate: Arc<PassGate>,
}

impl Drop for PassPermit {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_single_permit() {
        let gate = PassGate::new();
        let permit = gate.begin_forced().unwrap();
        assert!(gate.is_running());
        assert!(gate.begin_forced().is_none());
        assert!(gate.try_begin(SystemTime::now()).is_none());

        drop(permit);
        assert!(!gate.is_running());
        assert!(gate.begin_forced().is_some());
    }

    #[test]
    fn test_stale_modification_is_skipped() {
        let gate = PassGate::new();
        let before = SystemTime::now() - Duration::from_secs(60);

        // first pass always runs
        drop(gate.try_begin(before).unwrap());
        assert!(gate.last_start().is_some());

        assert!(gate.try_begin(before).is_none());
        assert!(!gate.is_running());

        let later = SystemTime::now() + Duration::from_secs(1);
        assert!(gate.try_begin(later).is_some());
    }
}
