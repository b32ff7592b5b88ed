//! Liveness probing
//!
//! Pure state machine: the transport task feeds it ticks and acknowledgments
//! and acts on the verdicts. It never touches the socket itself.

use std::time::Duration;

use tokio::time::Instant;

/// What the transport should do on a probe tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Nothing this cycle (not open, or probing disabled).
    Skip,
    SendPing,
    /// The previous probe went unanswered past the grace period.
    Dead,
}

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    interval: Duration,
    grace: Duration,
    awaiting_since: Option<Instant>,
}

impl LivenessMonitor {
    /// `interval` of zero disables probing.
    pub fn new(interval: Duration, grace: Duration) -> Self {
        Self {
            interval,
            grace,
            awaiting_since: None,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_tick(&mut self, now: Instant, open: bool) -> Probe {
        if !self.enabled() || !open {
            return Probe::Skip;
        }
        if self.expired(now) {
            return Probe::Dead;
        }
        // An unanswered probe still inside its grace period is not re-armed.
        if self.awaiting_since.is_none() {
            self.awaiting_since = Some(now);
        }
        Probe::SendPing
    }

    pub fn on_ack(&mut self) {
        self.awaiting_since = None;
    }

    /// Instant after which the outstanding probe counts as unanswered.
    pub fn deadline(&self) -> Option<Instant> {
        self.awaiting_since.map(|sent| sent + self.grace)
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Forget any outstanding probe, e.g. after the connection was replaced.
    pub fn reset(&mut self) {
        self.awaiting_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_probe_is_noop_when_not_open() {
        let mut monitor = LivenessMonitor::new(SECOND, SECOND);
        assert_eq!(monitor.on_tick(Instant::now(), false), Probe::Skip);
        assert!(monitor.deadline().is_none());
    }

    #[test]
    fn test_zero_interval_disables_probing() {
        let mut monitor = LivenessMonitor::new(Duration::ZERO, SECOND);
        assert!(!monitor.enabled());
        assert_eq!(monitor.on_tick(Instant::now(), true), Probe::Skip);
    }

    #[test]
    fn test_ack_clears_outstanding_probe() {
        let mut monitor = LivenessMonitor::new(SECOND, SECOND);
        let start = Instant::now();

        assert_eq!(monitor.on_tick(start, true), Probe::SendPing);
        assert_eq!(monitor.deadline(), Some(start + SECOND));
        monitor.on_ack();
        assert!(monitor.deadline().is_none());
        assert!(!monitor.expired(start + 10 * SECOND));
    }

    #[test]
    fn test_unanswered_probe_is_dead_after_grace() {
        let mut monitor = LivenessMonitor::new(SECOND, 2 * SECOND);
        let start = Instant::now();

        assert_eq!(monitor.on_tick(start, true), Probe::SendPing);
        // Inside grace: keep probing, deadline stays anchored to the first probe.
        assert_eq!(monitor.on_tick(start + SECOND, true), Probe::SendPing);
        assert_eq!(monitor.deadline(), Some(start + 2 * SECOND));
        assert!(monitor.expired(start + 2 * SECOND));
        assert_eq!(monitor.on_tick(start + 2 * SECOND, true), Probe::Dead);

        monitor.reset();
        assert_eq!(monitor.on_tick(start + 3 * SECOND, true), Probe::SendPing);
    }
}
