use std::time::{Duration, Instant};

/// What one display-frame tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop has not started, or was torn down.
    NotArmed,
    Ineligible,
    /// A previous inference call is still outstanding; the frame is dropped.
    Busy,
    Submitted(u64),
    /// Capture or hand-off failed; the next tick tries again.
    SubmitFailed,
}

/// Whether a finished inference call may still be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Current,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    ticket: u64,
    started: Instant,
}

/// Display-synchronised inference loop state.
///
/// Once started the loop stays armed across every tick, eligible or not,
/// until `teardown`. At most one call is in flight. Submissions carry the
/// generation current at submit time; `invalidate` makes everything
/// submitted earlier stale.
#[derive(Debug)]
pub struct FrameScheduler {
    armed: bool,
    torn_down: bool,
    ticks: u64,
    submissions: u64,
    in_flight: Option<InFlight>,
    generation: u64,
    next_ticket: u64,
    timeout: Duration,
}

impl FrameScheduler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            armed: false,
            torn_down: false,
            ticks: 0,
            submissions: 0,
            in_flight: None,
            generation: 0,
            next_ticket: 0,
            timeout,
        }
    }

    pub fn start(&mut self) {
        if !self.torn_down {
            self.armed = true;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Run one tick. `submit(ticket, generation)` captures and hands off a
    /// frame, returning false if it could not.
    pub fn tick<F>(&mut self, eligible: bool, now: Instant, submit: F) -> TickOutcome
    where
        F: FnOnce(u64, u64) -> bool,
    {
        if !self.armed {
            return TickOutcome::NotArmed;
        }
        self.ticks += 1;

        if !eligible {
            return TickOutcome::Ineligible;
        }
        if self.in_flight.is_some() {
            return TickOutcome::Busy;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        if !submit(ticket, self.generation) {
            return TickOutcome::SubmitFailed;
        }
        self.in_flight = Some(InFlight {
            ticket,
            started: now,
        });
        self.submissions += 1;
        TickOutcome::Submitted(ticket)
    }

    /// Record a finished call. Frees the in-flight slot if it matches.
    pub fn complete(&mut self, ticket: u64, generation: u64) -> Completion {
        let was_in_flight = self.in_flight.is_some_and(|f| f.ticket == ticket);
        if was_in_flight {
            self.in_flight = None;
        }
        if was_in_flight && generation == self.generation && !self.torn_down {
            Completion::Current
        } else {
            Completion::Stale
        }
    }

    /// Abandon a call that has been outstanding too long. Returns its ticket.
    pub fn check_timeout(&mut self, now: Instant) -> Option<u64> {
        let in_flight = self.in_flight?;
        if now.saturating_duration_since(in_flight.started) < self.timeout {
            return None;
        }
        self.in_flight = None;
        Some(in_flight.ticket)
    }

    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn teardown(&mut self) {
        self.armed = false;
        self.torn_down = true;
        self.in_flight = None;
    }

    /// Bring a torn-down scheduler back to the unstarted state. Anything
    /// submitted before stays stale.
    pub fn reset(&mut self) {
        self.armed = false;
        self.torn_down = false;
        self.in_flight = None;
        self.generation += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
