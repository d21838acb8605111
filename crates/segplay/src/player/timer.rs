use std::time::{Duration, Instant};

/// Fixed-period timer polled from the control thread. At most one schedule
/// is alive: `arm` replaces whatever was armed before.
#[derive(Debug)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Option<Instant>,
    arm_count: u64,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            next_due: None,
            arm_count: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cancel any previous schedule and start a new one from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.cancel();
        self.next_due = Some(now + self.period);
        self.arm_count += 1;
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// How many times the timer has been armed since creation.
    pub fn arm_count(&self) -> u64 {
        self.arm_count
    }

    /// Returns true when the timer fired. Missed periods collapse into a
    /// single firing.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        let mut next = due + self.period;
        if next <= now {
            next = now + self.period;
        }
        self.next_due = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn fires_once_per_period() {
        let start = Instant::now();
        let mut timer = IntervalTimer::new(TICK);
        timer.arm(start);
        assert!(!timer.poll(start + Duration::from_millis(50)));
        assert!(timer.poll(start + Duration::from_millis(100)));
        assert!(!timer.poll(start + Duration::from_millis(150)));
        assert!(timer.poll(start + Duration::from_millis(200)));
    }

    #[test]
    fn missed_periods_collapse() {
        let start = Instant::now();
        let mut timer = IntervalTimer::new(TICK);
        timer.arm(start);
        assert!(timer.poll(start + Duration::from_millis(550)));
        assert!(!timer.poll(start + Duration::from_millis(600)));
        assert!(timer.poll(start + Duration::from_millis(650)));
    }

    #[test]
    fn rearming_replaces_schedule() {
        let start = Instant::now();
        let mut timer = IntervalTimer::new(TICK);
        timer.arm(start);
        timer.arm(start + Duration::from_millis(60));
        assert_eq!(timer.arm_count(), 2);
        // The first schedule would have fired at 100ms
        assert!(!timer.poll(start + Duration::from_millis(100)));
        assert!(timer.poll(start + Duration::from_millis(160)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let start = Instant::now();
        let mut timer = IntervalTimer::new(TICK);
        timer.arm(start);
        timer.cancel();
        assert!(!timer.is_active());
        assert!(!timer.poll(start + Duration::from_secs(5)));
    }

    #[test]
    fn zero_period_is_clamped() {
        let timer = IntervalTimer::new(Duration::ZERO);
        assert_eq!(timer.period(), Duration::from_millis(1));
    }
}
