use std::collections::{HashMap, HashSet};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_EMAIL_COOLDOWN_SECS: i64 = 5 * 60;

/// Per-recipient cooldown between notices. Only confirmed sends are
/// recorded, so a failed attempt leaves the recipient eligible again.
/// A recipient with a send still in flight is not eligible.
#[derive(Debug, Clone)]
pub struct NotificationThrottle {
    cooldown: Duration,
    last_sent: HashMap<String, DateTime<Utc>>,
    in_flight: HashSet<String>,
}

impl NotificationThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_sent: HashMap::new(), in_flight: HashSet::new() }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn should_send(&self, recipient: &str, now: DateTime<Utc>) -> bool {
        match self.last_sent.get(recipient) {
            Some(last) => now - *last >= self.cooldown,
            None => true,
        }
    }

    /// Marks a send as started if the recipient is eligible.
    pub fn try_claim(&mut self, recipient: &str, now: DateTime<Utc>) -> bool {
        if self.in_flight.contains(recipient) || !self.should_send(recipient, now) {
            return false;
        }
        self.in_flight.insert(recipient.to_string());
        true
    }

    /// Ends a claimed send that failed.
    pub fn release(&mut self, recipient: &str) {
        self.in_flight.remove(recipient);
    }

    pub fn record_success(&mut self, recipient: &str, sent_at: DateTime<Utc>) {
        self.in_flight.remove(recipient);
        self.last_sent.insert(recipient.to_string(), sent_at);
    }

    pub fn is_in_flight(&self, recipient: &str) -> bool {
        self.in_flight.contains(recipient)
    }

    pub fn last_sent(&self, recipient: &str) -> Option<DateTime<Utc>> {
        self.last_sent.get(recipient).copied()
    }

    pub fn tracked(&self) -> usize {
        self.last_sent.len()
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_EMAIL_COOLDOWN_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 7, 30, 0).unwrap()
    }

    #[test]
    fn test_first_send_allowed() {
        let throttle = NotificationThrottle::default();
        assert!(throttle.should_send("p@example.com", t0()));
        assert_eq!(throttle.tracked(), 0);
    }

    #[test]
    fn test_suppressed_inside_cooldown() {
        let mut throttle = NotificationThrottle::default();
        throttle.record_success("p@example.com", t0());
        assert!(!throttle.should_send("p@example.com", t0() + Duration::seconds(299)));
        assert!(throttle.should_send("p@example.com", t0() + Duration::seconds(300)));
    }

    #[test]
    fn test_recipients_are_independent() {
        let mut throttle = NotificationThrottle::default();
        throttle.record_success("a@example.com", t0());
        assert!(throttle.should_send("b@example.com", t0()));
    }

    #[test]
    fn test_unrecorded_failure_keeps_eligible() {
        let throttle = NotificationThrottle::new(Duration::minutes(5));
        // No record_success call: nothing consumed.
        assert!(throttle.should_send("p@example.com", t0()));
        assert!(throttle.should_send("p@example.com", t0() + Duration::seconds(1)));
        assert_eq!(throttle.last_sent("p@example.com"), None);
    }

    #[test]
    fn test_claim_blocks_until_finished() {
        let mut throttle = NotificationThrottle::default();
        assert!(throttle.try_claim("p@example.com", t0()));
        assert!(throttle.is_in_flight("p@example.com"));
        assert!(!throttle.try_claim("p@example.com", t0() + Duration::seconds(1)));

        throttle.release("p@example.com");
        assert!(throttle.try_claim("p@example.com", t0() + Duration::seconds(2)));
        throttle.record_success("p@example.com", t0() + Duration::seconds(2));
        assert!(!throttle.is_in_flight("p@example.com"));
        assert!(!throttle.try_claim("p@example.com", t0() + Duration::seconds(60)));
        assert!(throttle.try_claim("p@example.com", t0() + Duration::seconds(302)));
    }
}
