use serde::Serialize;

use super::outcome::{Color, Outcome, Parity};

/// How a zero pocket interacts with streaks and active cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPolicy {
    /// Zero breaks both streaks and settles as a lost bet for any pending stake.
    CountAsLoss,
    /// Zero is invisible: streaks and pending bets carry over unchanged.
    Neutral,
    /// Zero clears both streaks and force-resolves any active cycle as a loss.
    Reset,
}

impl ZeroPolicy {
    pub fn parse(s: &str) -> Option<ZeroPolicy> {
        match s.trim().to_lowercase().as_str() {
            "count_as_loss" | "count-as-loss" | "loss" => Some(ZeroPolicy::CountAsLoss),
            "neutral" => Some(ZeroPolicy::Neutral),
            "reset" => Some(ZeroPolicy::Reset),
            _ => None,
        }
    }
}

/// Current consecutive runs across the two even-money dimensions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreakState {
    pub color: Option<Color>,
    pub color_len: u32,
    pub parity: Option<Parity>,
    pub parity_len: u32,
}

/// Tracks consecutive colour and parity runs for one strategy.
///
/// Under `count_as_loss` a zero starts a green/zero run, which breaks both
/// real runs without ever becoming bettable itself.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    policy: ZeroPolicy,
    state: StreakState,
}

impl StreakTracker {
    pub fn new(policy: ZeroPolicy) -> Self {
        StreakTracker {
            policy,
            state: StreakState::default(),
        }
    }

    /// Fold one outcome into the streak state according to the zero policy.
    pub fn update(&mut self, outcome: &Outcome) {
        if outcome.is_zero() {
            match self.policy {
                ZeroPolicy::CountAsLoss => {
                    self.extend_color(Color::Green);
                    self.extend_parity(Parity::Zero);
                }
                ZeroPolicy::Neutral => {}
                ZeroPolicy::Reset => self.state = StreakState::default(),
            }
            return;
        }
        self.extend_color(outcome.color);
        self.extend_parity(outcome.parity);
    }

    fn extend_color(&mut self, color: Color) {
        if self.state.color == Some(color) {
            self.state.color_len += 1;
        } else {
            self.state.color = Some(color);
            self.state.color_len = 1;
        }
    }

    fn extend_parity(&mut self, parity: Parity) {
        if self.state.parity == Some(parity) {
            self.state.parity_len += 1;
        } else {
            self.state.parity = Some(parity);
            self.state.parity_len = 1;
        }
    }

    pub fn state(&self) -> &StreakState {
        &self.state
    }

    pub fn clear(&mut self) {
        self.state = StreakState::default();
    }

    /// Red/black run a counter-trend bet could fade, if any.
    pub fn color_run(&self) -> Option<(Color, u32)> {
        match self.state.color {
            Some(c @ (Color::Red | Color::Black)) => Some((c, self.state.color_len)),
            _ => None,
        }
    }

    /// Even/odd run a counter-trend bet could fade, if any.
    pub fn parity_run(&self) -> Option<(Parity, u32)> {
        match self.state.parity {
            Some(p @ (Parity::Even | Parity::Odd)) => Some((p, self.state.parity_len)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::outcome::classify;

    fn spin(n: i64) -> Outcome {
        classify(n).unwrap()
    }

    #[test]
    fn test_runs_extend_and_break() {
        let mut t = StreakTracker::new(ZeroPolicy::CountAsLoss);
        // 19 red odd, 21 red odd, 12 red even
        t.update(&spin(19));
        t.update(&spin(21));
        t.update(&spin(12));
        assert_eq!(t.color_run(), Some((Color::Red, 3)));
        assert_eq!(t.parity_run(), Some((Parity::Even, 1)));
        // 10 black even breaks the colour run and extends parity
        t.update(&spin(10));
        assert_eq!(t.color_run(), Some((Color::Black, 1)));
        assert_eq!(t.parity_run(), Some((Parity::Even, 2)));
    }

    #[test]
    fn test_zero_count_as_loss_breaks_both_runs() {
        let mut t = StreakTracker::new(ZeroPolicy::CountAsLoss);
        t.update(&spin(19));
        t.update(&spin(21));
        t.update(&spin(0));
        // A green/zero run exists but is never bettable
        assert_eq!(t.color_run(), None);
        assert_eq!(t.parity_run(), None);
        assert_eq!(t.state().color, Some(Color::Green));
        assert_eq!(t.state().color_len, 1);
        // Two zeros in a row extend the green run
        t.update(&spin(0));
        assert_eq!(t.state().color_len, 2);
    }

    #[test]
    fn test_zero_neutral_is_invisible() {
        let mut t = StreakTracker::new(ZeroPolicy::Neutral);
        t.update(&spin(19));
        t.update(&spin(21));
        t.update(&spin(0));
        assert_eq!(t.color_run(), Some((Color::Red, 2)));
        // The run keeps building across the zero
        t.update(&spin(5));
        assert_eq!(t.color_run(), Some((Color::Red, 3)));
    }

    #[test]
    fn test_zero_reset_clears_everything() {
        let mut t = StreakTracker::new(ZeroPolicy::Reset);
        t.update(&spin(19));
        t.update(&spin(21));
        t.update(&spin(0));
        assert_eq!(t.color_run(), None);
        assert_eq!(t.parity_run(), None);
        assert_eq!(t.state().color, None);
        assert_eq!(t.state().color_len, 0);
    }

    #[test]
    fn test_clear() {
        let mut t = StreakTracker::new(ZeroPolicy::CountAsLoss);
        t.update(&spin(19));
        t.clear();
        assert_eq!(t.color_run(), None);
        assert_eq!(t.state().parity_len, 0);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(ZeroPolicy::parse("count_as_loss"), Some(ZeroPolicy::CountAsLoss));
        assert_eq!(ZeroPolicy::parse("Neutral"), Some(ZeroPolicy::Neutral));
        assert_eq!(ZeroPolicy::parse("reset"), Some(ZeroPolicy::Reset));
        assert_eq!(ZeroPolicy::parse("bogus"), None);
    }
}
