//! Transient answer-feedback signal consumed by the hosting shell.
//!
//! Fire-and-forget contract: the runner resets the signal before every new
//! trigger within the same question so stale animation state never carries
//! over, and nothing reads a return value.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackSignal {
    flash_points: Option<u32>,
    answer_confetti: bool,
}

impl FeedbackSignal {
    pub fn trigger_correct(&mut self, points: u32) {
        self.flash_points = Some(points);
        self.answer_confetti = true;
    }

    pub fn trigger_incorrect(&mut self) {
        self.flash_points = None;
        self.answer_confetti = false;
    }

    pub fn reset(&mut self) {
        self.flash_points = None;
        self.answer_confetti = false;
    }

    pub fn flash_points(&self) -> Option<u32> {
        self.flash_points
    }

    pub fn answer_confetti(&self) -> bool {
        self.answer_confetti
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_trigger_sets_flash_and_confetti() {
        let mut signal = FeedbackSignal::default();
        signal.trigger_correct(1);
        assert_eq!(signal.flash_points(), Some(1));
        assert!(signal.answer_confetti());
    }

    #[test]
    fn reset_clears_prior_trigger() {
        let mut signal = FeedbackSignal::default();
        signal.trigger_correct(2);
        signal.reset();
        assert_eq!(signal.flash_points(), None);
        assert!(!signal.answer_confetti());
    }

    #[test]
    fn incorrect_trigger_overrides_stale_correct_state() {
        let mut signal = FeedbackSignal::default();
        signal.trigger_correct(1);
        signal.reset();
        signal.trigger_incorrect();
        assert_eq!(signal.flash_points(), None);
        assert!(!signal.answer_confetti());
    }
}
