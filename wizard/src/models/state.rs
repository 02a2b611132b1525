// Wizard navigation state (in-memory)
//
// NOTE: This is NOT persisted as-is; the draft store keeps only the current step index. On
// resume the furthest unlocked step is rebuilt as equal to the restored step.

use crate::wizard::steps::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardState {
    current: Step,
    furthest: Step,
    finalized: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current: Step::Profile,
            furthest: Step::Profile,
            finalized: false,
        }
    }
}

impl WizardState {
    pub fn current(&self) -> Step {
        self.current
    }

    pub fn furthest(&self) -> Step {
        self.furthest
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Directly navigable without validation.
    pub fn is_reachable(&self, step: Step) -> bool {
        step <= self.furthest
    }

    /// Never lowers the furthest unlocked step.
    pub fn unlock(&mut self, step: Step) {
        if step > self.furthest {
            self.furthest = step;
        }
    }

    /// Move to an already unlocked step. Returns false (and leaves the state untouched) when
    /// the step is beyond the furthest unlocked one.
    pub fn move_to(&mut self, step: Step) -> bool {
        if !self.is_reachable(step) {
            return false;
        }
        self.current = step;
        true
    }

    pub fn resume_at(&mut self, step: Step) {
        self.current = step;
        self.furthest = step;
        self.finalized = false;
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_is_monotonic() {
        let mut state = WizardState::default();
        state.unlock(Step::Diet);
        state.unlock(Step::Goal);
        assert_eq!(state.furthest(), Step::Diet);
    }

    #[test]
    fn move_to_rejects_locked_steps() {
        let mut state = WizardState::default();
        state.unlock(Step::Sport);
        assert!(state.move_to(Step::Sport));
        assert!(!state.move_to(Step::Plan));
        assert_eq!(state.current(), Step::Sport);
        assert!(state.move_to(Step::Profile));
        assert_eq!(state.furthest(), Step::Sport);
    }

    #[test]
    fn resume_sets_current_and_furthest() {
        let mut state = WizardState::default();
        state.finalize();
        state.resume_at(Step::Plan);
        assert_eq!(state.current(), Step::Plan);
        assert_eq!(state.furthest(), Step::Plan);
        assert!(!state.is_finalized());
    }
}
