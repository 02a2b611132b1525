// Controller misuse errors
//
// Validation failures are not errors (they come back as `Transition::Blocked`); these cover
// requests the controller refuses outright.

use thiserror::Error;

use crate::wizard::steps::Step;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("another transition is still in progress")]
    Busy,

    #[error("the order was already submitted; the draft is read-only")]
    Finalized,

    #[error("step {} is not unlocked yet", .0.number())]
    Unreachable(Step),

    #[error("at most {max} sports can be added")]
    BlockLimit { max: usize },
}
