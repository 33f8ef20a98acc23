mod state;
mod withdrawal;

pub use state::{
    CHECK_FAILED, Dispatch, HISTORY_LIMIT, Resolution, STATUS_FAILED, State, Ticket,
    TransitionRecord, Trigger, WITHDRAW_FAILED, Workflow, WorkflowError, failure_message,
};
pub use withdrawal::{FormError, MIN_PHONE_DIGITS, WithdrawalDraft, WithdrawalRequest};
