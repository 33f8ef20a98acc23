use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::withdrawal::{FormError, WithdrawalDraft};
use crate::gateway::{
    Action, GatewayError, LookupPayload, Payload, RemoteReply, RemoteResult, RemoteStatus,
};
use crate::identifier::{self, Identifier, IdentifierError};

pub const CHECK_FAILED: &str = "Não foi possível consultar agora.";
pub const STATUS_FAILED: &str = "Status indisponível no momento.";
pub const WITHDRAW_FAILED: &str = "Não foi possível enviar o saque agora.";

/// Number of transitions kept by [`Workflow::history`]; older ones are dropped.
pub const HISTORY_LIMIT: usize = 64;

/// The states of the consultation/withdrawal workflow.
///
/// `Idle → Checking → Result* → (WithdrawalForm → Submitting →) Result* → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Idle,
    Checking,
    ResultEligibleOpen,
    ResultEligibleFormalized,
    ResultPendingAuthorization,
    ResultNotEligible,
    ResultError,
    WithdrawalForm,
    Submitting,
}

impl State {
    /// Whether this is one of the `Result*` states.
    pub fn is_result(self) -> bool {
        matches!(
            self,
            State::ResultEligibleOpen
                | State::ResultEligibleFormalized
                | State::ResultPendingAuthorization
                | State::ResultNotEligible
                | State::ResultError
        )
    }

    /// Whether a remote call is outstanding.
    pub fn is_outstanding(self) -> bool {
        matches!(self, State::Checking | State::Submitting)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Checking => write!(f, "CHECKING"),
            State::ResultEligibleOpen => write!(f, "RESULT_ELIGIBLE_OPEN"),
            State::ResultEligibleFormalized => write!(f, "RESULT_ELIGIBLE_FORMALIZED"),
            State::ResultPendingAuthorization => write!(f, "RESULT_PENDING_AUTHORIZATION"),
            State::ResultNotEligible => write!(f, "RESULT_NOT_ELIGIBLE"),
            State::ResultError => write!(f, "RESULT_ERROR"),
            State::WithdrawalForm => write!(f, "WITHDRAWAL_FORM"),
            State::Submitting => write!(f, "SUBMITTING"),
        }
    }
}

/// User-initiated triggers. Also used as the affordance set of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Check,
    Status,
    Retry,
    BeginWithdrawal,
    CancelWithdrawal,
    SubmitWithdrawal,
    OpenFormalization,
    ViewInstructions,
    Close,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Check => write!(f, "check"),
            Trigger::Status => write!(f, "status"),
            Trigger::Retry => write!(f, "retry"),
            Trigger::BeginWithdrawal => write!(f, "begin withdrawal"),
            Trigger::CancelWithdrawal => write!(f, "cancel withdrawal"),
            Trigger::SubmitWithdrawal => write!(f, "submit withdrawal"),
            Trigger::OpenFormalization => write!(f, "open formalization"),
            Trigger::ViewInstructions => write!(f, "view instructions"),
            Trigger::Close => write!(f, "close"),
        }
    }
}

/// Why a trigger was refused. The state is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("`{trigger}` is not available in state {state}")]
    NotAllowed { trigger: Trigger, state: State },

    #[error("a request is already in progress ({0})")]
    Busy(State),

    #[error("CPF inválido: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error(transparent)]
    Form(#[from] FormError),
}

/// Tag carried by an outstanding call. Only the current ticket may resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub action: Action,
    pub request_id: Uuid,
}

/// A remote call the caller must now perform, then hand back via [`Workflow::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub payload: Payload,
}

/// What happened to a resolved call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The response was applied and the machine moved to this state.
    Applied(State),
    /// The ticket was no longer current; the response was dropped.
    Stale,
}

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: State,
    pub to: State,
    pub at: DateTime<Utc>,
}

/// The consultation/withdrawal state machine.
///
/// Owns the identifier input, the current result and the withdrawal draft.
/// Remote calls are not performed here: dispatching triggers return a
/// [`Dispatch`] and the caller reports the outcome through [`Workflow::resolve`].
#[derive(Debug, Clone)]
pub struct Workflow {
    input: String,
    subject: Option<Identifier>,
    state: State,
    result: Option<RemoteResult>,
    failed_action: Option<Action>,
    draft: Option<WithdrawalDraft>,
    notice: Option<String>,
    pending: Option<Ticket>,
    generation: u64,
    history: Vec<TransitionRecord>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            subject: None,
            state: State::Idle,
            result: None,
            failed_action: None,
            draft: None,
            notice: None,
            pending: None,
            generation: 0,
            history: Vec::new(),
        }
    }

    /// Starts idle with the identifier field pre-filled (e.g. from a remembered session).
    pub fn with_input(raw: impl Into<String>) -> Self {
        let mut wf = Self::new();
        wf.input = raw.into();
        wf
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the identifier field. Accepted in any state; it only affects
    /// the next `check` (or the `status` shortcut from `Idle`).
    pub fn set_input(&mut self, raw: impl Into<String>) {
        self.input = raw.into();
    }

    /// The typed identifier, if the current input is valid.
    pub fn input_identifier(&self) -> Option<Identifier> {
        Identifier::parse(&self.input).ok()
    }

    pub fn shows_invalid_hint(&self) -> bool {
        identifier::shows_invalid_hint(&self.input)
    }

    /// The identifier the current result flow is about.
    pub fn subject(&self) -> Option<&Identifier> {
        self.subject.as_ref()
    }

    pub fn result(&self) -> Option<&RemoteResult> {
        self.result.as_ref()
    }

    pub fn draft(&self) -> Option<&WithdrawalDraft> {
        self.draft.as_ref()
    }

    /// Editable form contents; only while the form is shown.
    pub fn draft_mut(&mut self) -> Option<&mut WithdrawalDraft> {
        match self.state {
            State::WithdrawalForm => self.draft.as_mut(),
            _ => None,
        }
    }

    /// Transient error shown inside the withdrawal form after a failed submission.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn pending(&self) -> Option<&Ticket> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// The triggers offered in the current state.
    pub fn affordances(&self) -> Vec<Trigger> {
        match self.state {
            State::Idle if identifier::validate(&self.input) => vec![Trigger::Check],
            State::Idle => Vec::new(),
            State::Checking => vec![Trigger::Close],
            State::ResultEligibleOpen => vec![Trigger::BeginWithdrawal, Trigger::Close],
            State::ResultEligibleFormalized => {
                vec![Trigger::OpenFormalization, Trigger::Status, Trigger::Close]
            }
            State::ResultPendingAuthorization => {
                vec![Trigger::Status, Trigger::ViewInstructions, Trigger::Close]
            }
            State::ResultNotEligible => vec![Trigger::Close],
            State::ResultError => vec![Trigger::Retry, Trigger::Close],
            State::WithdrawalForm => vec![Trigger::SubmitWithdrawal, Trigger::CancelWithdrawal],
            State::Submitting => Vec::new(),
        }
    }

    /// Balance check for the current input. Valid from `Idle` and any `Result*` state.
    pub fn check(&mut self) -> Result<Dispatch, WorkflowError> {
        self.guard(Trigger::Check, |s| s == State::Idle || s.is_result())?;
        let id = Identifier::parse(&self.input)?;
        self.subject = Some(id.clone());
        Ok(self.dispatch(Action::Check, lookup(id)))
    }

    /// Status re-check. Valid from `ResultPendingAuthorization` and
    /// `ResultEligibleFormalized` (for the current subject), and from `Idle`
    /// as the remembered-session shortcut (for the current input). Whether a
    /// session is remembered is checked by [`crate::WorkflowOrchestrator`].
    pub fn check_status(&mut self) -> Result<Dispatch, WorkflowError> {
        self.guard(Trigger::Status, |s| {
            matches!(
                s,
                State::Idle | State::ResultPendingAuthorization | State::ResultEligibleFormalized
            )
        })?;
        let id = match (&self.state, &self.subject) {
            (State::Idle, _) | (_, None) => Identifier::parse(&self.input)?,
            (_, Some(subject)) => subject.clone(),
        };
        self.subject = Some(id.clone());
        Ok(self.dispatch(Action::Status, lookup(id)))
    }

    /// Re-issues the action that led to `ResultError`.
    ///
    /// A withdrawal the server refused is not resubmitted blindly: the retry
    /// re-runs the balance check and keeps the draft for the reopened form.
    pub fn retry(&mut self) -> Result<Dispatch, WorkflowError> {
        self.guard(Trigger::Retry, |s| s == State::ResultError)?;
        let id = match &self.subject {
            Some(subject) => subject.clone(),
            None => Identifier::parse(&self.input)?,
        };
        self.subject = Some(id.clone());
        match self.failed_action.unwrap_or(Action::Check) {
            Action::Withdraw => {
                let draft = self.draft.take();
                let dispatch = self.dispatch(Action::Check, lookup(id));
                self.draft = draft;
                Ok(dispatch)
            }
            action => Ok(self.dispatch(action, lookup(id))),
        }
    }

    pub fn begin_withdrawal(&mut self) -> Result<(), WorkflowError> {
        self.guard(Trigger::BeginWithdrawal, |s| s == State::ResultEligibleOpen)?;
        if self.draft.is_none() {
            self.draft = Some(WithdrawalDraft::default());
        }
        self.notice = None;
        self.enter(State::WithdrawalForm);
        Ok(())
    }

    /// Leaves the form; its contents stay in the draft for the next visit.
    pub fn cancel_withdrawal(&mut self) -> Result<(), WorkflowError> {
        self.guard(Trigger::CancelWithdrawal, |s| s == State::WithdrawalForm)?;
        self.notice = None;
        self.enter(State::ResultEligibleOpen);
        Ok(())
    }

    /// Validates the form and, if complete, dispatches `withdraw`.
    pub fn submit_withdrawal(&mut self) -> Result<Dispatch, WorkflowError> {
        self.guard(Trigger::SubmitWithdrawal, |s| s == State::WithdrawalForm)?;
        let request = self.draft.clone().unwrap_or_default().validate()?;
        let id = match &self.subject {
            Some(subject) => subject.clone(),
            None => Identifier::parse(&self.input)?,
        };
        self.notice = None;
        let payload = Payload::Withdraw(request.into_payload(id));
        Ok(self.dispatch(Action::Withdraw, payload))
    }

    /// Guard for the instructions overlay; the state does not change.
    pub fn view_instructions(&self) -> Result<(), WorkflowError> {
        self.guard(Trigger::ViewInstructions, |s| {
            s == State::ResultPendingAuthorization
        })
    }

    /// The link to open for formalization, available only in `ResultEligibleFormalized`.
    pub fn formalization_link(&self) -> Result<&Url, WorkflowError> {
        self.guard(Trigger::OpenFormalization, |s| {
            s == State::ResultEligibleFormalized
        })?;
        self.result
            .as_ref()
            .and_then(|r| r.formalization_link.as_ref())
            .ok_or(WorkflowError::NotAllowed {
                trigger: Trigger::OpenFormalization,
                state: self.state,
            })
    }

    /// Discards the result and returns to `Idle`, keeping the identifier input.
    ///
    /// From `Checking` this abandons the outstanding call: it is not cancelled,
    /// but whatever it eventually returns is dropped as stale.
    pub fn close(&mut self) -> Result<(), WorkflowError> {
        if self.state == State::Checking {
            if let Some(ticket) = self.pending.take() {
                tracing::debug!(
                    generation = ticket.generation,
                    request_id = %ticket.request_id,
                    "abandoning outstanding call"
                );
            }
        } else if !self.state.is_result() {
            return Err(self.refuse(Trigger::Close));
        }
        self.result = None;
        self.failed_action = None;
        self.draft = None;
        self.notice = None;
        self.subject = None;
        self.enter(State::Idle);
        Ok(())
    }

    /// Applies the outcome of the call identified by `ticket`.
    pub fn resolve(
        &mut self,
        ticket: &Ticket,
        outcome: Result<RemoteReply, GatewayError>,
    ) -> Resolution {
        let current = self.pending.as_ref().map(|p| p.generation);
        if current != Some(ticket.generation) {
            tracing::debug!(
                generation = ticket.generation,
                ?current,
                action = %ticket.action,
                "dropping stale response"
            );
            return Resolution::Stale;
        }
        self.pending = None;

        let next = match self.state {
            State::Checking => self.resolve_lookup(ticket.action, outcome),
            State::Submitting => self.resolve_withdraw(outcome),
            other => {
                tracing::warn!(state = %other, "pending ticket outside an outstanding state");
                return Resolution::Stale;
            }
        };
        self.enter(next);
        Resolution::Applied(next)
    }

    fn resolve_lookup(
        &mut self,
        action: Action,
        outcome: Result<RemoteReply, GatewayError>,
    ) -> State {
        let result = match outcome {
            Ok(reply) => RemoteResult::from_reply(reply, RemoteStatus::Unknown),
            Err(err) => {
                tracing::warn!(%action, %err, "remote call failed");
                RemoteResult::failure(failure_message(action))
            }
        };
        let next = match result.status {
            RemoteStatus::Eligible if result.formalization_link.is_some() => {
                State::ResultEligibleFormalized
            }
            RemoteStatus::Eligible => State::ResultEligibleOpen,
            RemoteStatus::PendingAuthorization => State::ResultPendingAuthorization,
            RemoteStatus::NotEligible => State::ResultNotEligible,
            RemoteStatus::Error | RemoteStatus::Unknown => {
                self.failed_action = Some(action);
                State::ResultError
            }
        };
        self.result = Some(result);
        next
    }

    fn resolve_withdraw(&mut self, outcome: Result<RemoteReply, GatewayError>) -> State {
        let result = match outcome {
            Ok(reply) => RemoteResult::from_reply(reply, RemoteStatus::Eligible),
            Err(err) => {
                tracing::warn!(action = %Action::Withdraw, %err, "remote call failed");
                self.notice = Some(WITHDRAW_FAILED.to_string());
                return State::WithdrawalForm;
            }
        };
        let next = match result.status {
            _ if result.formalization_link.is_some() => State::ResultEligibleFormalized,
            RemoteStatus::Eligible => State::ResultEligibleOpen,
            RemoteStatus::PendingAuthorization => State::ResultPendingAuthorization,
            RemoteStatus::NotEligible => State::ResultNotEligible,
            RemoteStatus::Error => {
                self.failed_action = Some(Action::Withdraw);
                self.result = Some(RemoteResult {
                    message: result.message.or_else(|| Some(WITHDRAW_FAILED.to_string())),
                    ..result
                });
                return State::ResultError;
            }
            RemoteStatus::Unknown => {
                self.notice = Some(
                    result
                        .message
                        .unwrap_or_else(|| WITHDRAW_FAILED.to_string()),
                );
                return State::WithdrawalForm;
            }
        };
        self.draft = None;
        self.result = Some(result);
        next
    }

    fn dispatch(&mut self, action: Action, payload: Payload) -> Dispatch {
        self.generation += 1;
        let ticket = Ticket {
            generation: self.generation,
            action,
            request_id: Uuid::new_v4(),
        };
        self.pending = Some(ticket.clone());
        let next = match action {
            Action::Withdraw => State::Submitting,
            Action::Check | Action::Status => {
                self.result = None;
                self.failed_action = None;
                self.draft = None;
                State::Checking
            }
        };
        tracing::debug!(
            %action,
            generation = ticket.generation,
            request_id = %ticket.request_id,
            "dispatching remote call"
        );
        self.enter(next);
        Dispatch { ticket, payload }
    }

    fn guard(&self, trigger: Trigger, allowed: impl Fn(State) -> bool) -> Result<(), WorkflowError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(self.refuse(trigger))
        }
    }

    fn refuse(&self, trigger: Trigger) -> WorkflowError {
        if self.state.is_outstanding() {
            WorkflowError::Busy(self.state)
        } else {
            WorkflowError::NotAllowed {
                trigger,
                state: self.state,
            }
        }
    }

    fn enter(&mut self, next: State) {
        tracing::info!(from = %self.state, to = %next, "workflow transition");
        if self.history.len() >= HISTORY_LIMIT {
            let excess = self.history.len() + 1 - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        self.history.push(TransitionRecord {
            from: self.state,
            to: next,
            at: Utc::now(),
        });
        self.state = next;
    }
}

fn lookup(cpf: Identifier) -> Payload {
    Payload::Lookup(LookupPayload { cpf })
}

/// Message shown when a call fails before producing a usable reply.
pub fn failure_message(action: Action) -> &'static str {
    match action {
        Action::Check => CHECK_FAILED,
        Action::Status => STATUS_FAILED,
        Action::Withdraw => WITHDRAW_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AccountKind;

    const CPF: &str = "52998224725";

    fn reply(json: &str) -> Result<RemoteReply, GatewayError> {
        Ok(serde_json::from_str(json).unwrap())
    }

    fn eligible_open() -> Workflow {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"eligible","message":"ok","amount":1500.50}"#));
        assert_eq!(wf.state(), State::ResultEligibleOpen);
        wf
    }

    fn fill(wf: &mut Workflow, phone: &str) {
        let draft = wf.draft_mut().unwrap();
        draft.phone = phone.into();
        draft.bank = "001".into();
        draft.agency = "0001".into();
        draft.account = "123456-7".into();
        draft.account_kind = AccountKind::Checking;
    }

    #[test]
    fn starts_idle() {
        let wf = Workflow::new();
        assert_eq!(wf.state(), State::Idle);
        assert!(wf.result().is_none());
        assert!(wf.affordances().is_empty());
    }

    #[test]
    fn check_requires_valid_identifier() {
        let mut wf = Workflow::with_input("123.456.789-00");
        let err = wf.check().unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidIdentifier(_)));
        assert_eq!(wf.state(), State::Idle);
        assert!(wf.pending().is_none());
        assert!(wf.shows_invalid_hint());
    }

    #[test]
    fn check_enters_checking_and_blocks_other_triggers() {
        let mut wf = Workflow::with_input("529.982.247-25");
        let d = wf.check().unwrap();
        assert_eq!(wf.state(), State::Checking);
        assert_eq!(d.ticket.action, Action::Check);
        assert_eq!(
            d.payload,
            Payload::Lookup(LookupPayload {
                cpf: Identifier::parse(CPF).unwrap()
            })
        );

        assert_eq!(wf.check(), Err(WorkflowError::Busy(State::Checking)));
        assert_eq!(wf.check_status(), Err(WorkflowError::Busy(State::Checking)));
        assert_eq!(wf.submit_withdrawal(), Err(WorkflowError::Busy(State::Checking)));
        assert_eq!(wf.begin_withdrawal(), Err(WorkflowError::Busy(State::Checking)));
        assert_eq!(wf.state(), State::Checking);
        assert_eq!(wf.affordances(), vec![Trigger::Close]);
    }

    #[test]
    fn eligible_without_link_opens_withdrawal() {
        let mut wf = eligible_open();
        assert_eq!(wf.result().unwrap().amount, Some(1500.50));
        wf.begin_withdrawal().unwrap();
        assert_eq!(wf.state(), State::WithdrawalForm);
        assert!(wf.draft().is_some());
    }

    #[test]
    fn eligible_with_link_is_formalized() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        let r = wf.resolve(
            &d.ticket,
            reply(r#"{"status":"eligible","formalization_url":"https://x/y"}"#),
        );
        assert_eq!(r, Resolution::Applied(State::ResultEligibleFormalized));
        assert_eq!(wf.formalization_link().unwrap().as_str(), "https://x/y");
        assert!(matches!(
            wf.begin_withdrawal(),
            Err(WorkflowError::NotAllowed { .. })
        ));
    }

    #[test]
    fn pending_and_not_eligible_statuses() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"pending_authorization"}"#));
        assert_eq!(wf.state(), State::ResultPendingAuthorization);

        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"not_eligible","message":"nada"}"#));
        assert_eq!(wf.state(), State::ResultNotEligible);
        assert_eq!(wf.affordances(), vec![Trigger::Close]);
        assert!(wf.check_status().is_err());
    }

    #[test]
    fn view_instructions_leaves_state_unchanged() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"pending_authorization"}"#));
        let before = wf.history().len();
        wf.view_instructions().unwrap();
        assert_eq!(wf.state(), State::ResultPendingAuthorization);
        assert_eq!(wf.history().len(), before);

        let d = wf.check_status().unwrap();
        assert_eq!(d.ticket.action, Action::Status);
        assert_eq!(wf.state(), State::Checking);
        assert_eq!(wf.view_instructions(), Err(WorkflowError::Busy(State::Checking)));
    }

    #[test]
    fn transport_failure_maps_to_error_and_retry_reuses_action() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"pending_authorization"}"#));
        let d = wf.check_status().unwrap();
        wf.resolve(&d.ticket, Err(GatewayError::Http { status: 500 }));
        assert_eq!(wf.state(), State::ResultError);
        assert_eq!(wf.result().unwrap().message.as_deref(), Some(STATUS_FAILED));

        let d = wf.retry().unwrap();
        assert_eq!(d.ticket.action, Action::Status);
        assert_eq!(wf.state(), State::Checking);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"weird","message":"?"}"#));
        assert_eq!(wf.state(), State::ResultError);

        let d = wf.check().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"message":"no status"}"#));
        assert_eq!(wf.state(), State::ResultError);
        assert_eq!(wf.retry().unwrap().ticket.action, Action::Check);
    }

    #[test]
    fn short_phone_keeps_form_open() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "119988");
        let err = wf.submit_withdrawal().unwrap_err();
        assert_eq!(err, WorkflowError::Form(FormError::InvalidPhone { digits: 6 }));
        assert_eq!(wf.state(), State::WithdrawalForm);
        assert!(wf.pending().is_none());
    }

    #[test]
    fn submit_then_formalized_then_conclude() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11 99887-7665");
        let d = wf.submit_withdrawal().unwrap();
        assert_eq!(wf.state(), State::Submitting);
        assert!(matches!(d.payload, Payload::Withdraw(ref w) if w.phone == "11998877665"));
        assert_eq!(wf.close(), Err(WorkflowError::Busy(State::Submitting)));

        let r = wf.resolve(
            &d.ticket,
            reply(r#"{"status":"eligible","formalization_url":"https://x/y"}"#),
        );
        assert_eq!(r, Resolution::Applied(State::ResultEligibleFormalized));
        assert!(wf.draft().is_none());

        let d = wf.check_status().unwrap();
        assert_eq!(d.ticket.action, Action::Status);
        assert_eq!(wf.state(), State::Checking);
    }

    #[test]
    fn submit_without_status_defaults_to_eligible() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11998877665");
        let d = wf.submit_withdrawal().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"message":"recebido"}"#));
        assert_eq!(wf.state(), State::ResultEligibleOpen);
        assert_eq!(wf.result().unwrap().message.as_deref(), Some("recebido"));
    }

    #[test]
    fn submit_failure_returns_to_form_with_draft() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11998877665");
        let d = wf.submit_withdrawal().unwrap();
        let r = wf.resolve(&d.ticket, Err(GatewayError::Malformed("x".into())));
        assert_eq!(r, Resolution::Applied(State::WithdrawalForm));
        assert_eq!(wf.notice(), Some(WITHDRAW_FAILED));
        assert_eq!(wf.draft().unwrap().bank, "001");
        assert_eq!(wf.result().unwrap().status, RemoteStatus::Eligible);

        // retry from the form
        let d = wf.submit_withdrawal().unwrap();
        assert!(wf.notice().is_none());
        wf.resolve(&d.ticket, reply(r#"{"status":"em_analise","message":"aguarde"}"#));
        assert_eq!(wf.state(), State::WithdrawalForm);
        assert_eq!(wf.notice(), Some("aguarde"));
    }

    #[test]
    fn withdraw_error_status_shows_error_result() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11998877665");
        let d = wf.submit_withdrawal().unwrap();
        let r = wf.resolve(&d.ticket, reply(r#"{"status":"error","message":"conta invalida"}"#));
        assert_eq!(r, Resolution::Applied(State::ResultError));
        let result = wf.result().unwrap();
        assert_eq!(result.status, RemoteStatus::Error);
        assert_eq!(result.message.as_deref(), Some("conta invalida"));
        assert!(wf.notice().is_none());
        assert_eq!(wf.affordances(), vec![Trigger::Retry, Trigger::Close]);

        // retry re-runs the balance check and the form reopens pre-filled
        let d = wf.retry().unwrap();
        assert_eq!(d.ticket.action, Action::Check);
        assert!(matches!(d.payload, Payload::Lookup(_)));
        assert_eq!(wf.state(), State::Checking);
        wf.resolve(&d.ticket, reply(r#"{"status":"eligible","amount":10}"#));
        wf.begin_withdrawal().unwrap();
        assert_eq!(wf.draft().unwrap().phone, "11998877665");
    }

    #[test]
    fn withdraw_error_status_without_message_uses_default() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11998877665");
        let d = wf.submit_withdrawal().unwrap();
        wf.resolve(&d.ticket, reply(r#"{"status":"error"}"#));
        assert_eq!(wf.state(), State::ResultError);
        assert_eq!(wf.result().unwrap().message.as_deref(), Some(WITHDRAW_FAILED));
    }

    #[test]
    fn cancel_withdrawal_returns_to_result() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        fill(&mut wf, "11998877665");
        wf.cancel_withdrawal().unwrap();
        assert_eq!(wf.state(), State::ResultEligibleOpen);
        wf.begin_withdrawal().unwrap();
        assert_eq!(wf.draft().unwrap().phone, "11998877665");
    }

    #[test]
    fn close_discards_result_and_keeps_input() {
        let mut wf = eligible_open();
        wf.close().unwrap();
        assert_eq!(wf.state(), State::Idle);
        assert!(wf.result().is_none());
        assert_eq!(wf.input(), CPF);
        assert!(matches!(wf.close(), Err(WorkflowError::NotAllowed { .. })));
    }

    #[test]
    fn stale_response_after_close_is_dropped() {
        let mut wf = Workflow::with_input(CPF);
        let first = wf.check().unwrap();
        wf.close().unwrap();
        let second = wf.check().unwrap();

        assert_eq!(
            wf.resolve(&first.ticket, reply(r#"{"status":"not_eligible"}"#)),
            Resolution::Stale
        );
        assert_eq!(wf.state(), State::Checking);

        let r = wf.resolve(&second.ticket, reply(r#"{"status":"eligible"}"#));
        assert_eq!(r, Resolution::Applied(State::ResultEligibleOpen));
        assert_eq!(
            wf.resolve(&second.ticket, reply(r#"{"status":"not_eligible"}"#)),
            Resolution::Stale
        );
    }

    #[test]
    fn status_shortcut_from_idle_uses_input() {
        let mut wf = Workflow::with_input(CPF);
        let d = wf.check_status().unwrap();
        assert_eq!(d.ticket.action, Action::Status);
        assert_eq!(wf.subject().unwrap().digits(), CPF);
    }

    #[test]
    fn history_records_transitions() {
        let mut wf = eligible_open();
        wf.begin_withdrawal().unwrap();
        let path: Vec<_> = wf.history().iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![State::Checking, State::ResultEligibleOpen, State::WithdrawalForm]
        );
        assert_eq!(wf.history()[0].from, State::Idle);
    }

    #[test]
    fn history_keeps_only_recent_transitions() {
        let mut wf = Workflow::with_input("52998224725");
        for _ in 0..HISTORY_LIMIT {
            wf.check().unwrap();
            wf.close().unwrap();
        }
        assert_eq!(wf.history().len(), HISTORY_LIMIT);
        let last = wf.history().last().unwrap();
        assert_eq!((last.from, last.to), (State::Checking, State::Idle));
    }

    #[test]
    fn state_display() {
        assert_eq!(State::Idle.to_string(), "IDLE");
        assert_eq!(
            State::ResultPendingAuthorization.to_string(),
            "RESULT_PENDING_AUTHORIZATION"
        );
        assert_eq!(Trigger::BeginWithdrawal.to_string(), "begin withdrawal");
    }
}
