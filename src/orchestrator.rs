use tracing::Instrument;

use crate::config::GranaConfig;
use crate::deeplink::{DeepLinkError, DeepLinker, REFERRAL_MESSAGE, share_link};
use crate::error::AppError;
use crate::gateway::{Action, RemoteGateway};
use crate::session::{Session, SessionError, SessionStore};
use crate::workflow::{Dispatch, Resolution, State, Trigger, Workflow, WorkflowError};

/// Drives the workflow against a gateway and a session store.
///
/// Each dispatching trigger performs its one remote call and resolves it
/// before returning, so at most one call is ever outstanding.
pub struct WorkflowOrchestrator<G, S> {
    gateway: G,
    store: S,
    session: Session,
    workflow: Workflow,
    whatsapp_url: String,
    howto_image_url: String,
}

impl<G: RemoteGateway, S: SessionStore> WorkflowOrchestrator<G, S> {
    /// Restores the session and pre-fills the identifier when one is remembered.
    pub fn new(gateway: G, store: S, config: &GranaConfig) -> Self {
        let session = Session::restore(&store);
        let workflow = match session.identifier() {
            Some(id) => Workflow::with_input(id.digits()),
            None => Workflow::new(),
        };
        Self {
            gateway,
            store,
            session,
            workflow,
            whatsapp_url: config.whatsapp_url.clone(),
            howto_image_url: config.howto_image_url.clone(),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Direct access for non-dispatching triggers (input edits, form, close).
    pub fn workflow_mut(&mut self) -> &mut Workflow {
        &mut self.workflow
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn check(&mut self) -> Result<Resolution, WorkflowError> {
        let dispatch = self.workflow.check()?;
        Ok(self.run(dispatch).await)
    }

    /// Status re-check. From `Idle` this is the remembered-session shortcut,
    /// refused when no identifier is remembered.
    pub async fn check_status(&mut self) -> Result<Resolution, WorkflowError> {
        let state = self.workflow.state();
        if state == State::Idle && !self.session.is_remembered() {
            return Err(WorkflowError::NotAllowed {
                trigger: Trigger::Status,
                state,
            });
        }
        let dispatch = self.workflow.check_status()?;
        Ok(self.run(dispatch).await)
    }

    pub async fn retry(&mut self) -> Result<Resolution, WorkflowError> {
        let dispatch = self.workflow.retry()?;
        Ok(self.run(dispatch).await)
    }

    pub async fn submit_withdrawal(&mut self) -> Result<Resolution, WorkflowError> {
        let dispatch = self.workflow.submit_withdrawal()?;
        Ok(self.run(dispatch).await)
    }

    async fn run(&mut self, dispatch: Dispatch) -> Resolution {
        let Dispatch { ticket, payload } = dispatch;
        let span = tracing::info_span!(
            "remote_call",
            action = %ticket.action,
            request_id = %ticket.request_id
        );
        let outcome = self
            .gateway
            .send(ticket.action, &payload)
            .instrument(span)
            .await;
        let reached_server = outcome.is_ok();
        let resolution = self.workflow.resolve(&ticket, outcome);

        if ticket.action == Action::Check
            && reached_server
            && resolution != Resolution::Stale
        {
            self.remember_subject();
        }
        resolution
    }

    // Persistence failure only costs the shortcut; the workflow carries on.
    fn remember_subject(&mut self) {
        let Some(id) = self.workflow.subject().cloned() else {
            return;
        };
        if let Err(err) = self.session.remember(&mut self.store, &id) {
            tracing::warn!(%err, "could not persist remembered CPF");
        }
    }

    /// The how-to image for the authorization overlay.
    pub fn instructions(&self) -> Result<&str, WorkflowError> {
        self.workflow.view_instructions()?;
        Ok(&self.howto_image_url)
    }

    pub fn open_formalization(&self, linker: &impl DeepLinker) -> Result<(), AppError> {
        let link = self.workflow.formalization_link()?;
        linker.open(link.as_str())?;
        Ok(())
    }

    pub fn contact_support(&self, linker: &impl DeepLinker) -> Result<(), DeepLinkError> {
        linker.open(&self.whatsapp_url)
    }

    /// Opens the referral share link ("Indique e ganhe").
    pub fn indicate_and_earn(&self, linker: &impl DeepLinker) -> Result<(), DeepLinkError> {
        let url = share_link(&self.whatsapp_url, REFERRAL_MESSAGE)?;
        linker.open(url.as_str())
    }

    pub fn forget_session(&mut self) -> Result<(), SessionError> {
        self.session.forget(&mut self.store)
    }
}
