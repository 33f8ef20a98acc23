use anyhow::{Result, bail};
use clap::Parser;

use granacred::cli::{Cli, Command};
use granacred::config::GranaConfig;
use granacred::deeplink::SystemOpener;
use granacred::gateway::{Action, AccountKind, WebhookClient};
use granacred::session::{FileSessionStore, Session};
use granacred::ui::{self, CallProgress};
use granacred::workflow::{State, WorkflowError};
use granacred::{AppError, WorkflowOrchestrator, identifier, telemetry};

type Orchestrator = WorkflowOrchestrator<WebhookClient, FileSessionStore>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let config = GranaConfig::load()?;

    match cli.command {
        Command::Validate { cpf } => {
            if identifier::validate(&cpf) {
                println!("CPF válido: {}", identifier::only_digits(&cpf));
            } else {
                bail!("CPF inválido: confira o número informado.");
            }
        }
        Command::Check { cpf, open } => {
            let mut orch = build(&config, cpf.as_deref())?;
            dispatch(&mut orch, Action::Check).await?;
            after_result(&orch, open);
        }
        Command::Status { cpf, open } => {
            let mut orch = build(&config, cpf.as_deref())?;
            if !orch.session().is_remembered() {
                bail!("Consulte o saldo antes de acompanhar o status da proposta.");
            }
            dispatch(&mut orch, Action::Status).await?;
            after_result(&orch, open);
        }
        Command::Withdraw {
            cpf,
            phone,
            bank,
            agency,
            account,
            account_type,
            open,
        } => {
            let mut orch = build(&config, cpf.as_deref())?;
            dispatch(&mut orch, Action::Check).await?;
            if orch.workflow().state() != State::ResultEligibleOpen {
                bail!("Saque indisponível para este CPF no momento.");
            }

            orch.workflow_mut().begin_withdrawal()?;
            if let Some(draft) = orch.workflow_mut().draft_mut() {
                draft.phone = phone;
                draft.bank = bank;
                draft.agency = agency;
                draft.account = account;
                draft.account_kind = AccountKind::from(account_type);
            }
            dispatch(&mut orch, Action::Withdraw).await?;
            if let Some(notice) = orch.workflow().notice() {
                bail!("{notice}");
            }
            after_result(&orch, open);
        }
        Command::Session => {
            let session = Session::restore(&FileSessionStore::new(&config.session_file));
            match session.identifier() {
                Some(id) => {
                    println!("CPF lembrado: {}", id.formatted());
                    for shortcut in session.shortcuts() {
                        println!("  • {}", ui::shortcut_label(shortcut));
                    }
                }
                None => println!("Nenhum CPF lembrado."),
            }
        }
        Command::Forget => {
            let mut orch = build_unchecked(&config)?;
            orch.forget_session()?;
            println!("CPF esquecido.");
        }
        Command::Support => {
            let orch = build_unchecked(&config)?;
            if let Err(err) = orch.contact_support(&SystemOpener) {
                ui::print_error(&format!("Não foi possível abrir o WhatsApp: {err}"));
            }
        }
        Command::Share => {
            let orch = build_unchecked(&config)?;
            if let Err(err) = orch.indicate_and_earn(&SystemOpener) {
                ui::print_error(&format!("Não foi possível abrir o WhatsApp: {err}"));
            }
        }
    }

    Ok(())
}

fn build_unchecked(config: &GranaConfig) -> Result<Orchestrator> {
    let client = WebhookClient::with_timeouts(
        config.webhook_url.clone(),
        config.connect_timeout(),
        config.request_timeout(),
    )?;
    let store = FileSessionStore::new(&config.session_file);
    Ok(WorkflowOrchestrator::new(client, store, config))
}

/// Builds the orchestrator with the given CPF, or the remembered one.
fn build(config: &GranaConfig, cpf: Option<&str>) -> Result<Orchestrator> {
    let mut orch = build_unchecked(config)?;
    match cpf {
        Some(raw) => orch.workflow_mut().set_input(raw),
        None if orch.session().is_remembered() => {}
        None => return Err(AppError::NoIdentifier.into()),
    }
    Ok(orch)
}

async fn dispatch(orch: &mut Orchestrator, action: Action) -> Result<(), WorkflowError> {
    let progress = CallProgress::start(action);
    let outcome = match action {
        Action::Check => orch.check().await,
        Action::Status => orch.check_status().await,
        Action::Withdraw => orch.submit_withdrawal().await,
    };
    match outcome {
        Ok(resolution) => {
            progress.finish(resolution, orch.workflow());
            Ok(())
        }
        Err(err) => {
            progress.finish_silently();
            Err(err)
        }
    }
}

fn after_result(orch: &Orchestrator, open: bool) {
    match orch.workflow().state() {
        State::ResultPendingAuthorization => {
            if let Ok(url) = orch.instructions() {
                println!("  Passos para autorizar: {url}");
            }
        }
        State::ResultEligibleFormalized if open => {
            if let Err(err) = orch.open_formalization(&SystemOpener) {
                ui::print_error(&format!("Não foi possível abrir a formalização: {err}"));
            }
        }
        _ => {}
    }
}
