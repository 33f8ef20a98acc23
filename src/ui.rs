//! Interface de terminal do GranaCred: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner enquanto uma chamada remota está
//! pendente e `console` para estilização. As funções de formatação são puras
//! para que o texto exibido possa ser testado.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::gateway::{Action, RemoteStatus};
use crate::session::Shortcut;
use crate::workflow::{Resolution, State, Trigger, Workflow};

/// Título do popup para cada status.
pub fn headline(status: Option<RemoteStatus>) -> &'static str {
    match status {
        Some(RemoteStatus::Eligible) => "Saldo disponível",
        Some(RemoteStatus::PendingAuthorization) => "Autorização necessária",
        Some(RemoteStatus::NotEligible) => "Sem saldo no momento",
        _ => "Aviso",
    }
}

/// Maior valor exibido; acima dele os centavos deixam de ser exatos em `f64`.
pub const MAX_BRL_AMOUNT: f64 = 10_000_000_000_000.0;

/// Formata um valor como moeda brasileira: `R$ 1.500,50`.
///
/// Valores acima de [`MAX_BRL_AMOUNT`] são limitados a ele.
pub fn format_brl(amount: f64) -> String {
    let cents = (amount.clamp(0.0, MAX_BRL_AMOUNT) * 100.0).round() as u64;
    let (reais, centavos) = (cents / 100, cents % 100);

    let digits = reais.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("R$ {grouped},{centavos:02}")
}

/// Rótulo do botão de cada gatilho, no contexto do estado atual.
pub fn trigger_label(trigger: Trigger, state: State) -> &'static str {
    match trigger {
        Trigger::Check => "Consultar saldo",
        Trigger::Status if state == State::ResultPendingAuthorization => {
            "Já autorizei (reverificar)"
        }
        Trigger::Status if state == State::ResultEligibleFormalized => "Concluir",
        Trigger::Status => "Consultar status da proposta",
        Trigger::Retry => "Tentar novamente",
        Trigger::BeginWithdrawal | Trigger::SubmitWithdrawal => "Sacar",
        Trigger::CancelWithdrawal => "Voltar",
        Trigger::OpenFormalization => "Abrir formalização",
        Trigger::ViewInstructions => "Passos para autorizar",
        Trigger::Close => "Fechar",
    }
}

pub fn shortcut_label(shortcut: Shortcut) -> &'static str {
    match shortcut {
        Shortcut::CheckBalance => "Consultar saldo",
        Shortcut::CheckStatus => "Consultar status da proposta",
        Shortcut::IndicateAndEarn => "Indique e ganhe",
    }
}

/// Linhas do popup de resultado (ou do formulário) para o estado atual.
pub fn render(workflow: &Workflow) -> Vec<String> {
    let state = workflow.state();
    let mut lines = Vec::new();

    match state {
        State::Idle => {
            lines.push("Seja bem-vindo à GranaCred".to_string());
            if workflow.shows_invalid_hint() {
                lines.push("CPF inválido: confira o número informado.".to_string());
            }
        }
        State::Checking => lines.push("Consultando...".to_string()),
        State::Submitting => lines.push("Enviando saque...".to_string()),
        State::WithdrawalForm => {
            lines.push("Dados para saque".to_string());
            if let Some(notice) = workflow.notice() {
                lines.push(notice.to_string());
            }
        }
        _ => {
            let result = workflow.result();
            lines.push(headline(result.map(|r| r.status)).to_string());
            lines.push(
                result
                    .and_then(|r| r.message.clone())
                    .unwrap_or_else(|| "—".to_string()),
            );
            if let Some(amount) = result.and_then(|r| r.amount) {
                lines.push(format!("Valor: {}", format_brl(amount)));
            }
            if let Some(link) = result.and_then(|r| r.formalization_link.as_ref()) {
                lines.push(format!("Formalização: {link}"));
            }
        }
    }

    let labels: Vec<&str> = workflow
        .affordances()
        .into_iter()
        .map(|t| trigger_label(t, state))
        .collect();
    if !labels.is_empty() {
        lines.push(format!("[{}]", labels.join("] [")));
    }
    lines
}

/// Indicador visual enquanto uma chamada remota está pendente.
pub struct CallProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl CallProgress {
    /// Inicia o spinner para a ação fornecida.
    pub fn start(action: Action) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(match action {
            Action::Check => "Consultando saldo...",
            Action::Status => "Consultando status da proposta...",
            Action::Withdraw => "Enviando saque...",
        });
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Remove o spinner sem imprimir nada (gatilho recusado).
    pub fn finish_silently(&self) {
        self.pb.finish_and_clear();
    }

    /// Finaliza o spinner e imprime o popup resultante.
    pub fn finish(&self, resolution: Resolution, workflow: &Workflow) {
        self.pb.finish_and_clear();
        let style = match workflow.state() {
            State::ResultEligibleOpen | State::ResultEligibleFormalized => &self.green,
            State::ResultError | State::ResultNotEligible => &self.red,
            _ => &self.yellow,
        };
        if resolution == Resolution::Stale {
            println!("  {}", self.yellow.apply_to("Resposta descartada (consulta antiga)."));
            return;
        }
        print_lines(style, &render(workflow));
    }
}

pub fn print_error(message: &str) {
    eprintln!("  {} {message}", Style::new().red().bold().apply_to("✗"));
}

fn print_lines(title_style: &Style, lines: &[String]) {
    let mut iter = lines.iter();
    if let Some(title) = iter.next() {
        println!("{}", title_style.apply_to(format!("─── {title} ───")));
    }
    for line in iter {
        println!("  {line}");
    }
}
