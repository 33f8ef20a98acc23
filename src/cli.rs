//! Interface de linha de comando do GranaCred baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (validate, check,
//! status, withdraw, session, forget, support, share) e a flag global
//! `--verbose`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::gateway::AccountKind;

/// GranaCred: seu FGTS na palma da mão.
#[derive(Debug, Parser)]
#[command(name = "granacred", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita logs detalhados no stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de conta aceito pela CLI, mapeado para [`AccountKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AccountArg {
    /// Conta corrente.
    Corrente,
    /// Conta poupança.
    Poupanca,
}

impl From<AccountArg> for AccountKind {
    fn from(arg: AccountArg) -> Self {
        match arg {
            AccountArg::Corrente => AccountKind::Checking,
            AccountArg::Poupanca => AccountKind::Savings,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Valida um CPF localmente, sem consultar o serviço.
    Validate {
        cpf: String,
    },

    /// Consulta o saldo disponível.
    Check {
        /// CPF a consultar; usa o CPF lembrado se omitido.
        cpf: Option<String>,

        /// Abre o link de formalização, se houver.
        #[arg(long)]
        open: bool,
    },

    /// Consulta o status da proposta.
    Status {
        /// CPF a consultar; usa o CPF lembrado se omitido.
        cpf: Option<String>,

        /// Abre o link de formalização, se houver.
        #[arg(long)]
        open: bool,
    },

    /// Consulta o saldo e, se disponível, solicita o saque.
    Withdraw {
        /// CPF do titular; usa o CPF lembrado se omitido.
        #[arg(long)]
        cpf: Option<String>,

        /// Telefone com DDD.
        #[arg(long)]
        phone: String,

        /// Código do banco (ex.: 001, 237).
        #[arg(long)]
        bank: String,

        /// Agência.
        #[arg(long)]
        agency: String,

        /// Conta com dígito.
        #[arg(long)]
        account: String,

        /// Tipo de conta.
        #[arg(long, value_enum, default_value = "corrente")]
        account_type: AccountArg,

        /// Abre o link de formalização retornado.
        #[arg(long)]
        open: bool,
    },

    /// Mostra a sessão lembrada e os atalhos disponíveis.
    Session,

    /// Esquece o CPF lembrado.
    Forget,

    /// Abre o atendimento no WhatsApp.
    Support,

    /// Indique e ganhe: compartilha o app pelo WhatsApp.
    Share,
}
