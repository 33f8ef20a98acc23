use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{AccountKind, WithdrawPayload};
use crate::identifier::{CPF_LEN, Identifier, only_digits};

/// Minimum phone length: area code plus subscriber number.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Presence/length failures in the withdrawal form. Never sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Telefone inválido: informe DDD + número ({digits} dígitos informados).")]
    InvalidPhone { digits: usize },

    #[error("Dados bancários: preencha banco, agência e conta.")]
    MissingBankDetails,
}

/// Raw contents of the withdrawal form, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalDraft {
    pub phone: String,
    pub bank: String,
    pub agency: String,
    pub account: String,
    pub account_kind: AccountKind,
}

impl WithdrawalDraft {
    /// Checks the form and produces a submittable request.
    pub fn validate(&self) -> Result<WithdrawalRequest, FormError> {
        let phone_digits = only_digits(&self.phone);
        if phone_digits.len() < MIN_PHONE_DIGITS {
            return Err(FormError::InvalidPhone {
                digits: phone_digits.len(),
            });
        }

        let bank = self.bank.trim();
        let agency = self.agency.trim();
        let account = self.account.trim();
        if bank.is_empty() || agency.is_empty() || account.is_empty() {
            return Err(FormError::MissingBankDetails);
        }

        Ok(WithdrawalRequest {
            phone_digits,
            bank_code: bank.to_string(),
            agency_code: agency.to_string(),
            account_number: account.to_string(),
            account_kind: self.account_kind,
        })
    }
}

/// Validated payout instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub phone_digits: String,
    pub bank_code: String,
    pub agency_code: String,
    pub account_number: String,
    pub account_kind: AccountKind,
}

impl WithdrawalRequest {
    /// Builds the wire payload; the phone is left-padded with zeros to 11 digits.
    pub fn into_payload(self, cpf: Identifier) -> WithdrawPayload {
        WithdrawPayload {
            cpf,
            phone: format!("{:0>width$}", self.phone_digits, width = CPF_LEN),
            bank: self.bank_code,
            agency: self.agency_code,
            account: self.account_number,
            account_type: self.account_kind,
        }
    }
}
