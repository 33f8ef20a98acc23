//! Validação do CPF, o identificador fiscal usado como chave de todas as ações remotas.
//!
//! [`validate`] é o predicado estrito usado para liberar ou bloquear o envio;
//! [`Identifier`] é a forma tipada que só pode ser construída a partir de um
//! CPF válido.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a CPF.
pub const CPF_LEN: usize = 11;

/// Motivo pelo qual um CPF foi rejeitado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("CPF must have 11 digits, found {0}")]
    WrongLength(usize),

    #[error("CPF cannot repeat a single digit")]
    RepeatedDigits,

    #[error("CPF check digit {position} does not match")]
    CheckDigitMismatch { position: usize },
}

/// Removes every non-digit character from raw input.
pub fn only_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Returns `true` only when `raw` is a well-formed CPF.
pub fn validate(raw: &str) -> bool {
    check(&only_digits(raw)).is_ok()
}

/// Whether the input field should be flagged: something was typed and it is not valid.
pub fn shows_invalid_hint(raw: &str) -> bool {
    !raw.is_empty() && !validate(raw)
}

// Weighted-sum check digit; remainders 10 and 11 collapse to 0.
fn check_digit(digits: &[u32], first_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip((2..=first_weight).rev())
        .map(|(d, w)| d * w)
        .sum();
    match (sum * 10) % 11 {
        10 | 11 => 0,
        r => r,
    }
}

fn check(digits: &str) -> Result<(), IdentifierError> {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if values.len() != CPF_LEN {
        return Err(IdentifierError::WrongLength(values.len()));
    }
    if values.iter().all(|d| *d == values[0]) {
        return Err(IdentifierError::RepeatedDigits);
    }
    if check_digit(&values[..9], 10) != values[9] {
        return Err(IdentifierError::CheckDigitMismatch { position: 10 });
    }
    if check_digit(&values[..10], 11) != values[10] {
        return Err(IdentifierError::CheckDigitMismatch { position: 11 });
    }
    Ok(())
}

/// A CPF that passed validation, stored as its 11 bare digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Normalizes `raw` and validates it.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let digits = only_digits(raw);
        check(&digits)?;
        Ok(Self(digits))
    }

    /// The bare digits, as sent to the remote service.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Masked form `XXX.XXX.XXX-XX` for display.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "52998224725";

    #[test]
    fn known_valid_cpf_is_accepted() {
        assert!(validate(VALID));
        assert!(validate("11144477735"));
    }

    #[test]
    fn separators_are_ignored() {
        assert!(validate("529.982.247-25"));
        assert_eq!(validate("529.982.247-25"), validate(VALID));
        assert!(validate(" 529 982 247 25 "));
    }

    #[test]
    fn repeated_digits_are_rejected() {
        for d in 0..=9 {
            let s: String = std::iter::repeat_n(char::from(b'0' + d), 11).collect();
            assert!(!validate(&s), "{s} should be rejected");
        }
        assert_eq!(
            Identifier::parse("111.111.111-11"),
            Err(IdentifierError::RepeatedDigits)
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(!validate(""));
        assert!(!validate("5299822472"));
        assert!(!validate("529982247250"));
        assert_eq!(
            Identifier::parse("123"),
            Err(IdentifierError::WrongLength(3))
        );
    }

    #[test]
    fn editing_a_check_digit_fails() {
        for pos in [9, 10] {
            for replacement in 0..=9u8 {
                let mut bytes = VALID.as_bytes().to_vec();
                let replacement = b'0' + replacement;
                if bytes[pos] == replacement {
                    continue;
                }
                bytes[pos] = replacement;
                let s = String::from_utf8(bytes).unwrap();
                assert!(!validate(&s), "{s} should fail");
            }
        }
    }

    #[test]
    fn editing_a_body_digit_fails() {
        let mut bytes = VALID.as_bytes().to_vec();
        bytes[0] = b'6';
        let s = String::from_utf8(bytes).unwrap();
        assert!(matches!(
            Identifier::parse(&s),
            Err(IdentifierError::CheckDigitMismatch { .. })
        ));
    }

    #[test]
    fn invalid_hint_needs_typed_input() {
        assert!(!shows_invalid_hint(""));
        assert!(shows_invalid_hint("5"));
        assert!(!shows_invalid_hint("529.982.247-25"));
    }

    #[test]
    fn identifier_formats_and_serializes() {
        let id = Identifier::parse("529.982.247-25").unwrap();
        assert_eq!(id.digits(), VALID);
        assert_eq!(id.formatted(), "529.982.247-25");
        assert_eq!(id.to_string(), VALID);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"52998224725\"");
        assert!(serde_json::from_str::<Identifier>("\"11111111111\"").is_err());
    }
}
