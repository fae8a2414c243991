//! IBAN Handling
//!
//! Checksum-verified account numbers for the external account identifier.
//! Validation implements the ISO 13616 mod-97 check; generation produces
//! valid German IBANs for newly opened accounts.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// German IBAN length: DE + 2 check digits + 8 bank code + 10 account number.
const DE_LEN: usize = 22;

/// A validated IBAN, stored in compact (no spaces, uppercase) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban(String);

impl Iban {
    /// Parse and checksum-verify an IBAN string. Spaces are ignored.
    pub fn parse(input: &str) -> Result<Self, BankError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if compact.is_empty() {
            return Err(BankError::InvalidAccountNumber("empty".into()));
        }
        if compact.len() < 15 || compact.len() > 34 {
            return Err(BankError::InvalidAccountNumber(format!(
                "invalid length {}",
                compact.len()
            )));
        }
        if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BankError::InvalidAccountNumber(
                "invalid characters".into(),
            ));
        }
        let country = &compact[..2];
        if !country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BankError::InvalidAccountNumber(
                "invalid country code".into(),
            ));
        }
        if country == "DE" && compact.len() != DE_LEN {
            return Err(BankError::InvalidAccountNumber(format!(
                "German IBAN must be {DE_LEN} characters"
            )));
        }
        if mod97(&compact) != 1 {
            return Err(BankError::InvalidAccountNumber("checksum failed".into()));
        }
        Ok(Iban(compact))
    }

    /// Generate a valid random German IBAN for a newly opened account.
    pub fn generate_de<R: Rng>(rng: &mut R) -> Self {
        let bank_code: String = (0..8).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
        let account: String = (0..10).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
        let bban = format!("{bank_code}{account}");
        // Check digits chosen so the rearranged number is ≡ 1 (mod 97).
        let check = 98 - mod97(&format!("DE00{bban}"));
        Iban(format!("DE{check:02}{bban}"))
    }

    /// Compact uppercase form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Grouped in blocks of four for display.
    pub fn formatted(&self) -> String {
        group_by_four(&self.0)
    }

    /// Masked for display: country code and last four characters visible.
    pub fn masked(&self) -> String {
        if self.0.len() < 6 {
            return self.0.clone();
        }
        let masked: String = self
            .0
            .chars()
            .enumerate()
            .map(|(i, c)| if i < 2 || i >= self.0.len() - 4 { c } else { '•' })
            .collect();
        group_by_four(&masked)
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Iban {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Iban::parse(s)
    }
}

impl TryFrom<String> for Iban {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Iban::parse(&value)
    }
}

impl From<Iban> for String {
    fn from(value: Iban) -> Self {
        value.0
    }
}

fn group_by_four(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(4)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// ISO 13616 checksum: move the first four characters to the end, map letters
/// to 10..35, and reduce the resulting digit string mod 97 incrementally.
fn mod97(iban: &str) -> u32 {
    let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
    let mut rem: u32 = 0;
    for c in rearranged.chars() {
        if let Some(d) = c.to_digit(10) {
            rem = (rem * 10 + d) % 97;
        } else {
            let v = c as u32 - 'A' as u32 + 10;
            rem = (rem * 100 + v) % 97;
        }
    }
    rem
}
