//! Core data type definitions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned account identifier
pub type AccountId = i64;

/// Smallest opening deposit the client will submit.
pub const MINIMUM_OPENING_DEPOSIT: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Opaque bearer token proving the caller's identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: Credential,
    pub subject_email: String,
    pub display_name: String,
}

/// Shape of the persisted session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub access_token: String,
    pub email: String,
    pub full_name: String,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.credential.expose().to_string(),
            email: session.subject_email.clone(),
            full_name: session.display_name.clone(),
        }
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            credential: Credential::new(record.access_token),
            subject_email: record.email,
            display_name: record.full_name,
        }
    }
}

/// Supported account products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "savings")]
    Savings,
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "fd", alias = "fixed_deposit", alias = "fixedDeposit")]
    FixedDeposit,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [
        AccountType::Savings,
        AccountType::Current,
        AccountType::FixedDeposit,
    ];

    /// Value sent to and received from the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Current => "current",
            AccountType::FixedDeposit => "fd",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "current" => Ok(AccountType::Current),
            "fd" | "fixed_deposit" | "fixeddeposit" | "fixed-deposit" => {
                Ok(AccountType::FixedDeposit)
            }
            _ => Err(format!("Unsupported account type: {}", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Locked,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountStatus::Active => "active",
            AccountStatus::Locked => "locked",
            AccountStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// An account as reported by the ledger. Never edited locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub status: AccountStatus,
}

/// Body of `POST /accounts/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountRequest {
    pub account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_deposit: Decimal,
}

/// A validated transfer. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_number: String,
    pub amount: Decimal,
}

/// Body of `POST /accounts/{id}/transfer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBody {
    pub to_account_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl From<&TransferRequest> for TransferBody {
    fn from(request: &TransferRequest) -> Self {
        Self {
            to_account_number: request.destination_account_number.clone(),
            amount: request.amount,
        }
    }
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Response of `POST /auth/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Renders an amount the way balances are shown to the user.
pub fn format_currency(amount: Decimal) -> String {
    format!("${:.2}", amount)
}
