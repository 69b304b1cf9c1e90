//! Session store
//!
//! Owns the authenticated identity. The persisted record is the single
//! source of truth: [`SessionStore::current_session`] reads it on every
//! call, so a login or logout from another handle is observed at once.

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use smartbank_core::{
    log_operation_error, log_operation_start, log_operation_success, BankError, BankResult,
    Credential, ErrorContext, LedgerGateway, RecordStore, RegistrationRequest, Session,
    SessionRecord,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Well-known key of the persisted session record
pub const SESSION_RECORD_KEY: &str = "user";

pub const REGISTRATION_SUCCESS_MESSAGE: &str = "Registration successful! You can now log in.";

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
}

/// Handle to the authenticated identity. Cheap to clone; clones share the
/// same record store.
#[derive(Clone)]
pub struct SessionStore {
    records: Arc<dyn RecordStore>,
    gateway: Arc<dyn LedgerGateway>,
}

impl SessionStore {
    pub fn new(records: Arc<dyn RecordStore>, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { records, gateway }
    }

    /// Create a user on the ledger. Does not log in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> BankResult<&'static str> {
        log_operation_start!("register", email = %email);

        let request = RegistrationRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
        };

        self.gateway
            .register(&request)
            .await
            .map_err(|e| as_auth_error(e, "register"))
            .inspect_err(|e| {
                log_operation_error!("register", e);
            })?;

        log_operation_success!("register", email = %email);
        Ok(REGISTRATION_SUCCESS_MESSAGE)
    }

    /// Exchange credentials for a bearer token and persist the session.
    pub async fn login(&self, email: &str, password: &str) -> BankResult<Session> {
        log_operation_start!("login", email = %email);

        let token = self
            .gateway
            .issue_token(email, password)
            .await
            .map_err(|e| as_auth_error(e, "login"))
            .inspect_err(|e| {
                log_operation_error!("login", e);
            })?;

        if token.access_token.is_empty() {
            return Err(BankError::Authentication {
                message: "Login response did not include an access token".to_string(),
                context: ErrorContext::new("session_store").with_operation("login"),
            });
        }

        let subject_email = decode_subject(&token.access_token)?;
        let display_name = token
            .full_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| subject_email.clone());

        let session = Session {
            credential: Credential::new(token.access_token),
            subject_email,
            display_name,
        };

        let record = serde_json::to_string(&SessionRecord::from(&session))?;
        self.records.save(SESSION_RECORD_KEY, &record)?;

        log_operation_success!("login", email = %session.subject_email);
        Ok(session)
    }

    /// Forget the persisted session. Succeeds when there is none.
    pub fn logout(&self) -> BankResult<()> {
        self.records.remove(SESSION_RECORD_KEY)?;
        debug!("Session record cleared");
        Ok(())
    }

    /// The persisted session, if a well-formed record exists.
    pub fn current_session(&self) -> Option<Session> {
        let raw = match self.records.load(SESSION_RECORD_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Could not read session record");
                return None;
            }
        };

        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if !record.access_token.is_empty() => Some(Session::from(record)),
            Ok(_) => {
                warn!("Session record has an empty access token; treating as signed out");
                None
            }
            Err(e) => {
                warn!(error = %e, "Malformed session record; treating as signed out");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Credential of the current session, or `SessionRequired`.
    pub fn credential(&self) -> BankResult<Credential> {
        self.current_session()
            .map(|session| session.credential)
            .ok_or_else(|| BankError::SessionRequired {
                context: ErrorContext::new("session_store")
                    .with_operation("credential")
                    .with_suggestion("Run 'smartbank login' first"),
            })
    }

    pub fn gateway(&self) -> Arc<dyn LedgerGateway> {
        Arc::clone(&self.gateway)
    }
}

/// Read the `sub` claim without verifying the signature; the ledger is the
/// only party that validates the token.
pub fn decode_subject(token: &str) -> BankResult<String> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| BankError::Authentication {
        message: format!("Received an unreadable access token: {}", e),
        context: ErrorContext::new("session_store").with_operation("decode_subject"),
    })?;

    Ok(data.claims.sub)
}

/// Every failure of the auth endpoints, transport included, is an
/// authentication failure from the caller's point of view.
fn as_auth_error(error: BankError, operation: &str) -> BankError {
    match error {
        BankError::Authentication { .. } => error,
        other => BankError::Authentication {
            message: other.user_message(),
            context: ErrorContext::new("session_store").with_operation(operation),
        },
    }
}
