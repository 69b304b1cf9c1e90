//! HTTP gateway to the ledger service
//!
//! Attaches the bearer credential, sends the request, and turns every
//! non-success outcome into a classified [`BankError`] whose message follows
//! [`failure_message`].

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use smartbank_core::{
    failure_message, Account, AccountId, BankError, BankResult, Credential, ErrorContext,
    LedgerConfig, LedgerGateway, NewAccountRequest, RegistrationRequest, TokenResponse,
    TransferBody, TransferRequest,
};
use tracing::debug;

/// Which family of endpoint a request belongs to. Rejections of the
/// `/auth` endpoints are always authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointScope {
    Auth,
    Account,
    Public,
}

/// reqwest-backed [`LedgerGateway`]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpGateway {
    /// Create a gateway for the configured ledger
    pub fn new(config: &LedgerConfig) -> BankResult<Self> {
        let client = create_http_client(config)?;

        debug!("Created ledger gateway for {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the bearer credential. Refuses to build the request without one.
    fn authorized(
        &self,
        request: RequestBuilder,
        credential: &Credential,
        operation: &str,
    ) -> BankResult<RequestBuilder> {
        if credential.is_empty() {
            return Err(BankError::SessionRequired {
                context: ErrorContext::new("http_gateway")
                    .with_operation(operation)
                    .with_suggestion("Log in before accessing accounts"),
            });
        }
        Ok(request.bearer_auth(credential.expose()))
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        scope: EndpointScope,
        operation: &str,
    ) -> BankResult<Response> {
        debug!(operation, "Sending ledger request");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, scope, operation).await);
        }

        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        scope: EndpointScope,
        operation: &str,
    ) -> BankResult<T> {
        let response = self.execute(request, scope, operation).await?;
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, operation))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn health(&self) -> BankResult<String> {
        let request = self.client.get(self.url("/"));
        let health: HealthResponse = self
            .execute_json(request, EndpointScope::Public, "health")
            .await?;
        Ok(health.status)
    }

    async fn register(&self, request: &RegistrationRequest) -> BankResult<()> {
        let builder = self.client.post(self.url("/auth/register")).json(request);
        self.execute(builder, EndpointScope::Auth, "register").await?;
        Ok(())
    }

    async fn issue_token(&self, email: &str, password: &str) -> BankResult<TokenResponse> {
        let builder = self
            .client
            .post(self.url("/auth/token"))
            .form(&[("username", email), ("password", password)]);
        self.execute_json(builder, EndpointScope::Auth, "issue_token")
            .await
    }

    async fn list_accounts(&self, credential: &Credential) -> BankResult<Vec<Account>> {
        let builder = self.authorized(
            self.client.get(self.url("/accounts/")),
            credential,
            "list_accounts",
        )?;
        self.execute_json(builder, EndpointScope::Account, "list_accounts")
            .await
    }

    async fn create_account(
        &self,
        credential: &Credential,
        request: &NewAccountRequest,
    ) -> BankResult<Account> {
        let builder = self.authorized(
            self.client.post(self.url("/accounts/")).json(request),
            credential,
            "create_account",
        )?;
        self.execute_json(builder, EndpointScope::Account, "create_account")
            .await
    }

    async fn transfer(
        &self,
        credential: &Credential,
        request: &TransferRequest,
    ) -> BankResult<Account> {
        let path = format!("/accounts/{}/transfer", request.source_account_id);
        let builder = self.authorized(
            self.client
                .post(self.url(&path))
                .json(&TransferBody::from(request)),
            credential,
            "transfer",
        )?;
        self.execute_json(builder, EndpointScope::Account, "transfer")
            .await
    }

    async fn delete_account(
        &self,
        credential: &Credential,
        account_id: AccountId,
    ) -> BankResult<()> {
        let path = format!("/accounts/{}", account_id);
        let builder = self.authorized(
            self.client.delete(self.url(&path)),
            credential,
            "delete_account",
        )?;
        self.execute(builder, EndpointScope::Account, "delete_account")
            .await?;
        Ok(())
    }
}

/// Helper function to create HTTP client with common configuration
fn create_http_client(config: &LedgerConfig) -> BankResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            BankError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_gateway").with_operation("create_client"),
            }
        })?,
    );

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| BankError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_gateway").with_operation("create_client"),
        })
}

/// No response arrived: the transport's own description is the message.
fn transport_error(error: reqwest::Error, operation: &str) -> BankError {
    BankError::Network {
        message: failure_message(None, &error.to_string()),
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_gateway")
            .with_operation(operation)
            .with_suggestion("Check network connectivity and the ledger base_url"),
    }
}

async fn handle_response_error(
    response: Response,
    scope: EndpointScope,
    operation: &str,
) -> BankError {
    let status = response.status();
    let fallback = format!("Request failed with status code {}", status.as_u16());

    let body: Option<Value> = match response.text().await {
        Ok(text) => serde_json::from_str(&text).ok(),
        Err(_) => None,
    };

    classify_rejection(
        scope,
        status,
        failure_message(body.as_ref(), &fallback),
        operation,
    )
}

/// Map a rejected request onto the error taxonomy.
pub fn classify_rejection(
    scope: EndpointScope,
    status: StatusCode,
    message: String,
    operation: &str,
) -> BankError {
    let context = ErrorContext::new("http_gateway").with_operation(operation);

    if scope == EndpointScope::Auth
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return BankError::Authentication {
            message,
            context: context.with_suggestion("Log in again"),
        };
    }

    if status == StatusCode::NOT_FOUND {
        return BankError::NotFound {
            message,
            context: context.with_suggestion("Refresh the account list and try again"),
        };
    }

    BankError::Conflict {
        message,
        status: status.as_u16(),
        context,
    }
}
