use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    Client, ClientBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};

use crate::{Error, Result};

/// Shared HTTP plumbing for gateways
pub struct BaseGatewayBuilder {
    pub client_builder: ClientBuilder,
    pub info: GatewayInfo,
    headers: HeaderMap,
}

pub struct BaseGateway {
    pub client: Client,
    pub info: GatewayInfo,
}

pub struct GatewayInfo {
    pub name: String,
    pub description: String,
}

impl BaseGatewayBuilder {
    pub fn new(info: GatewayInfo) -> Self {
        let client_builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("recurring-events/", env!("CARGO_PKG_VERSION")));

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self {
            client_builder,
            info,
            headers,
        }
    }

    /// Send HTTP basic credentials with every request
    pub fn basic_auth(mut self, username: &str, password: &str) -> Result<Self> {
        let token = STANDARD.encode(format!("{}:{}", username, password));
        let mut value = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| Error::Config(format!("Invalid credentials: {}", e)))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn build(self) -> Result<BaseGateway> {
        let client = self.client_builder.default_headers(self.headers).build()?;

        Ok(BaseGateway {
            client,
            info: self.info,
        })
    }
}

impl BaseGateway {
    /// Map transport level failures
    pub fn handle_error_req(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout
        } else if error.is_connect() || error.is_request() {
            Error::RemoteTransient(format!("{}: {}", self.info.name, error))
        } else {
            Error::Http(error)
        }
    }

    /// Map a non-success HTTP status
    pub fn error_for_status(&self, status: StatusCode, body: String) -> Error {
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::RemoteAuth(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Error::RemoteTransient(format!("{}: HTTP {} {}", self.info.name, status, message))
            }
            s if s.is_server_error() => {
                Error::RemoteTransient(format!("{}: HTTP {} {}", self.info.name, status, message))
            }
            s => Error::RemoteRejected {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Pass successful responses through, turn everything else into an error
    pub async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.error_for_status(status, body))
    }
}
