//! Verda Cloud implementation of the [`Provider`] trait.
//!
//! The transport is plain `reqwest` against the Verda REST API. OAuth2
//! client-credentials tokens are fetched on first use and cached until
//! shortly before expiry; the cache lives behind an async mutex so one
//! client instance may be cloned across concurrent tasks.

mod wire;

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::VerdaConfig;
use crate::provider::{
    CreateInstance, Instance, InstanceAction, InstanceId, Location, Provider, ProviderError,
    ProviderFuture, SshKey,
};
use crate::shape::Sku;
use wire::{ActionRequest, CreateInstanceBody, TokenRequest, TokenResponse, WireInstance,
    WireSshKey};

const DEFAULT_BASE_URL: &str = "https://api.verda.ai/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Provider backed by the Verda REST API.
#[derive(Clone)]
pub struct VerdaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl VerdaClient {
    /// Builds a client from validated configuration.
    #[must_use]
    pub fn from_config(config: &VerdaConfig) -> Self {
        Self::new(&config.client_id, &config.client_secret)
    }

    /// Builds a client from raw OAuth credentials.
    #[must_use]
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: HTTP_CLIENT.clone(),
            base_url: String::from(DEFAULT_BASE_URL),
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.expires_at > Instant::now()
        {
            return Ok(cached.access_token.clone());
        }

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let checked = check_status(response).await.map_err(|err| match err {
            ProviderError::Api { status, message }
                if status == StatusCode::BAD_REQUEST.as_u16() =>
            {
                ProviderError::Auth(message)
            }
            other => other,
        })?;

        let token: TokenResponse = checked.json().await.map_err(decode_error)?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        let checked = check_status(response).await?;
        checked.json().await.map_err(decode_error)
    }

    async fn fetch_instances(&self, status: Option<&str>) -> Result<Vec<Instance>, ProviderError> {
        let path = status.map_or_else(
            || String::from("/instances"),
            |filter| format!("/instances?status={filter}"),
        );
        let instances: Vec<WireInstance> = self.get_json(&path).await?;
        Ok(instances.into_iter().map(Instance::from).collect())
    }

    async fn fetch_instance(&self, id: &InstanceId) -> Result<Instance, ProviderError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(format!("{}/instances/{}", self.base_url, id.as_str()))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id.clone()));
        }

        let checked = check_status(response).await?;
        let instance: WireInstance = checked.json().await.map_err(decode_error)?;
        Ok(instance.into())
    }

    async fn submit_create(&self, spec: &CreateInstance) -> Result<Instance, ProviderError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .post(format!("{}/instances", self.base_url))
            .bearer_auth(token)
            .json(&CreateInstanceBody::from_spec(spec))
            .send()
            .await
            .map_err(transport_error)?;
        let checked = check_status(response).await?;
        let instance: WireInstance = checked.json().await.map_err(decode_error)?;
        Ok(instance.into())
    }

    async fn submit_action(
        &self,
        id: &InstanceId,
        action: InstanceAction,
    ) -> Result<(), ProviderError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .put(format!(
                "{}/instances/{}/actions",
                self.base_url,
                id.as_str()
            ))
            .bearer_auth(token)
            .json(&ActionRequest {
                action: action.as_str(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id.clone()));
        }

        check_status(response).await.map(|_| ())
    }

    async fn fetch_availability(
        &self,
        sku: &Sku,
        spot: bool,
        location: &Location,
    ) -> Result<bool, ProviderError> {
        let path = format!(
            "/instance-availability/{}?is_spot={spot}&location_code={}",
            sku.as_str(),
            location.as_str()
        );
        self.get_json(&path).await
    }

    async fn fetch_ssh_keys(&self) -> Result<Vec<SshKey>, ProviderError> {
        let keys: Vec<WireSshKey> = self.get_json("/ssh-keys").await?;
        Ok(keys.into_iter().map(SshKey::from).collect())
    }
}

impl Provider for VerdaClient {
    fn list_instances<'a>(&'a self, status: Option<&'a str>) -> ProviderFuture<'a, Vec<Instance>> {
        Box::pin(async move { self.fetch_instances(status).await })
    }

    fn get_instance<'a>(&'a self, id: &'a InstanceId) -> ProviderFuture<'a, Instance> {
        Box::pin(async move { self.fetch_instance(id).await })
    }

    fn create_instance<'a>(&'a self, spec: &'a CreateInstance) -> ProviderFuture<'a, Instance> {
        Box::pin(async move { self.submit_create(spec).await })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a InstanceId,
        action: InstanceAction,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move { self.submit_action(id, action).await })
    }

    fn capacity_available<'a>(
        &'a self,
        sku: &'a Sku,
        spot: bool,
        location: &'a Location,
    ) -> ProviderFuture<'a, bool> {
        Box::pin(async move { self.fetch_availability(sku, spot, location).await })
    }

    fn list_ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>> {
        Box::pin(async move { self.fetch_ssh_keys().await })
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn decode_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Decode(err.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_owned(),
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ProviderError::Auth(message));
    }

    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}
