use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ClientError;
use crate::{
    auth::dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest, VerifyResponse},
    contact::{
        dto::{ContactCreated, ContactRequest},
        repo_types::ContactMessage,
    },
    error::ErrorBody,
    health::HealthResponse,
};

/// Auth endpoints as seen by the session holder.
#[async_trait]
pub trait AuthApi: Clone + Send + Sync + 'static {
    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError>;
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError>;
    async fn verify(&self, token: &str) -> Result<PublicUser, ClientError>;
    async fn logout(&self, token: &str) -> Result<(), ClientError>;
}

/// HTTP transport for the `/api` surface.
#[derive(Clone)]
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// `base_url` includes the API prefix, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn submit_contact(&self, req: &ContactRequest) -> Result<ContactCreated, ClientError> {
        let res = self.http.post(self.url("/contact")).json(req).send().await?;
        parse(res).await
    }

    pub async fn list_contacts(&self, token: Option<&str>) -> Result<Vec<ContactMessage>, ClientError> {
        let mut req = self.http.get(self.url("/contact"));
        if let Some(t) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {t}"));
        }
        parse(req.send().await?).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        parse(self.http.get(self.url("/health")).send().await?).await
    }
}

async fn parse<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }
    let message = match res.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_owned(),
    };
    debug!(%status, %message, "api error");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        let res = self.http.post(self.url("/auth/signup")).json(req).send().await?;
        parse(res).await
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let res = self.http.post(self.url("/auth/login")).json(req).send().await?;
        parse(res).await
    }

    async fn verify(&self, token: &str) -> Result<PublicUser, ClientError> {
        let res = self
            .http
            .get(self.url("/auth/verify"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;
        Ok(parse::<VerifyResponse>(res).await?.user)
    }

    async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let res = self
            .http
            .post(self.url("/auth/logout"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;
        parse::<serde_json::Value>(res).await.map(|_| ())
    }
}
