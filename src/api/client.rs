use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{ApiError, PoolApi, Resource};
use crate::models::{
    Chemical, Id, LoginRequest, LoginResponse, Pool, ReadingFilter, ResolveUpdate, UsageEntry,
    WaterQualityReading,
};

const READINGS_PATH: &str = "/WaterQualityParameters";
const USAGE_PATH: &str = "/chemicalUsageHistory";
const LOGIN_PATH: &str = "/auth/login";

// ---

/// Unauthenticated entry point to the upstream API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    // ---
    http: Client,
    base_url: String,
}

impl ApiClient {
    // ---
    /// Build a client for `base_url`. `timeout` bounds every request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // ---
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a bearer token and user profile.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        // ---
        debug!("POST {} as {}", LOGIN_PATH, credentials.username);
        let builder = self
            .http
            .post(format!("{}{}", self.base_url, LOGIN_PATH))
            .json(credentials);
        let body = execute(builder, LOGIN_PATH).await?;
        decode(&body, LOGIN_PATH)
    }

    /// A client that sends `token` as the bearer credential.
    pub fn session(&self, token: &str) -> SessionClient {
        SessionClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: token.to_string(),
        }
    }
}

/// Upstream client bound to one user's bearer token.
#[derive(Clone)]
pub struct SessionClient {
    // ---
    http: Client,
    base_url: String,
    token: String,
}

impl SessionClient {
    // ---
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{} {}", method, path);
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let body = execute(builder, path).await?;
        decode(&body, path)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<String, ApiError> {
        execute(self.request(method, path).json(body), path).await
    }

    // --- Typed CRUD over plain collections

    pub async fn list<R: Resource>(&self) -> Result<Vec<R>, ApiError> {
        self.fetch(self.request(Method::GET, R::PATH), R::PATH).await
    }

    pub async fn get<R: Resource>(&self, id: &Id) -> Result<R, ApiError> {
        let path = format!("{}/{}", R::PATH, id);
        self.fetch(self.request(Method::GET, &path), &path).await
    }

    pub async fn create<R: Resource>(&self, item: &R) -> Result<R, ApiError> {
        let body = self.send_json(Method::POST, R::PATH, item).await?;
        decode(&body, R::PATH)
    }

    pub async fn update<R: Resource>(&self, id: &Id, item: &R) -> Result<R, ApiError> {
        let path = format!("{}/{}", R::PATH, id);
        let body = self.send_json(Method::PUT, &path, item).await?;
        decode(&body, &path)
    }

    pub async fn delete<R: Resource>(&self, id: &Id) -> Result<(), ApiError> {
        let path = format!("{}/{}", R::PATH, id);
        execute(self.request(Method::DELETE, &path), &path).await?;
        Ok(())
    }
}

#[async_trait]
impl PoolApi for SessionClient {
    // ---
    async fn fetch_readings(
        &self,
        filter: &ReadingFilter,
    ) -> Result<Vec<WaterQualityReading>, ApiError> {
        // ---
        debug!("Reading filter: {:?}", filter);
        let builder = self.request(Method::GET, READINGS_PATH).query(filter);
        self.fetch(builder, READINGS_PATH).await
    }

    async fn fetch_reading(&self, id: &Id) -> Result<WaterQualityReading, ApiError> {
        let path = format!("{}/{}", READINGS_PATH, id);
        self.fetch(self.request(Method::GET, &path), &path).await
    }

    async fn fetch_pools(&self) -> Result<Vec<Pool>, ApiError> {
        self.list::<Pool>().await
    }

    async fn fetch_chemicals(&self) -> Result<Vec<Chemical>, ApiError> {
        self.list::<Chemical>().await
    }

    async fn fetch_chemical(&self, id: &Id) -> Result<Chemical, ApiError> {
        self.get::<Chemical>(id).await
    }

    async fn set_chemical_quantity(
        &self,
        chemical: &Chemical,
        quantity: f64,
    ) -> Result<Chemical, ApiError> {
        // ---
        let updated = Chemical {
            quantity,
            ..chemical.clone()
        };
        self.update(&chemical.id, &updated).await
    }

    async fn append_usage(&self, entry: &UsageEntry) -> Result<(), ApiError> {
        self.send_json(Method::POST, USAGE_PATH, entry).await?;
        Ok(())
    }

    async fn mark_resolved(&self, id: &Id, update: &ResolveUpdate) -> Result<(), ApiError> {
        let path = format!("{}/{}/resolve", READINGS_PATH, id);
        self.send_json(Method::PATCH, &path, update).await?;
        Ok(())
    }
}

// ---

/// Send the request and return the body of a 2xx response.
async fn execute(builder: RequestBuilder, path: &str) -> Result<String, ApiError> {
    // ---
    let response = builder.send().await.map_err(|source| ApiError::Transport {
        path: path.to_string(),
        source,
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|source| ApiError::Transport {
        path: path.to_string(),
        source,
    })?;

    if !status.is_success() {
        debug!("{} returned {}: {}", path, status, body);
        return Err(ApiError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(body: &str, path: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        // ---
        let client = ApiClient::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_decode_error_names_path() {
        // ---
        let err = decode::<Vec<Pool>>(r#"{"data": []}"#, "/Pools").unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref path, .. } if path == "/Pools"));
        assert!(err.to_string().contains("/Pools"));
    }
}
