//! Docker Engine HTTP API client.
//!
//! Talks to the daemon over its Unix socket. Only the endpoints imgreap needs
//! are wrapped.
//!
//! Reference: https://docs.docker.com/reference/api/engine/

use std::path::Path;

use hyper::{body::Buf, Body, Client, Method, Request};
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::models::{ContainerSummary, ErrorBody, ImageFilters, ImageInspect, ImageSummary};

/// Errors from the Docker Engine API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Socket not found: {0}")]
    SocketNotFound(String),
}

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::Api {
            status: 0,
            message: err.to_string(),
        }
    }
}

/// Docker Engine API client for Unix socket communication.
pub struct DockerClient {
    socket_path: String,
    client: Client<UnixConnector>,
}

impl DockerClient {
    /// Create a new client for the given socket path.
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        let socket_path = socket_path.as_ref().to_string_lossy().to_string();
        let client = Client::unix();
        Self {
            socket_path,
            client,
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Check if the socket exists.
    pub fn socket_exists(&self) -> bool {
        Path::new(&self.socket_path).exists()
    }

    /// `GET /_ping`
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.send(Method::GET, "/_ping").await.map(|_| ())
    }

    /// `GET /images/json` with the given filters.
    pub async fn list_images(&self, filters: &ImageFilters) -> Result<Vec<ImageSummary>, ApiError> {
        let encoded = urlencoding::encode(&serde_json::to_string(filters)?).into_owned();
        self.get(&format!("/images/json?filters={encoded}")).await
    }

    /// `GET /images/{name}/json`
    pub async fn inspect_image(&self, name: &str) -> Result<ImageInspect, ApiError> {
        self.get(&format!("/images/{name}/json")).await
    }

    /// `GET /containers/json?all=true`
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ApiError> {
        self.get("/containers/json?all=true").await
    }

    /// `DELETE /images/{name}` without forcing.
    ///
    /// `name` is either an image id or a `repository:label` reference; deleting
    /// a reference that is not the image's last one only untags it.
    pub async fn remove_image(&self, name: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &format!("/images/{name}?force=false&noprune=false"))
            .await
            .map(|_| ())
    }

    /// Perform a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path).await?;
        Ok(serde_json::from_reader(body.reader())?)
    }

    /// Perform a request, returning the body of a successful response.
    async fn send(&self, method: Method, path: &str) -> Result<impl Buf, ApiError> {
        if !self.socket_exists() {
            return Err(ApiError::SocketNotFound(self.socket_path.clone()));
        }

        let uri = Uri::new(&self.socket_path, path);

        debug!(method = %method, path = path, "Request to Docker API");

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Accept", "application/json")
            .body(Body::empty())?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::aggregate(response.into_body()).await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(body.chunk()),
            })
        }
    }
}

/// Extracts the daemon's `{"message": ...}` error text, falling back to the raw body.
pub(crate) fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|error| error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_message() {
        let body = br#"{"message":"conflict: unable to delete 1a2b (must be forced)"}"#;
        assert_eq!(
            error_message(body),
            "conflict: unable to delete 1a2b (must be forced)"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message(b"page not found\n"), "page not found");
    }

    #[tokio::test]
    async fn test_missing_socket_is_reported() {
        let client = DockerClient::new("/nonexistent/imgreap/docker.sock");
        assert!(!client.socket_exists());
        match client.ping().await {
            Err(ApiError::SocketNotFound(path)) => {
                assert_eq!(path, "/nonexistent/imgreap/docker.sock")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
