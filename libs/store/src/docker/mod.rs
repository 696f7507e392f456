//! Docker Engine implementation of [`ImageStore`].
//!
//! The daemon is reached over its Unix socket. Conflicts (HTTP 409) are split
//! into "in use by a container", which callers treat as an expected outcome,
//! and everything else.

mod api;
mod models;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use imgreap_retention::{ImageId, ImageRecord};
use tracing::{debug, info};

pub use api::{ApiError, DockerClient};
pub use models::{ContainerSummary, ImageFilters, ImageInspect, ImageSummary};

use crate::error::StoreError;
use crate::store::ImageStore;

/// Default daemon socket.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// [`ImageStore`] backed by a Docker daemon.
pub struct DockerStore {
    client: DockerClient,
}

impl DockerStore {
    /// Connects to the daemon and checks it answers.
    pub async fn connect<P: AsRef<Path>>(socket_path: P) -> Result<Self, StoreError> {
        let client = DockerClient::new(socket_path);
        client
            .ping()
            .await
            .map_err(|e| classify(client.socket_path(), e))?;

        info!(socket = client.socket_path(), "Connected to Docker daemon");
        Ok(Self { client })
    }

    async fn remove(&self, reference: &str) -> Result<(), StoreError> {
        self.client
            .remove_image(reference)
            .await
            .map_err(|e| classify(reference, e))
    }

    /// Removes an image that is referenced under several repositories by
    /// dropping the references `snapshot` recorded, then the id.
    ///
    /// References created after the snapshot are never touched; if any exist
    /// the final delete fails with the daemon's conflict.
    async fn remove_references(
        &self,
        snapshot: &ImageRecord,
        conflict: String,
    ) -> Result<(), StoreError> {
        let id = snapshot.id.as_str();
        let inspect = self
            .client
            .inspect_image(id)
            .await
            .map_err(|e| classify(id, e))?;

        let references = inspect.references_in(snapshot);
        if references.is_empty() {
            return Err(StoreError::Api {
                status: 409,
                message: conflict,
            });
        }
        debug!(image_id = %snapshot.id, references = ?references, "Removing image references one by one");

        for reference in &references {
            match self.remove(reference).await {
                Err(StoreError::NotFound(_)) => {}
                other => other?,
            }
        }

        // Dropping the last reference normally removes the image too.
        match self.remove(id).await {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl ImageStore for DockerStore {
    async fn list_images(&self, repository: &str) -> Result<Vec<ImageRecord>, StoreError> {
        let mut records = BTreeMap::new();

        let tagged = self
            .client
            .list_images(&ImageFilters::reference(repository))
            .await
            .map_err(|e| classify(repository, e))?;
        let dangling = self
            .client
            .list_images(&ImageFilters::dangling())
            .await
            .map_err(|e| classify(repository, e))?;

        for summary in tagged.into_iter().chain(dangling) {
            let record = summary.into_record()?;
            // The reference filter also matches patterns; keep exact members only.
            if record.belongs_to(repository) {
                records.insert(record.id.clone(), record);
            }
        }

        Ok(records.into_values().collect())
    }

    async fn list_container_image_ids(&self) -> Result<Vec<ImageId>, StoreError> {
        let containers = self
            .client
            .list_containers()
            .await
            .map_err(|e| classify("containers", e))?;

        Ok(containers
            .into_iter()
            .filter(|container| !container.image_id.is_empty())
            .map(|container| ImageId::new(container.image_id))
            .collect())
    }

    async fn delete_image(&self, image: &ImageRecord) -> Result<(), StoreError> {
        match self.remove(image.id.as_str()).await {
            Err(StoreError::Api { status: 409, message }) if is_multi_reference(&message) => {
                self.remove_references(image, message).await
            }
            other => other,
        }
    }

    async fn remove_tag(&self, tag: &str) -> Result<(), StoreError> {
        self.remove(tag).await
    }
}

/// Maps a Docker API failure on `reference` to a [`StoreError`].
pub fn classify(reference: &str, err: ApiError) -> StoreError {
    match err {
        ApiError::Http(e) => StoreError::Unavailable(e.to_string()),
        ApiError::SocketNotFound(path) => {
            StoreError::Unavailable(format!("socket {path} does not exist"))
        }
        ApiError::Json(e) => StoreError::Decode(e.to_string()),
        ApiError::Api { status: 404, .. } => StoreError::NotFound(reference.to_string()),
        ApiError::Api { status: 409, message } if is_in_use(&message) => {
            StoreError::in_use(reference, message)
        }
        ApiError::Api { status, message } => StoreError::Api { status, message },
    }
}

/// The daemon's conflict text when a container blocks removal, e.g.
/// `unable to delete 1a2b (must be forced) - image is being used by stopped container 9c8d`.
fn is_in_use(message: &str) -> bool {
    message.contains("being used by") || message.contains("is using its referenced image")
}

/// The daemon's conflict text when deleting an id that has several references.
fn is_multi_reference(message: &str) -> bool {
    message.contains("referenced in multiple repositories")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hyper::server::conn::Http;
    use hyper::service::service_fn;
    use hyper::{Body, Method, Request, Response};
    use rstest::rstest;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    const MULTI_REFERENCE: &str = r#"{"message":"conflict: unable to delete 1a2b3c4d5e6f (must be forced) - image is referenced in multiple repositories"}"#;

    type Route = dyn Fn(&Method, &str) -> (u16, String) + Send + Sync;

    /// Docker daemon stand-in on a Unix socket that records `METHOD /path`
    /// for every request.
    struct FakeDaemon {
        dir: TempDir,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDaemon {
        fn start(route: impl Fn(&Method, &str) -> (u16, String) + Send + Sync + 'static) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let listener = UnixListener::bind(dir.path().join("docker.sock")).unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let route: Arc<Route> = Arc::new(route);

            let log = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let log = log.clone();
                    let route = route.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Body>| {
                            let path = req.uri().path().to_string();
                            log.lock().unwrap().push(format!("{} {}", req.method(), path));
                            let (status, body) = route(req.method(), &path);
                            async move {
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Body::from(body))
                            }
                        });
                        let _ = Http::new().serve_connection(stream, service).await;
                    });
                }
            });

            Self { dir, requests }
        }

        async fn store(&self) -> DockerStore {
            DockerStore::connect(self.dir.path().join("docker.sock"))
                .await
                .unwrap()
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn snapshot(id: &str) -> ImageRecord {
        ImageRecord::new(id, Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 10)
    }

    #[tokio::test]
    async fn test_multi_reference_delete_keeps_references_outside_the_snapshot() {
        let daemon = FakeDaemon::start(|method, path| match (method, path) {
            (&Method::GET, "/_ping") => (200, "OK".to_string()),
            (&Method::DELETE, "/images/sha256:ee") => (409, MULTI_REFERENCE.to_string()),
            (&Method::GET, "/images/sha256:ee/json") => (
                200,
                r#"{"Id":"sha256:ee","RepoTags":["web:old","api:old","prod:release"],"RepoDigests":[]}"#
                    .to_string(),
            ),
            (&Method::DELETE, _) => (200, "[]".to_string()),
            _ => (404, r#"{"message":"not found"}"#.to_string()),
        });
        let store = daemon.store().await;
        let image = snapshot("sha256:ee").with_tag("web:old").with_tag("api:old");

        let err = store.delete_image(&image).await.unwrap_err();

        assert_eq!(
            daemon.requests(),
            vec![
                "GET /_ping",
                "DELETE /images/sha256:ee",
                "GET /images/sha256:ee/json",
                "DELETE /images/web:old",
                "DELETE /images/api:old",
                "DELETE /images/sha256:ee",
            ]
        );
        assert!(matches!(err, StoreError::Api { status: 409, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_multi_reference_dangling_image_drops_snapshot_digests() {
        let deleted = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = deleted.clone();
        let daemon = FakeDaemon::start(move |method, path| match (method, path) {
            (&Method::GET, "/_ping") => (200, "OK".to_string()),
            (&Method::GET, "/images/sha256:dd/json") => (
                200,
                r#"{"Id":"sha256:dd","RepoTags":[],"RepoDigests":["web@sha256:cccc","api@sha256:cccc"]}"#
                    .to_string(),
            ),
            (&Method::DELETE, "/images/sha256:dd") => {
                let deleted = seen.lock().unwrap();
                if deleted.len() == 2 {
                    (404, r#"{"message":"No such image: sha256:dd"}"#.to_string())
                } else {
                    (409, MULTI_REFERENCE.to_string())
                }
            }
            (&Method::DELETE, reference) => {
                seen.lock().unwrap().push(reference.to_string());
                (200, "[]".to_string())
            }
            _ => (404, r#"{"message":"not found"}"#.to_string()),
        });
        let store = daemon.store().await;
        let image = snapshot("sha256:dd")
            .with_digest("web@sha256:cccc")
            .with_digest("api@sha256:cccc");

        store.delete_image(&image).await.unwrap();

        assert_eq!(
            deleted.lock().unwrap().clone(),
            vec!["/images/web@sha256:cccc", "/images/api@sha256:cccc"]
        );
        assert_eq!(daemon.requests().last().map(String::as_str), Some("DELETE /images/sha256:dd"));
    }

    #[tokio::test]
    async fn test_multi_reference_without_snapshot_references_keeps_conflict() {
        let daemon = FakeDaemon::start(|method, path| match (method, path) {
            (&Method::GET, "/_ping") => (200, "OK".to_string()),
            (&Method::DELETE, "/images/sha256:ff") => (409, MULTI_REFERENCE.to_string()),
            (&Method::GET, "/images/sha256:ff/json") => (
                200,
                r#"{"Id":"sha256:ff","RepoTags":["prod:release"],"RepoDigests":["prod@sha256:ffff"]}"#
                    .to_string(),
            ),
            _ => (500, r#"{"message":"unexpected request"}"#.to_string()),
        });
        let store = daemon.store().await;

        let err = store
            .delete_image(&snapshot("sha256:ff").with_tag("web:old"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Api { status: 409, .. }), "{err:?}");
        assert!(!daemon
            .requests()
            .iter()
            .any(|request| request.contains("prod")));
    }

    fn api(status: u16, message: &str) -> ApiError {
        ApiError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[rstest]
    #[case(
        "conflict: unable to delete 1a2b3c4d5e6f (must be forced) - image is being used by stopped container 9c8d7e6f5a4b"
    )]
    #[case(
        "conflict: unable to delete 1a2b3c4d5e6f (cannot be forced) - image is being used by running container 9c8d7e6f5a4b"
    )]
    #[case("conflict: unable to remove repository reference \"web:v1\" (must force) - container 9c8d is using its referenced image 1a2b")]
    fn test_container_conflicts_are_in_use(#[case] message: &str) {
        let err = classify("sha256:1a2b", api(409, message));
        assert!(err.is_in_use(), "{err:?}");
    }

    #[test]
    fn test_multi_reference_conflict_is_not_in_use() {
        let message = "conflict: unable to delete 1a2b3c4d5e6f (must be forced) - image is referenced in multiple repositories";
        let err = classify("sha256:1a2b", api(409, message));
        assert!(!err.is_in_use());
        assert!(is_multi_reference(message));
        assert_eq!(
            err,
            StoreError::Api {
                status: 409,
                message: message.to_string()
            }
        );
    }

    #[test]
    fn test_not_found_keeps_reference() {
        let err = classify("web:v1", api(404, "No such image: web:v1"));
        assert_eq!(err, StoreError::NotFound("web:v1".to_string()));
    }

    #[test]
    fn test_missing_socket_is_unavailable() {
        let err = classify("web", ApiError::SocketNotFound("/run/docker.sock".to_string()));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_server_errors_pass_through() {
        let err = classify("web", api(500, "driver failed"));
        assert_eq!(
            err,
            StoreError::Api {
                status: 500,
                message: "driver failed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connect_fails_without_daemon() {
        let result = DockerStore::connect("/nonexistent/imgreap/docker.sock").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
