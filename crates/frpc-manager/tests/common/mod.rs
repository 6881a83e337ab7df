//! Test utilities and common setup.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use frpc_manager::api::{self, AppState};
use frpc_manager::config::JsonConfigStore;
use frpc_manager::materialize::GeneratedFiles;
use frpc_manager::supervisor::{Supervisor, SupervisorConfig};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// A router over a supervisor whose files live in a temp dir.
pub struct TestApp {
    pub router: Router,
    pub supervisor: Supervisor,
    pub dir: TempDir,
}

impl TestApp {
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Send a request and return the status with the parsed JSON body.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri).method(method);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

/// Create a test application with an empty data directory.
pub fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonConfigStore::new(dir.path().join("config.json")));
    let config = SupervisorConfig::new(GeneratedFiles::in_dir(dir.path()));
    let supervisor = Supervisor::new(store, config);
    let router = api::create_router(AppState::new(supervisor.clone()));
    TestApp {
        router,
        supervisor,
        dir,
    }
}

/// Write an executable shell script into `dir` and return its path.
#[cfg(unix)]
pub fn fake_frpc(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-frpc");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}
