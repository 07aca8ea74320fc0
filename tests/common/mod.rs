use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use device_duel::config::ClientConfig;
use device_duel::providers::FakeProvider;
use device_duel::server::router;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Serve the backend around `provider` on an ephemeral local port
///
/// Returns the base URL. The server runs until the test runtime shuts down.
#[allow(dead_code)]
pub async fn spawn_backend(provider: FakeProvider) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().expect("listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(provider)))
            .await
            .expect("backend failed");
    });

    format!("http://{}", addr)
}

#[allow(dead_code)]
pub fn client_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        request_timeout_seconds: 5,
    }
}
