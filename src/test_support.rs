use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::server::mock_backend_router;

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "nail_studio_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

pub fn apply_backend_test_env(
    command: &mut Command,
    api_base_url: &str,
    auth_token: Option<&str>,
    log_dir: &Path,
) {
    command.env("NAIL_API_BASE_URL", api_base_url);
    match auth_token {
        Some(token) => command.env("NAIL_AUTH_TOKEN", token),
        None => command.env_remove("NAIL_AUTH_TOKEN"),
    };
    command.env("NAIL_REQUEST_TIMEOUT_MS", "5000");
    command.env("NAIL_FUN_FACT_INTERVAL_MS", "1000");
    command.env("RUST_LOG", "error");
    command.env("NAIL_FILE_LOG", "error");
    command.env("NAIL_LOG_DIR", log_dir.as_os_str());
}

pub async fn spawn_mock_backend() -> Option<String> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("ephemeral port should be available for bind: {error}"),
    };
    let addr = listener
        .local_addr()
        .expect("ephemeral listener should have local address");

    tokio::spawn(async move {
        let _ = axum::serve(listener, mock_backend_router()).await;
    });
    Some(format!("http://{addr}"))
}
