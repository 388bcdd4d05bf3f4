#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gifspin_api::config::ServerConfig;
use gifspin_api::router::{build_app, App};
use gifspin_api::state::AppState;

/// Smallest valid PNG: signature plus an IHDR chunk.
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D',
    b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89,
];

/// Options that pass the default limits.
pub const SPIN_OPTIONS: &str = r#"{
    "width": 64,
    "height": 64,
    "frameCount": 12,
    "frameDelay": 50,
    "flagCrop": false,
    "flagReverse": false,
    "flagFlatten": true,
    "background": 0
}"#;

/// Stub compositor that writes a tiny GIF to its output argument.
pub const STUB_OK: &str = "printf 'GIF89a' > \"${10}\"\n";

/// Stub compositor that never finishes on its own.
pub const STUB_SLOW: &str = "sleep 30\n";

/// Write an executable `/bin/sh` script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

/// Build a test `ServerConfig` rooted at `dir`.
///
/// Uploads land in `dir/temp`, static files come from `dir/public`, and the
/// compositor is the script at `binary`.
pub fn test_config(dir: &Path, binary: PathBuf) -> ServerConfig {
    let temp_dir = dir.join("temp");
    let public_dir = dir.join("public");
    std::fs::create_dir_all(&temp_dir).expect("create temp dir");
    std::fs::create_dir_all(&public_dir).expect("create public dir");

    ServerConfig {
        temp_dir,
        public_dir,
        binary_path: binary,
        dispatch_size: 2,
        request_timeout: Duration::from_secs(10),
        ..ServerConfig::default()
    }
}

/// Build the application exactly as `main.rs` serves it, over `config`.
pub fn build_test_app(config: ServerConfig) -> App {
    build_app(AppState::new(config))
}

/// A test app whose compositor is `script`.
pub fn app_with_stub(dir: &Path, script: &str) -> App {
    let binary = write_script(dir, "compositor.sh", script);
    build_test_app(test_config(dir, binary))
}

pub async fn send(app: App, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.expect("infallible router")
}

pub async fn get(app: App, uri: &str) -> Response<Body> {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    send(app, req).await
}

/// POST an upload with an explicit `Content-Length`.
pub async fn upload(app: App, bytes: &[u8], content_type: Option<&str>) -> Response<Body> {
    let mut req = Request::post("/api/upload").header("content-length", bytes.len());
    if let Some(content_type) = content_type {
        req = req.header("content-type", content_type);
    }
    send(app, req.body(Body::from(bytes.to_vec())).unwrap()).await
}

pub async fn spin(app: App, file: &str, options: &str) -> Response<Body> {
    let req = Request::post(format!("/api/spin?file={file}"))
        .header("content-type", "application/json")
        .body(Body::from(options.to_owned()))
        .unwrap();
    send(app, req).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The token part of a `/temp/<token>` file URL.
pub fn token_of(json: &serde_json::Value) -> String {
    json["file"]
        .as_str()
        .and_then(|file| file.strip_prefix("/temp/"))
        .expect("file url under /temp/")
        .to_string()
}
