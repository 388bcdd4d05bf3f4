//! Integration tests for `POST /api/upload`.
#![cfg(unix)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{app_with_stub, body_json, send, token_of, upload, PNG_BYTES, STUB_OK};

// ---------------------------------------------------------------------------
// Test: PNG without a content type is sniffed and stored as .png
// ---------------------------------------------------------------------------

#[tokio::test]
async fn png_without_content_type_gets_png_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let response = upload(app, PNG_BYTES, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let header = response.headers()["x-spin-token"].to_str().unwrap().to_string();
    let json = body_json(response).await;
    let token = token_of(&json);

    assert!(token.ends_with(".png"), "token {token}");
    assert_eq!(header, token);

    let stored = std::fs::read(dir.path().join("temp").join(&token)).unwrap();
    assert_eq!(stored, PNG_BYTES);
}

// ---------------------------------------------------------------------------
// Test: Content-Type decides the extension when it names an image type
// ---------------------------------------------------------------------------

#[tokio::test]
async fn content_type_overrides_sniffing() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let response = upload(app, PNG_BYTES, Some("image/webp")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(token_of(&body_json(response).await).ends_with(".webp"));
}

// ---------------------------------------------------------------------------
// Test: Missing Content-Length returns 411
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_content_length_returns_411() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let req = Request::post("/api/upload")
        .body(Body::from(PNG_BYTES.to_vec()))
        .unwrap();
    let response = send(app, req).await;

    assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
    assert_eq!(response.headers()["x-spin-error"], "content-length required");
    assert_eq!(body_json(response).await["err"], "content-length required");
}

// ---------------------------------------------------------------------------
// Test: Declared length above the size limit returns 413
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_declaration_returns_413() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let req = Request::post("/api/upload")
        .header("content-length", "5242881")
        .body(Body::from(PNG_BYTES.to_vec()))
        .unwrap();
    let response = send(app, req).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body_json(response).await["err"],
        "content-length 5242881 is larger than maximum 5242880"
    );
}

// ---------------------------------------------------------------------------
// Test: More bytes than declared returns 413 with the token, and leaves no
// file behind
// ---------------------------------------------------------------------------

#[tokio::test]
async fn body_longer_than_declared_returns_413() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let req = Request::post("/api/upload")
        .header("content-length", "8")
        .body(Body::from(PNG_BYTES.to_vec()))
        .unwrap();
    let response = send(app, req).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    // The token was allocated before the write failed and is still reported.
    let token = response.headers()["x-spin-token"].to_str().unwrap().to_string();
    assert!(token.ends_with(".png"), "token {token}");
    assert!(!dir.path().join("temp").join(&token).exists());

    let leftovers = std::fs::read_dir(dir.path().join("temp")).unwrap().count();
    assert_eq!(leftovers, 0);
}

// ---------------------------------------------------------------------------
// Test: Unrecognised bytes return 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_format_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let response = upload(app, b"plain text, not an image", Some("text/plain")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["err"], "image format unrecognized");
}

// ---------------------------------------------------------------------------
// Test: A declared length with no body returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_body_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_stub(dir.path(), STUB_OK);

    let req = Request::post("/api/upload")
        .header("content-length", "16")
        .body(Body::empty())
        .unwrap();
    let response = send(app, req).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["err"], "image data too small");
}
