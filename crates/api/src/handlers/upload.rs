//! Handler for `POST /api/upload`.
//!
//! The body is the raw image. Its format comes from `Content-Type` when
//! that names a supported image type, and from the leading bytes otherwise.
//! Bytes are streamed straight to the token's final path; the token only
//! appears in the response body once the file is fully written.

use std::path::Path;

use axum::body::{Body, BodyDataStream, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use futures::StreamExt;
use gifspin_core::context::Context;
use gifspin_core::media::{ImageKind, SNIFF_LEN};
use gifspin_core::token::Token;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::handlers::{token_headers, TOKEN_HEADER};
use crate::middleware::context::RequestContext;
use crate::response::FileResponse;
use crate::state::AppState;

/// POST /api/upload
///
/// Once the format is known the token is fixed, and it is reported in
/// `X-Spin-Token` whether or not storing the bytes succeeds.
pub async fn upload(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    body: Body,
) -> (HeaderMap, AppResult<Json<FileResponse>>) {
    let incoming = match receive(&state, &ctx, &headers, body).await {
        Ok(incoming) => incoming,
        Err(err) => return (HeaderMap::new(), Err(err)),
    };

    let token = Token::new_input(incoming.kind.extension());
    let headers = token_headers([(TOKEN_HEADER, token.as_str())]);
    let result = store(&state, &ctx, &token, incoming).await;

    (headers, result.map(|()| Json(FileResponse::for_token(&token))))
}

/// An upload whose size and format have been checked but whose bytes are
/// not yet on disk.
struct Incoming {
    kind: ImageKind,
    declared: u64,
    head: Vec<u8>,
    stream: BodyDataStream,
}

/// Check the declared size and settle the format, reading ahead only as
/// far as sniffing needs.
async fn receive(
    state: &AppState,
    ctx: &Context,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Incoming> {
    let size_max = u64::try_from(state.config.limits.size_max).unwrap_or(0);
    let declared = declared_length(headers)?;
    if declared > size_max {
        return Err(AppError::status(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("content-length {declared} is larger than maximum {size_max}"),
        ));
    }

    let mut stream = body.into_data_stream();
    let mut head = Vec::new();

    let header_kind = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ImageKind::from_content_type);

    let kind = match header_kind {
        Some(kind) => kind,
        None => {
            while head.len() < SNIFF_LEN {
                match next_chunk(&mut stream, ctx).await? {
                    Some(chunk) => head.extend_from_slice(&chunk),
                    None => break,
                }
            }
            if head.is_empty() {
                return Err(AppError::bad_request("image data too small"));
            }
            ImageKind::sniff(&head[..head.len().min(SNIFF_LEN)])
                .ok_or_else(|| AppError::bad_request("image format unrecognized"))?
        }
    };

    Ok(Incoming {
        kind,
        declared,
        head,
        stream,
    })
}

/// Write the upload under `token`, removing the file again on failure.
async fn store(
    state: &AppState,
    ctx: &Context,
    token: &Token,
    incoming: Incoming,
) -> AppResult<()> {
    let Incoming {
        kind,
        declared,
        head,
        mut stream,
    } = incoming;
    let path = token.path_in(&state.config.temp_dir);

    match persist(&path, head, &mut stream, ctx, declared).await {
        Ok(written) => {
            tracing::info!(token = %token, bytes = written, format = kind.extension(), "Upload stored");
            Ok(())
        }
        Err(err) => {
            // Never leave a half-written file behind a token.
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %remove_err, token = %token, "Failed to remove partial upload");
                }
            }
            Err(err)
        }
    }
}

/// The request's `Content-Length`, which must be present and positive.
fn declared_length(headers: &HeaderMap) -> AppResult<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&len| len > 0)
        .ok_or_else(|| AppError::status(StatusCode::LENGTH_REQUIRED, "content-length required"))
}

/// Next body chunk, or the context's error if it finishes first.
async fn next_chunk(stream: &mut BodyDataStream, ctx: &Context) -> AppResult<Option<Bytes>> {
    tokio::select! {
        reason = ctx.done() => Err(reason.into()),
        chunk = stream.next() => match chunk {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(err)) => Err(AppError::Body(err)),
            None => Ok(None),
        },
    }
}

/// Write `head` and the rest of `stream` to a new file at `path`.
///
/// Fails if the file already exists or the body exceeds `limit` bytes.
async fn persist(
    path: &Path,
    head: Vec<u8>,
    stream: &mut BodyDataStream,
    ctx: &Context,
    limit: u64,
) -> AppResult<u64> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| AppError::io("create upload file", e))?;

    let mut written = 0u64;
    let mut pending = Some(Bytes::from(head));

    loop {
        let chunk = match pending.take() {
            Some(chunk) => chunk,
            None => match next_chunk(stream, ctx).await? {
                Some(chunk) => chunk,
                None => break,
            },
        };

        written += chunk.len() as u64;
        if written > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::io("write upload file", e))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::io("flush upload file", e))?;

    Ok(written)
}
