//! Handler for `POST /api/spin`.

use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use gifspin_core::context::Context;
use gifspin_core::error::SpinError;
use gifspin_core::options::CompositeOptions;
use gifspin_core::task::CompositeTask;
use gifspin_core::token::{self, Token};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::{token_headers, TOKEN_HEADER, TOKEN_OUTPUT_HEADER};
use crate::middleware::context::RequestContext;
use crate::response::FileResponse;
use crate::state::AppState;

/// Largest options document accepted, in bytes.
pub const MAX_OPTIONS_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct SpinParams {
    pub file: Option<String>,
}

/// POST /api/spin?file=<token>
///
/// Composites the uploaded file named by `file` using the JSON options in
/// the body and answers with the output token. The token headers are sent
/// on failures too, so a client can correlate an error with its files.
pub async fn spin(
    State(state): State<AppState>,
    ctx: RequestContext,
    params: Result<Query<SpinParams>, QueryRejection>,
    body: Body,
) -> (HeaderMap, AppResult<Json<FileResponse>>) {
    let input = params
        .ok()
        .and_then(|Query(params)| params.file)
        .filter(|file| !file.is_empty());
    let Some(input) = input else {
        return (
            HeaderMap::new(),
            Err(AppError::bad_request("query parameter \"file\" required")),
        );
    };

    let input = token::file_name(&input).to_owned();
    let output = Token::new_output(&input);
    let headers = token_headers([
        (TOKEN_HEADER, input.as_str()),
        (TOKEN_OUTPUT_HEADER, output.as_str()),
    ]);

    let result = composite(&state, &ctx, &input, &output, body).await;
    (headers, result.map(|()| Json(FileResponse::for_token(&output))))
}

async fn composite(
    state: &AppState,
    ctx: &Context,
    input: &str,
    output: &Token,
    body: Body,
) -> AppResult<()> {
    let temp_dir = &state.config.temp_dir;
    let input_path = token::resolve_path(temp_dir, input);

    match tokio::fs::metadata(&input_path).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found("query parameter \"file\" not found"));
        }
        Err(err) => return Err(AppError::io("stat input file", err)),
    }

    let raw = read_options(ctx, body).await?;
    let options: CompositeOptions = serde_json::from_slice(&raw)?;
    options
        .validate(&state.config.limits)
        .map_err(SpinError::from)?;

    let task = CompositeTask {
        options,
        input_path,
        output_path: output.path_in(temp_dir),
        binary_path: state.config.binary_path.clone(),
    };

    tracing::debug!(input, output = %output, "Submitting composite task");
    state.dispatcher.submit(ctx, &task).await?;
    tracing::info!(input, output = %output, "Spin complete");

    Ok(())
}

/// Read the options document, racing the request context.
async fn read_options(ctx: &Context, body: Body) -> AppResult<Bytes> {
    tokio::select! {
        reason = ctx.done() => Err(reason.into()),
        read = axum::body::to_bytes(body, MAX_OPTIONS_BYTES) => {
            read.map_err(|err| AppError::from_body_error(err, MAX_OPTIONS_BYTES as u64))
        }
    }
}
