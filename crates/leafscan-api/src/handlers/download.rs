//! Annotated image download.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use leafscan_media::content_type_for_extension;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

/// Serve a previously generated annotated image.
///
/// Anything that is not the bare name of an existing annotated artifact is a
/// 404.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let file = state.store.read_annotated(&filename).await?;
    debug!(file = %file.name, bytes = file.bytes.len(), "Serving annotated image");

    let content_type = content_type_for_extension(file.name.extension());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        file.bytes,
    )
        .into_response())
}
