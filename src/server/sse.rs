//! SSE relay: frames upstream payloads for the caller.
//!
//! Each payload becomes a `data: <payload>` event, the stream ends with
//! `data: [DONE]`. A mid-stream upstream failure is reported as one final
//! error frame and a close; by then the 200 and earlier chunks are already
//! on the wire, so there is no status code left to change.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::upstream::PayloadStream;

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";
const ERROR_FRAME: &[u8] = b"data: {\"error\":\"Stream error\"}\n\n";

/// Wrap an upstream payload stream into an SSE response.
pub fn relay(mut payloads: PayloadStream) -> Response {
    // Buffer of 64 frames gives the relay some slack without letting a slow
    // client pin upstream memory.
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(64);

    tokio::spawn(async move {
        while let Some(item) = payloads.next().await {
            match item {
                Ok(payload) => {
                    let frame = Bytes::from(format!("data: {payload}\n\n"));
                    if tx.send(Ok(frame)).await.is_err() {
                        // Caller disconnected; dropping the payload stream
                        // releases the upstream connection.
                        tracing::debug!("client disconnected during streaming");
                        return;
                    }
                }
                Err(err) => {
                    tracing::error!("upstream stream failed: {err}");
                    let _ = tx.send(Ok(Bytes::from_static(ERROR_FRAME))).await;
                    return;
                }
            }
        }
        let _ = tx.send(Ok(Bytes::from_static(DONE_FRAME))).await;
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
