//! HTTP webhook endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::server::AppState;
use crate::webhook::{EventOutcome, NotifyMessage};

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub event: String,
}

/// POST /v1/webhook?event=<tag> and /v2/webhook?event=<tag>
///
/// The body is the raw event data. Message-notify answers with the id array;
/// every other event answers `{"status":200}`.
#[tracing::instrument(name = "http.webhook", skip(state, body), fields(event = %query.event))]
pub async fn receive_event(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Result<Response> {
    let outcome = state.webhook.handle_event(&query.event, &body).await?;
    Ok(outcome_response(outcome))
}

/// POST /v1/webhook/message/notify
///
/// Body is a JSON message array; decode failures use the same error body as
/// the generic endpoint.
#[tracing::instrument(name = "http.message_notify", skip_all, fields(bytes = body.len()))]
pub async fn message_notify(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let messages: Vec<NotifyMessage> = serde_json::from_slice(&body)?;
    let outcome = state.webhook.handle_messages(&messages).await?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: EventOutcome) -> Response {
    match outcome {
        EventOutcome::Accepted(ids) => Json(ids).into_response(),
        EventOutcome::Done => Json(json!({ "status": 200 })).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_event_defaults_to_empty() {
        let query: WebhookQuery = serde_json::from_str("{}").unwrap();
        assert!(query.event.is_empty());
    }
}
