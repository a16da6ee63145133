use axum::{middleware, routing::post, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::api_routes;
use crate::triggers::{message_notify, receive_event};

use super::{api_key_auth, AppState};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let webhook_routes = Router::new()
        .route("/v1/webhook", post(receive_event))
        .route("/v2/webhook", post(receive_event))
        .route("/v1/webhook/message/notify", post(message_notify))
        .layer(RequestBodyLimitLayer::new(state.settings.server.body_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .merge(webhook_routes)
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
