//! Web dashboard over the yearly request-log statistics databases of the EIDA
//! data centres.

use std::sync::Arc;

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod argument_parsing;
pub mod availability;
pub mod charts;
pub mod dates;
pub mod error;
pub mod pages;
pub mod records;
pub mod sanitize;
pub mod sqlite;
pub mod sqlite_queries;
pub mod table;

use argument_parsing::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let data_dir = ServeDir::new(&state.config.data_dir);
    Router::new()
        .route("/", get(pages::daily))
        .route("/daily", get(pages::daily))
        .route("/monthly", get(pages::monthly))
        .route("/network", get(pages::network))
        .route("/styles.css", get(styles))
        .nest_service(charts::DATA_PREFIX, data_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn styles() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/css")],
        include_str!("../templates/styles.css"),
    )
        .into_response()
}
