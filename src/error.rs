use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Failures that stop a page from rendering. Shown to the client as plain text.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No statistics database for {year}")]
    MissingDatabase { year: i32 },

    #[error("Cannot open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid network code {0:?}")]
    InvalidCode(String),

    #[error("SQL Error: {0}")]
    SQL(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Render Error: {0}")]
    Render(#[from] askama::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingDatabase { .. } => StatusCode::NOT_FOUND,
            Self::InvalidCode(_) => StatusCode::BAD_REQUEST,
            Self::Open { .. } | Self::SQL(_) | Self::Migrate(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "page failed");
        }
        (status, self.to_string()).into_response()
    }
}
