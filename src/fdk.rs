//! Serves invocations from the Fn platform using its `http-stream` contract.
//!
//! The platform names a unix socket in `FN_LISTENER` and posts every invocation to
//! `/call` on it, with the event as the request body.

use std::{
    ffi::OsString,
    fs::Permissions,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::Instrument;

use crate::{
    context::Context,
    env::{FN_FORMAT, FN_LISTENER, read_env},
    handler,
};

pub const FDK_VERSION: &str = concat!("fdk-rust/", env!("CARGO_PKG_VERSION"));
pub const FDK_RUNTIME: &str = "rust";

const FN_FDK_VERSION_HEADER: &str = "fn-fdk-version";
const FN_FDK_RUNTIME_HEADER: &str = "fn-fdk-runtime";
const FN_CALL_ID_HEADER: &str = "fn-call-id";

const UNIX_PREFIX: &str = "unix:";
const HTTP_STREAM_FORMAT: &str = "http-stream";

#[derive(Debug, Error)]
pub enum FdkError {
    #[error("unsupported FN_FORMAT {0}, only http-stream is supported")]
    UnsupportedFormat(String),
    #[error("FN_LISTENER must name a unix socket, got {0}")]
    InvalidListener(String),
    #[error("could not set up the fdk socket: {0}")]
    Io(#[from] std::io::Error),
}

/// The unix socket the platform expects us to listen on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdkListener {
    socket_path: PathBuf,
}

impl FdkListener {
    /// `None` when the function is not running under the Fn platform
    pub fn from_env() -> Result<Option<Self>, FdkError> {
        let Ok(listener) = read_env(FN_LISTENER) else {
            return Ok(None);
        };

        match read_env(FN_FORMAT) {
            Ok(format) if format != HTTP_STREAM_FORMAT => {
                return Err(FdkError::UnsupportedFormat(format));
            }
            _ => (),
        }

        Self::parse(&listener).map(Some)
    }

    /// Parses a listener of the form `unix:/path/to/lsnr.sock`
    pub fn parse(listener: &str) -> Result<Self, FdkError> {
        let socket_path = listener
            .strip_prefix(UNIX_PREFIX)
            .map(PathBuf::from)
            .filter(|path| path.file_name().is_some())
            .ok_or_else(|| FdkError::InvalidListener(listener.to_string()))?;

        Ok(Self { socket_path })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sibling of the socket path that the socket is actually bound to
    fn phony_path(&self) -> PathBuf {
        let mut name = OsString::from("phony");
        name.push(self.socket_path.file_name().unwrap_or_default());
        self.socket_path.with_file_name(name)
    }

    /// Binds the socket under a phony name, opens it up to the platform's user and only
    /// then links it into place, so the platform never connects to a socket it cannot
    /// write to.
    #[tracing::instrument(err)]
    pub async fn bind(&self) -> Result<UnixListener, FdkError> {
        let phony = self.phony_path();
        remove_stale(&phony).await?;
        remove_stale(&self.socket_path).await?;

        let listener = UnixListener::bind(&phony)?;
        tokio::fs::set_permissions(&phony, Permissions::from_mode(0o666)).await?;

        // relative link, both live in the same directory
        let target = phony.file_name().unwrap_or_default();
        tokio::fs::symlink(target, &self.socket_path).await?;

        tracing::info!(socket = ?self.socket_path, "listening for fn invocations");

        Ok(listener)
    }
}

async fn remove_stale(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn router(ctx: Context) -> Router {
    Router::new()
        .route("/call", post(call_handler))
        .with_state(ctx)
}

/// Runs one invocation. An aborted invocation is reported to the platform as a
/// faulted call, the response body is always empty.
async fn call_handler(State(ctx): State<Context>, headers: HeaderMap, body: Bytes) -> Response {
    let call_id = headers
        .get(FN_CALL_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let span = tracing::info_span!("fn_call", call_id = %call_id);
    let status = match handler::handle_invocation(&ctx, &body)
        .instrument(span)
        .await
    {
        Ok(image) => {
            tracing::info!(call_id = %call_id, id = %image.id, "invocation complete");
            StatusCode::OK
        }
        Err(err) => {
            tracing::error!(call_id = %call_id, error = %err, "invocation aborted");
            StatusCode::BAD_GATEWAY
        }
    };

    (
        status,
        [
            (FN_FDK_VERSION_HEADER, FDK_VERSION),
            (FN_FDK_RUNTIME_HEADER, FDK_RUNTIME),
        ],
    )
        .into_response()
}

/// Serves invocations until the platform asks the container to stop
pub async fn serve(listener: UnixListener, ctx: Context) -> std::io::Result<()> {
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error=?err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
