//! Accept loop: binds the listen endpoint, applies the permission policy,
//! then services one connection per task until cancelled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CommandMonitorError;
use crate::framing::read_frame;
use crate::permissions::EndpointPermissions;
use crate::protocol::{Request, Response};
use crate::registry::Registry;

pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub permissions: EndpointPermissions,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/google-guest-agent/commands.sock"),
            permissions: EndpointPermissions::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Server {
    config: ServerConfig,
    registry: Arc<Registry>,
}

impl Server {
    pub fn new(config: ServerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Binds the endpoint and runs the accept loop until `token` fires.
    /// In-flight handler invocations are allowed to complete; nothing is
    /// forcibly aborted.
    pub async fn run(&self, token: CancellationToken) -> Result<(), CommandMonitorError> {
        #[cfg(unix)]
        {
            self.run_unix(token).await
        }
        #[cfg(not(unix))]
        {
            let _ = token;
            Err(CommandMonitorError::Setup(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "named-pipe transport is not implemented on this platform",
            )))
        }
    }

    #[cfg(unix)]
    async fn run_unix(&self, token: CancellationToken) -> Result<(), CommandMonitorError> {
        use tokio::net::UnixListener;

        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }
        crate::permissions::posix::prepare_parent_dir(&self.config.socket_path, &self.config.permissions)?;

        let mode = self.config.permissions.mode;
        let listener = crate::permissions::posix::with_umask_for_mode(mode, || {
            UnixListener::bind(&self.config.socket_path)
        })
        .map_err(CommandMonitorError::Setup)?;
        crate::permissions::posix::apply_socket_permissions(&self.config.socket_path, &self.config.permissions)?;

        info!(path = %self.config.socket_path.display(), "command monitor listening");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(error) => {
                            warn!(%error, "accept failed");
                            continue;
                        }
                    };
                    let registry = self.registry.clone();
                    let timeout = self.config.request_timeout;
                    let conn_token = token.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = conn_token.cancelled() => {}
                            _ = serve_connection(stream, registry, timeout) => {}
                        }
                    });
                }
            }
        }
    }
}

#[cfg(unix)]
async fn serve_connection(mut stream: tokio::net::UnixStream, registry: Arc<Registry>, timeout: Duration) {
    use tokio::io::AsyncWriteExt;

    let response = match read_frame(&mut stream, timeout).await {
        Ok(frame) => handle_frame(&frame, &registry).await,
        Err(error) => Response::error(error.status_code().as_i32(), error.to_string()),
    };

    let body = match serde_json::to_vec(&response) {
        Ok(bytes) => bytes,
        Err(_) => Response::internal_marshal_error_json().as_bytes().to_vec(),
    };
    let _ = stream.write_all(&body).await;
}

async fn handle_frame(frame: &[u8], registry: &Registry) -> Response {
    let request: Request = match serde_json::from_slice(frame) {
        Ok(request) => request,
        Err(error) => return Response::error(102, error.to_string()),
    };

    match registry.dispatch(&request.command, &request.fields).await {
        Ok(outcome) => Response {
            status: outcome.status,
            status_message: outcome.status_message,
            fields: outcome.fields,
        },
        Err(error) => Response::error(error.status_code().as_i32(), error.to_string()),
    }
}
