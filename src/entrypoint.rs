//! Standard process initialization: dotenv, panic hook and the tracing subscriber.

use std::io::Write;

use tracing_subscriber::EnvFilter;

use crate::env::Environment;

/// Used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "image_metadata_handler=info";

/// Defines how the binary is initialized
#[derive(Debug)]
pub struct Entrypoint {
    env: Environment,
}

impl Default for Entrypoint {
    fn default() -> Self {
        Entrypoint {
            env: Environment::from_env(),
        }
    }
}

/// Proof that [Entrypoint::init] ran. Flushes buffered log output when dropped, so keep
/// it alive for the whole of `main`.
#[derive(Debug)]
#[must_use]
pub struct InitializedEntrypoint(());

impl Drop for InitializedEntrypoint {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

impl Entrypoint {
    /// consume self, initialize this binary, and return a proof that it was initialized
    pub fn init(self) -> InitializedEntrypoint {
        dotenv::dotenv().ok();
        std::panic::set_hook(Box::new(tracing_panic::panic_hook));

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        match self.env {
            Environment::Local => {
                tracing_subscriber::fmt()
                    .with_ansi(true)
                    .with_env_filter(env_filter)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty()
                    .init();
            }
            Environment::Production | Environment::Develop => {
                tracing_subscriber::fmt()
                    .with_ansi(false)
                    .with_env_filter(env_filter)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true)
                    .init();
            }
        }

        InitializedEntrypoint(())
    }
}
