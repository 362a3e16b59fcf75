use std::time::Duration;

use anyhow::Context as _;
use image_metadata_handler::{
    context::Context,
    entrypoint::Entrypoint,
    event::DecodePolicy,
    fdk::{self, FdkListener},
    handler,
    service::db::{DB, STATEMENT_TIMEOUT},
};
use tokio::io::AsyncReadExt;

/// How long exit waits for an abandoned database call before leaving it behind
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let _entrypoint = Entrypoint::default().init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("could not build tokio runtime")?;

    let result = runtime.block_on(run());

    // dropping the runtime would block on a database call that outlived its deadline
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    result
}

async fn run() -> anyhow::Result<()> {
    tracing::trace!("initiating function");

    let ctx = Context::new(DB::new(STATEMENT_TIMEOUT), DecodePolicy::from_env());

    match FdkListener::from_env().context("invalid fn platform configuration")? {
        Some(listener) => {
            let listener = listener
                .bind()
                .await
                .context("could not bind fn listener")?;

            fdk::serve(listener, ctx)
                .await
                .context("error serving fn invocations")?;
        }
        None => {
            // single invocation with the event on stdin
            let mut input = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut input)
                .await
                .context("could not read event from stdin")?;

            handler::handle_invocation(&ctx, &input)
                .await
                .context("invocation aborted")?;
        }
    }

    Ok(())
}
