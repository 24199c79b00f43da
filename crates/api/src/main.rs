//! Launchpad API server.
//!
//! Settings come from the environment (and `.env`). App routers are
//! discovered under `APPS_DIR`; when unset, the `src/apps` directory of the
//! source tree the binary was built from is used, so deployments that ship
//! only the binary must set `APPS_DIR`.

use anyhow::Context;

use launchpad_core::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("failed to load settings")?;
    launchpad_observability::init(&settings.logging);

    let app = launchpad_api::bootstrap::build_application(&settings)?;

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    app.serve(listener).await
}
