// Entrypoint for the CLI application.
// - Keeps `main` small: read settings from the environment, set up logging
//   and hand over to the menu loop.
// - Returns `anyhow::Result` so fatal errors are printed with their context.

use ampy_manager::{config::Settings, ui::main_menu};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; RUST_LOG overrides the quiet default.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ampy_manager=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env();
    tracing::debug!(?settings, "starting");

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(settings)?;
    Ok(())
}
