// scterm entry point

use std::io::Write;

use anyhow::{Context, Result};
use scterm_backend::{create_backend, Backend};
use scterm_core::{init_logging, init_minimal_logging, ConfigLoader, ScTermConfig};
use scterm_vulkan_renderer::VulkanContext;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    // Early logger so configuration problems are reported; replaced below when possible.
    init_minimal_logging();

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    init_logging(&config.logging, true).context("Failed to initialize logging")?;
    info!("Starting scterm...");

    let mut backend = create_backend(&config.window).context("No windowing backend available")?;
    let result = run(backend.as_mut(), &config);
    backend.destroy();

    info!("scterm shutting down.");
    result
}

fn run(backend: &mut dyn Backend, config: &ScTermConfig) -> Result<()> {
    backend.map().context("Failed to map the window")?;
    if backend.window_state().close {
        warn!("Window was closed before it could be shown.");
        return Ok(());
    }

    let handle = backend
        .create_surface_handle()
        .context("Failed to obtain the window surface handle")?;
    // Must be dropped before the backend is destroyed.
    let renderer = VulkanContext::new(&config.renderer, &handle).context("Failed to create the Vulkan context")?;
    info!(
        "Window {}x{} ready, Vulkan queues {:?}",
        handle.width,
        handle.height,
        renderer.queue_family_indices()
    );

    let mut stdout = std::io::stdout();
    while !backend.window_state().close {
        backend.dispatch().context("Lost the connection to the compositor")?;
        for key in backend.take_key_input() {
            debug!("Key {} (keysym {:#x})", key.keycode, key.keysym);
            if !key.text.is_empty() {
                stdout.write_all(key.text.as_bytes())?;
                stdout.flush()?;
            }
        }
    }
    info!("Close requested by the compositor.");

    drop(renderer);
    Ok(())
}
