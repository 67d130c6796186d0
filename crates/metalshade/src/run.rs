//! Wires a viewer session together: configuration, shader discovery, the
//! KMS output, the Vulkan state, keyboard input and the host port, then hands
//! everything to the scheduler's frame loop.
//!
//! Catalog problems surface before any device is opened so that a bad shader
//! name never touches the display.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use catalog::ShaderCatalog;
use renderer::{DrmPresenter, GpuState};
use scheduler::{SystemClock, Viewer, ViewerOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use viewconfig::ViewerConfig;

use crate::backend::VulkanViewer;
use crate::cli::Cli;
use crate::host::VirtioHost;
use crate::input::Keyboard;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let default_filter = "warn,metalshade=info,renderer=info,scheduler=info,catalog=info";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(&paths, cli.config.as_deref())?;
    debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        "resolved metalshade paths"
    );

    let roots = paths.shader_roots(&config.shader_dirs, &cli.shader_dirs);
    let catalog = ShaderCatalog::scan(&roots).require_programs()?;
    print!("{catalog}");
    if cli.list {
        return Ok(());
    }

    let requested = cli.shader_name();
    let initial = catalog.initial_index(requested.as_deref(), &config.default_shader)?;

    let drm_device = cli
        .drm_device
        .clone()
        .unwrap_or_else(|| config.display.device.clone());
    let display = DrmPresenter::open(&drm_device)
        .with_context(|| format!("failed to open display {}", drm_device.display()))?;
    let resolution = display.resolution();
    let mode = display.mode_name();
    info!(mode, %resolution, "display mode");

    let gpu = GpuState::new(resolution).context("failed to initialise Vulkan")?;
    info!("metalshade on {} ({resolution})", gpu.device_name());

    let input_device = cli.input_device.as_deref().or(config.input.device.as_deref());
    let keyboard = Keyboard::discover(
        input_device,
        config.input.scan_limit,
        &config.keyboard_filters(),
    );
    match &keyboard {
        Some(keyboard) => debug!(name = keyboard.name(), "keyboard attached"),
        None => warn!("no keyboard input found; navigation disabled"),
    }

    let host = VirtioHost::new(config.host.clone());
    let options = ViewerOptions {
        retry_delay: config.timing.retry_delay,
        report_interval: config.timing.report_interval,
    };
    let backend = VulkanViewer::new(gpu, display);
    let mut viewer = Viewer::new(&catalog, initial, backend, keyboard, host, SystemClock, options)?;
    viewer.run()
}

/// Reads the configuration file. An explicit path must exist; the default
/// location is optional.
fn load_config(paths: &AppPaths, explicit: Option<&Path>) -> Result<ViewerConfig> {
    let default_path = paths.config_file();
    let path = match explicit {
        Some(path) => path,
        None if default_path.is_file() => default_path.as_path(),
        None => {
            debug!(path = %default_path.display(), "no config file; using defaults");
            return Ok(ViewerConfig::default());
        }
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = ViewerConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}
