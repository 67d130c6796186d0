use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "metalshade",
    author,
    version,
    about = "Live Vulkan shader viewer for bare KMS displays",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Initial shader by base name (`plasma`, `shaders/plasma.frag` and
    /// `plasma.frag.spv` all select `plasma`).
    #[arg(value_name = "SHADER")]
    pub shader: Option<String>,

    /// Configuration file; defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "METALSHADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Shader search root. Repeat to add more; replaces the configured roots.
    #[arg(long = "shader-dir", value_name = "DIR")]
    pub shader_dirs: Vec<PathBuf>,

    /// DRM card to scan out on (e.g. `/dev/dri/card1`).
    #[arg(long, value_name = "PATH")]
    pub drm_device: Option<PathBuf>,

    /// Keyboard event device; skips the `/dev/input` scan.
    #[arg(long, value_name = "PATH")]
    pub input_device: Option<PathBuf>,

    /// Print the discovered shaders and exit.
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    /// The requested shader reduced to its catalog name.
    pub fn shader_name(&self) -> Option<String> {
        self.shader
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(catalog::base_name)
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
