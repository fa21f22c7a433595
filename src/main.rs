#[cfg(not(target_arch = "wasm32"))]
mod desktop {
    use std::borrow::Cow;
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use clap::Parser;

    use sky_core::{EntitySource, ShaderErrorPolicy, SkyConfig};

    #[derive(Parser)]
    #[command(name = "sky", about = "Full-screen procedural sky")]
    struct Cli {
        /// Window title
        #[arg(long, default_value = "Sky")]
        title: String,

        /// Initial window width in pixels
        #[arg(long, default_value_t = 1280)]
        width: u32,

        /// Initial window height in pixels
        #[arg(long, default_value_t = 720)]
        height: u32,

        /// Shader seconds per wall-clock second
        #[arg(long, default_value_t = sky_core::clock::DEFAULT_ANIMATION_SPEED)]
        speed: f64,

        /// Camera radians per pixel of cursor travel
        #[arg(long, default_value_t = sky_core::camera::DEFAULT_MOUSE_SENSITIVITY)]
        sensitivity: f32,

        /// Shader time at start-up, may be negative
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        start_time: f64,

        /// What to do when a shader fails to build: abort or skip
        #[arg(long, default_value_t = ShaderErrorPolicy::Abort)]
        on_shader_error: ShaderErrorPolicy,

        /// WGSL vertex stage for an extra entity drawn after the sky
        #[arg(long)]
        vertex: Option<PathBuf>,

        /// WGSL fragment stage for an extra entity drawn after the sky
        #[arg(long)]
        fragment: Option<PathBuf>,
    }

    fn read_stage(path: &Path) -> Result<Cow<'static, str>> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;
        Ok(Cow::Owned(source))
    }

    impl Cli {
        fn into_config(self) -> Result<SkyConfig> {
            let mut config = SkyConfig {
                title: self.title,
                width: self.width,
                height: self.height,
                animation_speed: self.speed,
                mouse_sensitivity: self.sensitivity,
                start_time: self.start_time,
                on_shader_error: self.on_shader_error,
                ..SkyConfig::default()
            };

            if self.vertex.is_some() || self.fragment.is_some() {
                let sky = EntitySource::sky();
                let vertex = match &self.vertex {
                    Some(path) => Some(read_stage(path)?),
                    None => sky.vertex,
                };
                let fragment = match &self.fragment {
                    Some(path) => Some(read_stage(path)?),
                    None => sky.fragment,
                };
                config.entities.push(EntitySource {
                    label: "custom".to_owned(),
                    vertex,
                    fragment,
                });
            }
            Ok(config)
        }
    }

    pub fn main() -> Result<()> {
        let cli = Cli::parse();

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();

        let config = cli.into_config()?;
        log::info!(
            "sky starting with {} entit{}",
            config.entities.len(),
            if config.entities.len() == 1 { "y" } else { "ies" }
        );

        sky_core::run(config)?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    desktop::main()
}

// The web build starts from `sky_core::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
