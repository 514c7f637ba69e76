use engine::LoopConfig;
use platformer::{ConfigError, PlatformerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICKS_ENV_VAR: &str = "PLATFORMER_TICKS";
const DEFAULT_DEMO_TICKS: u32 = 600;

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) config: Result<PlatformerConfig, ConfigError>,
    pub(crate) demo_ticks: u32,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Platformer Startup ===");

    AppWiring {
        loop_config: LoopConfig::default(),
        config: PlatformerConfig::from_env(),
        demo_ticks: parse_demo_ticks_from_env(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_demo_ticks_from_env() -> u32 {
    let Ok(raw) = std::env::var(TICKS_ENV_VAR) else {
        return DEFAULT_DEMO_TICKS;
    };
    parse_demo_ticks(&raw).unwrap_or_else(|| {
        warn!(value = %raw, default = DEFAULT_DEMO_TICKS, "invalid_demo_ticks");
        DEFAULT_DEMO_TICKS
    })
}

fn parse_demo_ticks(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|ticks| *ticks > 0)
}
