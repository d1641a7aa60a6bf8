use dota_auto_accept::app;
use dota_auto_accept::args::{Args, Mode};
use dota_auto_accept::config::{self, AppConfig};
use dota_auto_accept::logging;

fn main() {
    let Some(args) = Args::parse() else {
        return;
    };

    let config_path = config::resolve_config_path(args.config_path.clone());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if args.mode == Mode::PrintConfig {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("❌ Failed to render config: {}", e),
        }
        return;
    }

    if let Err(e) = logging::init_logging(&config, args.debug_mode) {
        eprintln!("❌ Failed to open log file: {}", e);
        std::process::exit(1);
    }
    log::info!("🚀 Dota Auto Accept v{} (config: {:?})", env!("CARGO_PKG_VERSION"), config_path);

    // One cooperative scheduler drives the controller, detection and the API
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(app::run(&args, config, config_path)) {
        log::error!("❌ {}", e);
        std::process::exit(1);
    }
}
