// Process logging setup (env_logger behind the `log` facade)
use crate::config::AppConfig;
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::io::Write;

/// Level comes from the config unless `RUST_LOG` is set; `--debug` forces debug.
/// With `log_file` set, output is appended to that file instead of stderr.
pub fn init_logging(config: &AppConfig, debug: bool) -> std::io::Result<()> {
    let default_level = if debug { "debug" } else { config.log_level.as_str() };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {} {}: {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // A second init (e.g. tests) keeps the first logger
    let _ = builder.try_init();
    Ok(())
}
