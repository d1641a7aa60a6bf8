use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Run the controller and the control API
    Serve,
    /// Print the effective configuration and exit
    PrintConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub mode: Mode,
    pub debug_mode: bool,
    /// Log clicks instead of moving the pointer
    pub dry_run: bool,
    pub config_path: Option<PathBuf>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse flags (program name already stripped); None means exit without running
    pub fn parse_from<I, S>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mode = Mode::Serve;
        let mut debug_mode = false;
        let mut dry_run = false;
        let mut config_path: Option<PathBuf> = None;

        for arg in args {
            let arg = arg.as_ref();
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Dota Auto Accept v{} ({}, built {})",
                    env!("CARGO_PKG_VERSION"),
                    env!("APP_GIT_REV"),
                    env!("APP_BUILD_DATE")
                );
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--dry-run" {
                dry_run = true;
            } else if arg == "--print-config" {
                mode = Mode::PrintConfig;
            } else if let Some(val) = arg.strip_prefix("--config=") {
                if val.is_empty() {
                    eprintln!("❌ --config= needs a path");
                    return None;
                }
                config_path = Some(PathBuf::from(val));
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode,
            debug_mode,
            dry_run,
            config_path,
        })
    }
}

fn print_help() {
    println!("🎮 Dota 2 Queue Auto-Accept");
    println!();
    println!("USAGE:");
    println!("    dota-auto-accept [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)          Run the controller and the HTTP/WebSocket API");
    println!("    --config=PATH       Config file (default: $AUTO_ACCEPT_CONFIG or config.json)");
    println!("    --dry-run           Log clicks instead of moving the mouse");
    println!("    --print-config      Print the effective config as JSON and exit");
    println!("    --debug             Enable debug logging");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    dota-auto-accept --config=./config.json");
    println!("    dota-auto-accept --dry-run --debug");
}
