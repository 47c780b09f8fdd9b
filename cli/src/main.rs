//! Screenshot command-line interface.
//!
//! Captures the primary display once and stores it in the pictures
//! library, asking for consent first.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use screenshot_cli::exit_codes::ExitCode;
use screenshot_cli::{
    build_persister, build_platform, commands, config, init_logging, CaptureTarget, EngineHandle,
};
use screenshot_ipc::CaptureConfig;

/// Screenshot - single-shot screen capture
#[derive(Parser, Debug)]
#[command(name = "screenshot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture the screen once and save it
    Take {
        #[command(flatten)]
        options: CaptureOptions,

        /// Pictures directory (overrides the configured one)
        #[arg(long)]
        pictures_dir: Option<PathBuf>,

        /// Album inside the pictures directory
        #[arg(long)]
        album: Option<String>,

        /// Capability tier of the host, selects the storage strategy
        #[arg(long)]
        tier: Option<u32>,
    },
    /// Report whether screen capture is authorized
    CheckPermission {
        #[command(flatten)]
        options: CaptureOptions,
    },
}

#[derive(Args, Debug, Clone)]
struct CaptureOptions {
    /// Framebuffer device to capture
    #[arg(long, default_value = "/dev/fb0")]
    device: PathBuf,

    /// Allow the capture without prompting
    #[arg(short = 'y', long)]
    yes: bool,
}

impl CaptureOptions {
    fn target(&self) -> CaptureTarget {
        CaptureTarget {
            device: self.device.clone(),
            assume_yes: self.yes,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("ERROR: {e:#}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut capture_config = config::load_config(cli.config.as_deref())?;

    let options = match &cli.command {
        Commands::Take {
            options,
            pictures_dir,
            album,
            tier,
        } => {
            apply_overrides(&mut capture_config, pictures_dir, album, *tier);
            options
        }
        Commands::CheckPermission { options } => options,
    };

    let platform = build_platform(&options.target())?;
    let persister = build_persister(&capture_config)?;
    info!(storage = ?persister.strategy(), "Screenshot starting");

    let engine = EngineHandle::spawn(platform, persister, capture_config)?;
    let result = match cli.command {
        Commands::Take { .. } => commands::take(&engine, cli.json),
        Commands::CheckPermission { .. } => commands::check_permission(&engine, cli.json),
    };
    engine.shutdown();
    result
}

fn apply_overrides(
    config: &mut CaptureConfig,
    pictures_dir: &Option<PathBuf>,
    album: &Option<String>,
    tier: Option<u32>,
) {
    if let Some(dir) = pictures_dir {
        config.pictures_dir = Some(dir.clone());
    }
    if let Some(album) = album {
        config.album = album.clone();
    }
    if let Some(tier) = tier {
        config.capability_tier = tier;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_take_defaults() {
        let cli = Cli::try_parse_from(["screenshot", "take"]).unwrap();
        assert!(!cli.json);
        match cli.command {
            Commands::Take {
                options,
                pictures_dir,
                tier,
                ..
            } => {
                assert_eq!(options.device, PathBuf::from("/dev/fb0"));
                assert!(!options.yes);
                assert!(pictures_dir.is_none());
                assert!(tier.is_none());
            }
            _ => panic!("Expected Take command"),
        }
    }

    #[test]
    fn test_parse_take_with_overrides() {
        let cli = Cli::try_parse_from([
            "screenshot",
            "--json",
            "take",
            "-y",
            "--pictures-dir",
            "/tmp/pics",
            "--tier",
            "28",
        ])
        .unwrap();
        assert!(cli.json);

        let Commands::Take {
            options,
            pictures_dir,
            album,
            tier,
        } = cli.command
        else {
            panic!("Expected Take command");
        };
        assert!(options.yes);

        let mut config = CaptureConfig::default();
        apply_overrides(&mut config, &pictures_dir, &album, tier);
        assert_eq!(config.pictures_dir, Some(PathBuf::from("/tmp/pics")));
        assert_eq!(config.album, "Screenshots");
        assert!(!config.uses_indexed_storage());
    }

    #[test]
    fn test_parse_check_permission() {
        let cli = Cli::try_parse_from(["screenshot", "check-permission", "--device", "/dev/fb1"])
            .unwrap();
        match cli.command {
            Commands::CheckPermission { options } => {
                assert_eq!(options.target().device, PathBuf::from("/dev/fb1"));
            }
            _ => panic!("Expected CheckPermission command"),
        }
    }
}
