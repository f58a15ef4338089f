use layerbox::cli::Args;
use layerbox::config;
use layerbox::entities::Image;
use layerbox::help::{SHELL_COMMANDS, format_help};
use layerbox::prefs::{LayerBoxSettings, SETTINGS_FILE};
use layerbox::shell::Shell;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

fn init_logging(args: &Args, path_config: &config::PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging, RUST_LOG wins if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.help_commands {
        println!("Commands for --exec:\n");
        print!("{}", format_help(SHELL_COMMANDS));
        return Ok(());
    }

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;
    info!("layerbox {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let settings = LayerBoxSettings::load(&settings_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        LayerBoxSettings::default()
    });

    let image = match &args.file_path {
        Some(path) => Image::load(path)?,
        None => {
            info!("No image given, using the demo image");
            Shell::demo_image()
        }
    };

    let mut shell = Shell::new(image, &settings);
    for command in &args.commands {
        shell
            .run(command)
            .with_context(|| format!("Command '{}' failed", command))?;
    }

    print!("{}", shell.render());

    if let Some(output) = &args.output {
        shell.save(output)?;
        info!("Saved to {}", output.display());
    }
    Ok(())
}
