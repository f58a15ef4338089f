use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless layers panel: load an image description, run panel commands, print the layer tree
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Image description to load (JSON) - a demo image is used when omitted
    #[arg(value_name = "FILE")]
    pub file_path: Option<PathBuf>,

    /// Panel command to run, in order (repeatable). See `--help-commands`.
    #[arg(short = 'x', long = "exec", value_name = "CMD")]
    pub commands: Vec<String>,

    /// List the commands accepted by --exec and exit
    #[arg(long = "help-commands")]
    pub help_commands: bool,

    /// Save the resulting image description to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable debug logging to file (default: layerbox.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_and_flags() {
        let args = Args::parse_from(["layerbox", "doc.json", "-x", "raise", "-x", "opacity:40", "-vv", "--log"]);
        assert_eq!(args.file_path, Some(PathBuf::from("doc.json")));
        assert_eq!(args.commands, vec!["raise", "opacity:40"]);
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }
}
