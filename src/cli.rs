use clap::{Args, Parser, Subcommand};
use mixsize::scale::Mode;
use std::path::PathBuf;

/// Inserts image width/height into the Pug mixin call at a cursor position
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert the image's intrinsic size
    Full(InsertArgs),
    /// Insert half the image's intrinsic size (for 2x assets)
    Half(InsertArgs),
}

impl Command {
    pub fn into_parts(self) -> (Mode, InsertArgs) {
        match self {
            Command::Full(args) => (Mode::Full, args),
            Command::Half(args) => (Mode::Half, args),
        }
    }
}

#[derive(Args, Debug)]
pub struct InsertArgs {
    /// The Pug file to edit
    pub file: PathBuf,

    /// Cursor line (1-based)
    #[arg(short, long)]
    pub line: usize,

    /// Cursor column (1-based, in characters)
    #[arg(short, long, default_value_t = 1)]
    pub column: usize,

    /// Show the change without writing the file
    #[arg(long)]
    pub dry_run: bool,

    /// Print the edit as JSON instead of applying it; never prompts
    #[arg(long, conflicts_with = "dry_run")]
    pub json: bool,

    /// Replace width/height values that are already present
    #[arg(long, conflicts_with = "no_overwrite")]
    pub overwrite: bool,

    /// Keep width/height values that are already present
    #[arg(long)]
    pub no_overwrite: bool,

    /// Workspace root images are searched in (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file to use instead of the project or user config
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra mixin name to recognize (repeatable)
    #[arg(long = "mixin", value_name = "NAME")]
    pub mixins: Vec<String>,
}

impl InsertArgs {
    /// The overwrite flag, falling back to the configured default.
    pub fn overwrite(&self, configured: bool) -> bool {
        if self.overwrite {
            true
        } else if self.no_overwrite {
            false
        } else {
            configured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_half_with_flags() {
        let cli = Cli::try_parse_from([
            "mixsize",
            "half",
            "views/index.pug",
            "--line",
            "12",
            "--column",
            "8",
            "--no-overwrite",
            "--mixin",
            "+hero(",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let (mode, args) = cli.command.into_parts();
        assert_eq!(mode, Mode::Half);
        assert_eq!(args.file, PathBuf::from("views/index.pug"));
        assert_eq!((args.line, args.column), (12, 8));
        assert!(!args.overwrite(true));
        assert_eq!(args.mixins, vec!["+hero("]);
    }

    #[test]
    fn test_overwrite_defaults_to_config() {
        let cli = Cli::try_parse_from(["mixsize", "full", "a.pug", "-l", "1"]).unwrap();
        let (mode, args) = cli.command.into_parts();
        assert_eq!(mode, Mode::Full);
        assert!(args.overwrite(true));
        assert!(!args.overwrite(false));
        assert_eq!(args.column, 1);
    }

    #[test]
    fn test_conflicting_flags_are_rejected() {
        assert!(
            Cli::try_parse_from([
                "mixsize",
                "full",
                "a.pug",
                "-l",
                "1",
                "--overwrite",
                "--no-overwrite"
            ])
            .is_err()
        );
        assert!(Cli::try_parse_from(["mixsize", "full", "a.pug"]).is_err());
    }
}
