use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ptdb",
    about = "Inspect and edit ptdb document databases",
    version,
)]
pub struct Cli {
    /// Database path, without the .ptsb extension
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Command,

    /// TOML file with database settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the value at a path ("." for everything)
    Get(PathArgs),
    /// Store a value at a path
    Set(ValueArgs),
    /// Append a value to the array at a path
    Push(ValueArgs),
    /// Prepend a value to the array at a path
    Unshift(ValueArgs),
    /// Remove and print the last element of the array at a path
    Pop(PathArgs),
    /// Remove and print the first element of the array at a path
    Shift(PathArgs),
    /// Delete the value at a path ("." clears everything)
    Unset(PathArgs),
    /// Show file, timestamps and digest
    Info,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args)]
pub struct ValueArgs {
    pub path: String,
    /// JSON value; anything that does not parse is stored as a string
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["ptdb", "data/app", "get", "users.alice"]).unwrap();
        assert_eq!(cli.database, PathBuf::from("data/app"));
        if let Command::Get(args) = cli.command {
            assert_eq!(args.path, "users.alice");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_set() {
        let cli = Cli::try_parse_from(["ptdb", "db", "set", "a.b", "{\"x\":1}"]).unwrap();
        if let Command::Set(args) = cli.command {
            assert_eq!(args.path, "a.b");
            assert_eq!(args.value, "{\"x\":1}");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_push_requires_value() {
        assert!(Cli::try_parse_from(["ptdb", "db", "push", "list"]).is_err());
    }

    #[test]
    fn parse_pop() {
        let cli = Cli::try_parse_from(["ptdb", "db", "pop", "list"]).unwrap();
        assert!(matches!(cli.command, Command::Pop(_)));
    }

    #[test]
    fn parse_unset_root() {
        let cli = Cli::try_parse_from(["ptdb", "db", "unset", "."]).unwrap();
        if let Command::Unset(args) = cli.command {
            assert_eq!(args.path, ".");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_info() {
        let cli = Cli::try_parse_from(["ptdb", "db", "info"]).unwrap();
        assert!(matches!(cli.command, Command::Info));
    }

    #[test]
    fn parse_config_and_verbose() {
        let cli =
            Cli::try_parse_from(["ptdb", "--config", "ptdb.toml", "-v", "db", "info"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ptdb.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["ptdb", "db", "get", ".", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn database_is_required() {
        assert!(Cli::try_parse_from(["ptdb"]).is_err());
    }
}
