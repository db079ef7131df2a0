//! CLI argument parsing for the harness.
//!
//! `run` drives whole scenarios; the other commands expose each completion
//! primitive on its own so it can be pointed at a real generator or log.
use crate::scenario::{GenerationType, Runtime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "w2r-harness",
    version,
    about = "Completion-detection harness for WSDL-to-REST code generation",
    after_help = "Examples:\n  w2r-harness init --config harness.json\n  w2r-harness run --config harness.json --out report.json\n  w2r-harness expected --framework spring --type file\n  w2r-harness watch --root .ui-testing --expect pom.xml --timeout-ms 8000\n  w2r-harness poll --file generator.log --timeout-ms 13500\n  w2r-harness extract --rules rules.json --log runtime.log",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level unless RUST_LOG is set
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Run(RunArgs),
    Expected(ExpectedArgs),
    Watch(WatchArgs),
    Poll(PollArgs),
    Extract(ExtractArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Write a default harness.json")]
pub struct InitArgs {
    /// Where to write the config
    #[arg(long, value_name = "PATH", default_value = "harness.json")]
    pub config: PathBuf,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run generation scenarios and write a report")]
pub struct RunArgs {
    /// Harness config (defaults to ./harness.json, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run only these scenario files instead of the whole test-data directory
    #[arg(long = "scenario", value_name = "FILE")]
    pub scenarios: Vec<PathBuf>,

    /// Report output path
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrameworkArg {
    Spring,
    Blueprint,
}

impl From<FrameworkArg> for Runtime {
    fn from(value: FrameworkArg) -> Self {
        match value {
            FrameworkArg::Spring => Runtime::Spring,
            FrameworkArg::Blueprint => Runtime::Blueprint,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Url,
    File,
}

impl From<TypeArg> for GenerationType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Url => GenerationType::Url,
            TypeArg::File => GenerationType::File,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Print the artifacts a generation is expected to create")]
pub struct ExpectedArgs {
    #[arg(long, value_enum)]
    pub framework: FrameworkArg,

    #[arg(long = "type", value_enum)]
    pub kind: TypeArg,

    /// Print absolute paths under this workspace
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Wait until every expected file exists under a root")]
pub struct WatchArgs {
    /// Directory to watch recursively
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Expected file, relative to the root (repeatable)
    #[arg(long = "expect", value_name = "REL", required = true)]
    pub expect: Vec<PathBuf>,

    #[arg(long, value_name = "MS", default_value_t = 8_000)]
    pub timeout_ms: u64,
}

#[derive(Parser, Debug)]
#[command(about = "Poll a growing file until a terminal pattern appears")]
pub struct PollArgs {
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,

    /// Terminal pattern; must contain the named group given by --group
    #[arg(long, value_name = "REGEX")]
    pub pattern: Option<String>,

    #[arg(long, value_name = "NAME", default_value = "code")]
    pub group: String,

    #[arg(long, value_name = "MS", default_value_t = 13_500)]
    pub timeout_ms: u64,

    #[arg(long, value_name = "MS", default_value_t = 50)]
    pub interval_ms: u64,
}

#[derive(Parser, Debug)]
#[command(about = "Extract named captures from a log with ordered rules")]
pub struct ExtractArgs {
    /// JSON array of {"pattern": ..., "label": ...} rules
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// Log file to read (stdin when omitted)
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}
