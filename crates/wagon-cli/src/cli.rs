use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use wagon_domain::ArchiveFormat;

pub const WAGON_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\n{all-args}{after-help}\n";

pub const WAGON_BEFORE_HELP: &str = concat!(
    "wagon ",
    env!("CARGO_PKG_VERSION"),
    " – Offline installable archives of Python wheels\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  create     Build wheels for a package and pack them into one archive.\n",
    "  validate   Install an archive into a throwaway environment to prove it works.\n",
    "  install    Install an archive's package from its bundled wheels.\n",
    "  show       Print the metadata stored in an archive.\n",
    "  list-files List the extra files stored in an archive.\n",
    "  get-file   Copy one stored file out of an archive.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "wagon",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = WAGON_BEFORE_HELP,
    help_template = WAGON_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct WagonCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandCli {
    #[command(
        about = "Build wheels for SOURCE and pack them into a wagon archive.",
        override_usage = "wagon create <SOURCE> [OPTIONS] [-- <WHEEL_ARG>...]",
        after_help = "Examples:\n  wagon create requests==2.32.3 -o dist\n  wagon create ./my-project -t zip --validate --build-tag 2\n  wagon create flask --exclude werkzeug -- --no-binary :all:\n  wagon create ./plugin --add-file plugin.yaml --add-file LICENSE"
    )]
    Create(CreateArgs),
    #[command(
        about = "Install a wagon into a throwaway environment to prove it is installable.",
        override_usage = "wagon validate <SOURCE> [--ignore-platform] [-u] [-- <INSTALL_ARG>...]"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Install a wagon's package from its bundled wheels.",
        override_usage = "wagon install <SOURCE> [--venv DIR] [-r FILE]... [-u] [-- <INSTALL_ARG>...]"
    )]
    Install(InstallArgs),
    #[command(about = "Print the metadata stored in a wagon.")]
    Show(ShowArgs),
    #[command(about = "List the files added to a wagon with --add-file.")]
    ListFiles(ShowArgs),
    #[command(
        about = "Copy a file added with --add-file out of a wagon.",
        override_usage = "wagon get-file <SOURCE> -f <FILENAME> [-o DIR]"
    )]
    GetFile(GetFileArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(value_name = "SOURCE", help = "Package name, name==version, local path, or URL")]
    pub source: String,
    #[arg(
        short = 'r',
        long = "requirements-file",
        value_name = "FILE",
        help = "Also build wheels for this requirements file"
    )]
    pub requirement_files: Vec<String>,
    #[arg(
        short = 't',
        long = "format",
        value_name = "FORMAT",
        default_value = "tar.gz",
        help = "Archive format: tar.gz or zip"
    )]
    pub format: ArchiveFormat,
    #[arg(short, long, help = "Overwrite an existing archive")]
    pub force: bool,
    #[arg(long, help = "Keep the built wheels on disk after packing")]
    pub keep_wheels: bool,
    #[arg(
        short,
        long = "output-directory",
        value_name = "DIR",
        default_value = ".",
        help = "Directory to write the archive into"
    )]
    pub output_dir: PathBuf,
    #[arg(
        long = "pyver",
        value_name = "VERSION",
        help = "Supported Python version (repeatable); probed from the interpreter by default"
    )]
    pub python_versions: Vec<String>,
    #[arg(
        long,
        value_name = "PLATFORM",
        help = "Record this platform instead of the one derived from the wheels"
    )]
    pub supported_platform: Option<String>,
    #[arg(
        long,
        value_name = "TAG",
        help = "Build number inserted after the version in the archive name"
    )]
    pub build_tag: Option<String>,
    #[arg(
        long = "add-file",
        value_name = "PATH",
        help = "File to store under files/ in the archive (repeatable)"
    )]
    pub add_files: Vec<PathBuf>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Distribution whose wheels are left out of the archive (repeatable)"
    )]
    pub exclude: Vec<String>,
    #[arg(
        long = "pip",
        value_name = "PATH",
        help = "pip executable to build with (repeatable, one build each)"
    )]
    pub pip_paths: Vec<PathBuf>,
    #[arg(long, help = "Validate the archive after creating it")]
    pub validate: bool,
    #[arg(
        value_name = "WHEEL_ARG",
        last = true,
        allow_hyphen_values = true,
        help = "Extra arguments passed to `pip wheel`"
    )]
    pub wheel_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(value_name = "SOURCE", help = "Archive path or URL")]
    pub source: String,
    #[arg(long, help = "Validate even when the host platform is not supported")]
    pub ignore_platform: bool,
    #[arg(short, long, help = "Pass --upgrade to the installer")]
    pub upgrade: bool,
    #[arg(
        value_name = "INSTALL_ARG",
        last = true,
        allow_hyphen_values = true,
        help = "Extra arguments passed to `pip install`"
    )]
    pub install_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[arg(value_name = "SOURCE", help = "Archive path or URL")]
    pub source: String,
    #[arg(
        long,
        value_name = "DIR",
        help = "Virtual environment to install into (default: the detected interpreter)"
    )]
    pub venv: Option<PathBuf>,
    #[arg(
        short = 'r',
        long = "requirements-file",
        value_name = "FILE",
        help = "Also install this requirements file from the bundled wheels"
    )]
    pub requirement_files: Vec<String>,
    #[arg(short, long, help = "Pass --upgrade to the installer")]
    pub upgrade: bool,
    #[arg(long, help = "Install even when the host platform is not supported")]
    pub ignore_platform: bool,
    #[arg(
        value_name = "INSTALL_ARG",
        last = true,
        allow_hyphen_values = true,
        help = "Extra arguments passed to `pip install`"
    )]
    pub install_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(value_name = "SOURCE", help = "Archive path or URL")]
    pub source: String,
}

#[derive(Args, Debug)]
pub struct GetFileArgs {
    #[arg(value_name = "SOURCE", help = "Archive path or URL")]
    pub source: String,
    #[arg(
        short,
        long,
        value_name = "FILENAME",
        help = "Name of the stored file, as printed by list-files"
    )]
    pub filename: String,
    #[arg(
        short,
        long = "output-directory",
        value_name = "DIR",
        default_value = ".",
        help = "Directory to copy the file into"
    )]
    pub output_dir: PathBuf,
}
