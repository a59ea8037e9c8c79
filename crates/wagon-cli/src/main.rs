use std::io;
use std::sync::Arc;

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use serde_json::{json, Value};
use wagon_core::{
    create_archive, get_archive_file, install_archive, list_archive_files, show_archive,
    validate_archive, CommandContext, CommandStatus, Config, CreateRequest, ExecutionOutcome,
    GetFileRequest, InstallRequest, SharedEffects, ShowRequest, SystemEffects, ValidateRequest,
};

mod cli;
mod style;

use cli::{CommandCli, WagonCli};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = WagonCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let config = Config::from_env();
    let effects: SharedEffects = Arc::new(SystemEffects::new(&config));
    let ctx = CommandContext::new(config, effects);

    let outcome = dispatch(&ctx, &cli.command);
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    // `wagon` also matches the `wagon_core` and `wagon_domain` targets.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(format!("wagon={level}"))
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
    if let Err(err) = installed {
        eprintln!("wagon: logging disabled: {err}");
    }
}

fn dispatch(ctx: &CommandContext, command: &CommandCli) -> ExecutionOutcome {
    match command {
        CommandCli::Create(args) => create_archive(
            ctx,
            CreateRequest {
                source: args.source.clone(),
                requirement_files: args.requirement_files.clone(),
                wheel_args: args.wheel_args.clone(),
                pip_paths: args.pip_paths.clone(),
                exclude: args.exclude.clone(),
                python_versions: args.python_versions.clone(),
                supported_platform: args.supported_platform.clone(),
                build_tag: args.build_tag.clone(),
                add_files: args.add_files.clone(),
                output_dir: args.output_dir.clone(),
                format: args.format,
                force: args.force,
                keep_wheels: args.keep_wheels,
                validate: args.validate,
                scratch_dir: None,
            },
        ),
        CommandCli::Validate(args) => validate_archive(
            ctx,
            ValidateRequest {
                source: args.source.clone(),
                ignore_platform: args.ignore_platform,
                upgrade: args.upgrade,
                install_args: args.install_args.clone(),
                scratch_dir: None,
                host_platform: None,
            },
        ),
        CommandCli::Install(args) => install_archive(
            ctx,
            InstallRequest {
                source: args.source.clone(),
                venv: args.venv.clone(),
                requirement_files: args.requirement_files.clone(),
                upgrade: args.upgrade,
                ignore_platform: args.ignore_platform,
                install_args: args.install_args.clone(),
                scratch_dir: None,
                host_platform: None,
            },
        ),
        CommandCli::Show(args) => show_archive(
            ctx,
            ShowRequest {
                source: args.source.clone(),
                scratch_dir: None,
            },
        ),
        CommandCli::ListFiles(args) => list_archive_files(
            ctx,
            ShowRequest {
                source: args.source.clone(),
                scratch_dir: None,
            },
        ),
        CommandCli::GetFile(args) => get_archive_file(
            ctx,
            GetFileRequest {
                source: args.source.clone(),
                filename: args.filename.clone(),
                output_dir: args.output_dir.clone(),
                scratch_dir: None,
            },
        ),
    }
}

fn emit_output(cli: &WagonCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();

    if cli.json {
        let payload = json!({
            "status": outcome.status,
            "message": outcome.message,
            "details": outcome.details,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let passthrough = matches!(cli.command, CommandCli::Show(_) | CommandCli::ListFiles(_));
    if outcome.status == CommandStatus::Ok {
        if cli.quiet {
            return Ok(code);
        }
        if passthrough {
            println!("{}", outcome.message);
        } else {
            let style = Style::new(cli.no_color, atty::is(Stream::Stdout));
            println!("{}", style.status(outcome.status, &outcome.message));
        }
        return Ok(code);
    }

    let style = Style::new(cli.no_color, atty::is(Stream::Stderr));
    eprintln!("{}", style.status(outcome.status, &outcome.message));
    if let Some(output) = captured_output(&outcome.details) {
        eprintln!("{}", style.captured(output));
    }
    if let Some(hint) = hint_from_details(&outcome.details) {
        eprintln!("{}", style.info(&format!("Hint: {hint}")));
    }
    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details.get("hint").and_then(Value::as_str)
}

fn captured_output(details: &Value) -> Option<&str> {
    details
        .get("output")
        .or_else(|| details.get("failure").and_then(|failure| failure.get("output")))
        .and_then(Value::as_str)
        .filter(|output| !output.trim().is_empty())
}
