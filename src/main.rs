//! Kuzco CLI - a terminal assistant for locally hosted language models.

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::Parser;
use kuzco::cli::{Action, Cli, Commands};
use kuzco::config::{self, ConfigOverrides, ConfigSources, ResolvedSettings};
use kuzco::edit::EditApplier;
use kuzco::gate::TerminalPrompter;
use kuzco::runtime::{ModelRuntime, OllamaClient};
use kuzco::session::{self, Assistant};
use kuzco::{Result, sys, ui};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "KUZCO_LOG";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nGoodbye!");
        process::exit(130);
    }) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let resolved = match resolve_settings(&cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{}", ui::report(&e));
            process::exit(1);
        }
    };

    if let Err(e) = run(cli, resolved) {
        eprintln!("{}", ui::report(&e));
        process::exit(1);
    }
}

/// Log to stderr. `KUZCO_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "kuzco=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn resolve_settings(cli: &Cli) -> Result<ResolvedSettings> {
    let cwd = env::current_dir()?;
    let sources = ConfigSources::load(&cwd)?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref model) = cli.model {
        overrides = overrides.with_model(model);
    }
    if let Some(ref host) = cli.host {
        overrides = overrides.with_host(host);
    }

    let resolved = config::resolve(&sources, &overrides)?;
    tracing::debug!(settings = ?resolved.settings, "resolved configuration");
    Ok(resolved)
}

fn run(cli: Cli, resolved: ResolvedSettings) -> Result<()> {
    match cli.command {
        Some(Commands::Config) => return show_config(&resolved),
        Some(Commands::Backups { ref file }) => {
            let applier = EditApplier::from_settings(&resolved.settings);
            session::list_backups(&applier, file, &mut io::stdout())?;
            return Ok(());
        }
        Some(Commands::Restore {
            ref backup,
            ref file,
        }) => {
            let applier = EditApplier::from_settings(&resolved.settings);
            let mut prompter = TerminalPrompter::stdio();
            session::restore_backup(&applier, backup, file, &mut prompter, &mut io::stdout())?;
            return Ok(());
        }
        None => {}
    }

    let settings = resolved.settings;
    if let Some(notice) = sys::privilege_notice() {
        eprintln!("{}", ui::format_warning("privileges", &notice, None));
    }

    let runtime = OllamaClient::new(&settings.ollama_host);
    runtime.ping()?;
    tracing::debug!(url = runtime.base_url(), "model runtime reachable");

    let model = {
        let mut prompter = TerminalPrompter::stdio();
        session::select_model(
            &runtime,
            settings.default_model.as_deref(),
            &mut prompter,
            &mut io::stdout(),
        )?
    };

    let action = cli.action();
    let mut assistant = Assistant::new(settings, model, Box::new(runtime), cli.yes);

    match action {
        Action::Read { file, prompt } => {
            assistant.analyze_file(&file, prompt.as_deref())?;
        }
        Action::Edit { file, instruction } => {
            assistant.edit_file(&file, &instruction)?;
        }
        Action::System(question) => {
            assistant.system_question(&question)?;
        }
        Action::Chat => assistant.chat()?,
    }
    Ok(())
}

/// Print every setting with the layer it came from.
fn show_config(resolved: &ResolvedSettings) -> Result<()> {
    let mut out = io::stdout().lock();
    match config::config_file_path() {
        Some(path) => writeln!(out, "Config file: {}", describe_path(&path))?,
        None => writeln!(out, "Config file: (no config directory)")?,
    }
    for (key, value) in resolved.entries() {
        writeln!(out, "{} = {}  ({})", key, value.value, value.source)?;
    }
    Ok(())
}

fn describe_path(path: &Path) -> String {
    if path.is_file() {
        path.display().to_string()
    } else {
        format!("{} (not present)", path.display())
    }
}
