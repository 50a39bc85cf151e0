use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use copytab::cli::{get_program_name, new_format_id, parse_args, print_help, print_version, Command};
use copytab::config::{settings_path, JsonFileStore, Settings};
use copytab::context::PageVars;
use copytab::presets::{Preset, PresetRegistry, BUILTIN_IDS};
use copytab::runner::{evaluate_with, EvaluationContext};
use copytab::{Formatted, Formatter, PresetError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let prog = get_program_name();

    let invocation = match parse_args(&args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("{}: {}", prog, e);
            eprintln!("Run '{} help' for usage.", prog);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(invocation.verbose) {
        eprintln!("{}: logging disabled: {}", prog, e);
    }

    match run(invocation.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", prog, e);
            ExitCode::from(1)
        }
    }
}

fn log_level(verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    match env::var("COPYTAB_LOG").map(|v| v.to_ascii_lowercase()).as_deref() {
        Ok("error") => Level::ERROR,
        Ok("info") => Level::INFO,
        Ok("debug") => Level::DEBUG,
        Ok("trace") => Level::TRACE,
        _ => Level::WARN,
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(verbose))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Print formatted text, reporting recovered errors on stderr.
fn emit(out: Formatted) {
    for d in &out.diagnostics {
        eprintln!("warning: {}", d);
    }
    println!("{}", out.text);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Help => print_help(),
        Command::Version => print_version(),
        Command::Format { spec, page } => {
            let formatter = Formatter::new(load_settings().1.engine);
            emit(formatter.format(&spec, &page));
        }
        Command::Eval { source, page } => {
            let (_, settings) = load_settings();
            let ctx = EvaluationContext::for_page(&PageVars::from_page(&page));
            let value = evaluate_with(&source, &ctx, &settings.engine)?;
            println!("{}", value);
        }
        Command::List { all } => {
            let (_, settings) = load_settings();
            let registry = PresetRegistry::new(settings);
            let shown: Vec<&Preset> = if all { registry.presets().iter().collect() } else { registry.active() };
            for preset in shown {
                if !all {
                    println!("{}\t{} {}", preset.id(), preset.icon(), preset.name());
                    continue;
                }
                let state = if registry.is_enabled(preset.id()) { "enabled" } else { "disabled" };
                let kind = if preset.is_builtin() { "built-in" } else { "custom" };
                println!("{}\t{} {}\t{}, {}\t{}", preset.id(), preset.icon(), preset.name(), kind, state, preset.description());
            }
        }
        Command::Copy { id, page } => {
            let (_, settings) = load_settings();
            let engine = settings.engine.clone();
            let registry = PresetRegistry::new(settings);
            let preset = registry.get(&id).ok_or_else(|| PresetError::UnknownPreset(id.clone()))?;
            emit(registry.apply(preset, &page, &engine));
        }
        Command::AddFormat { mut spec } => {
            spec.id = new_format_id();
            let id = spec.id.clone();
            update_registry(|r| r.add_custom(spec).map_err(Into::into))?;
            println!("{}", id);
        }
        Command::RemoveFormat { id } => {
            update_registry(|r| r.remove_custom(&id).map(|_| ()).map_err(Into::into))?;
        }
        Command::Toggle { id } => {
            let mut enabled = false;
            update_registry(|r| {
                enabled = r.toggle(&id)?;
                Ok(())
            })?;
            println!("{} {}", id, if enabled { "enabled" } else { "disabled" });
        }
        Command::Order { ids } => {
            update_registry(|r| r.set_order(ids).map_err(Into::into))?;
        }
    }
    Ok(())
}

/// Settings load never fails: unusable files fall back to defaults.
fn load_settings() -> (JsonFileStore, Settings) {
    let mut store = JsonFileStore::new(settings_path());
    tracing::debug!(path = %store.path().display(), "loading settings");
    let settings = Settings::load(&mut store, BUILTIN_IDS);
    (store, settings)
}

/// Load, mutate and save the preset settings.
fn update_registry<F>(change: F) -> Result<()>
where
    F: FnOnce(&mut PresetRegistry) -> Result<()>,
{
    let (mut store, settings) = load_settings();
    let mut registry = PresetRegistry::new(settings);
    change(&mut registry)?;
    registry
        .settings()
        .save(&mut store)
        .with_context(|| format!("failed to save settings to {}", store.path().display()))?;
    Ok(())
}
