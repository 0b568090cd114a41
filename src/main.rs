//! Stratum CLI entrypoint.
//!
//! This is the main entrypoint for the stratum command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use stratum_deploy::cli::{
    Cli, Commands, ConfigCommands, ConsoleObserver, EnvCommands, EnvSummary, OutputFormat, OutputFormatter,
};
use stratum_deploy::config::{
    find_config_file, validate_env_name, ConfigParser, ConfigValidator, DesiredState, Workspace,
};
use stratum_deploy::error::{ConfigError, Result, StateError, StratumError};
use stratum_deploy::planner::{ApplyProgress, Plan, PlanBuilder, PlanExecutor};
use stratum_deploy::provider::{LocalProvider, ProviderRegistry};
use stratum_deploy::resource::Snapshot;
use stratum_deploy::state::{CheckpointStore, Envfile, LoadedEnvfile, LocalCheckpointStore};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    // .env may set STRATUM_HOME, so it is read before the workspace.
    ConfigParser::new().load_dotenv()?;
    let mut workspace = Workspace::discover()?;
    debug!("Workspace root: {}", workspace.root().display());

    let env = cli.env.as_deref();
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Env { command } => match command {
            EnvCommands::Init { name } => cmd_env_init(&mut workspace, &name).await,
            EnvCommands::Ls => cmd_env_ls(&workspace, &formatter).await,
            EnvCommands::Rm { name, yes } => cmd_env_rm(&mut workspace, &name, yes).await,
            EnvCommands::Select { name } => cmd_env_select(&mut workspace, name.as_deref()).await,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => cmd_config_get(&workspace, env, key.as_deref(), &formatter).await,
            ConfigCommands::Set { key, value } => cmd_config_set(&workspace, env, key, value).await,
        },
        Commands::Plan {
            doc,
            output_file,
            show_sames,
            show_replace_steps,
        } => {
            let formatter = formatter
                .with_show_sames(show_sames)
                .with_show_replace_steps(show_replace_steps);
            cmd_plan(&workspace, env, doc, output_file, &formatter).await
        }
        Commands::Deploy {
            doc,
            yes,
            continue_on_error,
            show_sames,
            show_replace_steps,
        } => {
            let formatter = formatter
                .with_show_sames(show_sames)
                .with_show_replace_steps(show_replace_steps);
            cmd_deploy(&workspace, env, doc, yes, continue_on_error, &formatter).await
        }
        Commands::Destroy { yes, continue_on_error } => {
            cmd_destroy(&workspace, env, yes, continue_on_error, &formatter).await
        }
    }
}

/// Create an empty environment and select it.
async fn cmd_env_init(workspace: &mut Workspace, name: &str) -> Result<()> {
    validate_env_name(name)?;
    info!("Initializing environment '{name}'");
    let path = workspace.store().save(&Envfile::new(name), None, false).await?;
    workspace.select(Some(name))?;

    eprintln!("Environment '{name}' initialized at {}", path.display());
    eprintln!("Next steps:");
    eprintln!("  1. Write a desired-state document (stratum.yaml)");
    eprintln!("  2. Run 'stratum plan' to see what will be deployed");
    eprintln!("  3. Run 'stratum deploy' to deploy it");
    Ok(())
}

/// List environments.
async fn cmd_env_ls(workspace: &Workspace, formatter: &OutputFormatter) -> Result<()> {
    let store = workspace.store();
    let current = workspace.current_env();

    let mut envs = Vec::new();
    for name in store.list().await? {
        let (resources, deployed_at) = match store.load(&name).await {
            Ok(loaded) => (loaded.envfile.resource_count(), loaded.envfile.deployed_at()),
            Err(e) => {
                warn!("Could not read environment '{name}': {e}");
                (0, None)
            }
        };
        envs.push(EnvSummary {
            current: current.as_deref() == Some(name.as_str()),
            name,
            resources,
            deployed_at,
        });
    }

    eprintln!("{}", formatter.format_envs(&envs));
    Ok(())
}

/// Remove an environment after the user types its name.
async fn cmd_env_rm(workspace: &mut Workspace, name: &str, auto_approve: bool) -> Result<()> {
    validate_env_name(name)?;
    let store = workspace.store();
    let loaded = store.load(name).await?;

    let count = loaded.envfile.resource_count();
    if count > 0 {
        warn!("Environment '{name}' still records {count} resource(s); they will not be deleted");
    }

    if !auto_approve {
        eprint!("This will remove environment '{name}'. Type the environment name to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != name {
            eprintln!("Removal cancelled.");
            return Ok(());
        }
    }

    let backup = store.remove(name).await?;
    if workspace.current_env().as_deref() == Some(name) {
        workspace.select(None)?;
    }

    eprintln!("Environment '{name}' removed (backup kept at {})", backup.display());
    Ok(())
}

/// Select the current environment.
async fn cmd_env_select(workspace: &mut Workspace, name: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        validate_env_name(name)?;
        let store = workspace.store();
        if !store.exists(name).await? {
            return Err(StateError::NotFound {
                name: name.to_string(),
                path: store.env_path(name),
            }
            .into());
        }
    }
    workspace.select(name)?;

    match name {
        Some(name) => eprintln!("Environment '{name}' is now current"),
        None => eprintln!("No environment is current"),
    }
    Ok(())
}

/// Print configuration variables.
async fn cmd_config_get(
    workspace: &Workspace,
    env: Option<&str>,
    key: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let name = workspace.resolve_env(env)?;
    let loaded = workspace.store().load(&name).await?;
    let config = loaded.envfile.config;

    match key {
        Some(key) => {
            let value = config.get(key).ok_or_else(|| {
                ConfigError::validation(
                    format!("Configuration variable '{key}' is not set for environment '{name}'"),
                    key,
                )
            })?;
            eprintln!("{value}");
        }
        None => eprintln!("{}", formatter.format_config(&config)),
    }
    Ok(())
}

/// Set a configuration variable.
async fn cmd_config_set(workspace: &Workspace, env: Option<&str>, key: String, value: String) -> Result<()> {
    let name = workspace.resolve_env(env)?;
    let store = workspace.store();
    let mut loaded = store.load(&name).await?;

    info!("Setting '{key}' for environment '{name}'");
    loaded.envfile.config.insert(key, value);
    store.save(&loaded.envfile, Some(loaded.path.as_path()), true).await?;
    Ok(())
}

/// Show the plan for a desired-state document.
async fn cmd_plan(
    workspace: &Workspace,
    env: Option<&str>,
    doc: Option<PathBuf>,
    output_file: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let name = workspace.resolve_env(env)?;
    let store = workspace.store();
    let loaded = load_or_new(&store, &name).await?;
    let desired = load_desired(doc)?.to_snapshot(&name);

    let registry = providers();
    let plan = PlanBuilder::new(&registry)
        .build(loaded.envfile.snapshot().as_ref(), Some(&desired))
        .await?;

    if let Some(target) = output_file {
        let mut dry_run = Envfile::new(&name);
        dry_run.config = loaded.envfile.config;
        dry_run.record(plan.desired_snapshot());
        let path = store.save(&dry_run, Some(target.as_path()), true).await?;
        eprintln!("Planned snapshot written to {}", path.display());
        return Ok(());
    }

    print_prelude(&loaded.envfile, formatter);
    eprintln!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Plan and apply a desired-state document.
async fn cmd_deploy(
    workspace: &Workspace,
    env: Option<&str>,
    doc: Option<PathBuf>,
    auto_approve: bool,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let name = workspace.resolve_env(env)?;
    let store = workspace.store();
    let loaded = load_or_new(&store, &name).await?;
    let desired = load_desired(doc)?.to_snapshot(&name);

    let registry = providers();
    let plan = PlanBuilder::new(&registry)
        .build(loaded.envfile.snapshot().as_ref(), Some(&desired))
        .await?;

    print_prelude(&loaded.envfile, formatter);
    eprintln!("{}", formatter.format_plan(&plan));

    if plan.is_empty() {
        return Ok(());
    }

    if !auto_approve {
        eprint!("Do you want to deploy these changes? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Deployment cancelled.");
            return Ok(());
        }
    }

    apply_plan(&store, loaded, &plan, &registry, continue_on_error, formatter).await
}

/// Delete every resource in an environment.
async fn cmd_destroy(
    workspace: &Workspace,
    env: Option<&str>,
    auto_approve: bool,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let name = workspace.resolve_env(env)?;
    let store = workspace.store();
    let loaded = store.load(&name).await?;

    let Some(old) = loaded.envfile.snapshot().filter(|s| !s.is_empty()) else {
        eprintln!("No resources to destroy.");
        return Ok(());
    };

    let registry = providers();
    let plan = PlanBuilder::new(&registry)
        .build(Some(&old), Some(&Snapshot::empty(&name)))
        .await?;

    eprintln!("{}", formatter.format_plan(&plan));

    if !auto_approve {
        eprint!("\nThis action is IRREVERSIBLE. Type the environment name to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != name {
            eprintln!("Destruction cancelled.");
            return Ok(());
        }
    }

    apply_plan(&store, loaded, &plan, &registry, continue_on_error, formatter).await
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Providers available to this binary.
fn providers() -> ProviderRegistry {
    ProviderRegistry::new().with_provider("local", Arc::new(LocalProvider::new()))
}

/// Loads, validates and returns a desired-state document.
fn load_desired(doc: Option<PathBuf>) -> Result<DesiredState> {
    let path = doc.map_or_else(|| find_config_file("."), Ok)?;
    let desired = ConfigParser::new().load_file(&path)?;

    let result = ConfigValidator::new().validate(&desired)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(desired)
}

/// Loads an environment, or starts a fresh one if it has no envfile yet.
async fn load_or_new(store: &LocalCheckpointStore, name: &str) -> Result<LoadedEnvfile> {
    match store.load(name).await {
        Ok(loaded) => Ok(loaded),
        Err(StratumError::State(StateError::NotFound { path, .. })) => {
            info!("Environment '{name}' has no envfile yet, starting empty");
            Ok(LoadedEnvfile {
                path,
                envfile: Envfile::new(name),
            })
        }
        Err(e) => Err(e),
    }
}

/// Prints the environment's configuration before a plan.
fn print_prelude(envfile: &Envfile, formatter: &OutputFormatter) {
    if formatter.format() == OutputFormat::Text && !envfile.config.is_empty() {
        eprintln!("Configuration:");
        eprintln!("{}", formatter.format_config(&envfile.config));
    }
}

/// Applies a plan and saves the resulting checkpoint, even after a failure.
async fn apply_plan(
    store: &LocalCheckpointStore,
    loaded: LoadedEnvfile,
    plan: &Plan,
    registry: &ProviderRegistry,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let LoadedEnvfile { path, mut envfile } = loaded;
    let executor = PlanExecutor::new(registry).with_continue_on_error(continue_on_error);
    let progress = ApplyProgress::new(plan.len());

    let start = Instant::now();
    let outcome = if formatter.format() == OutputFormat::Json {
        executor.execute(plan, progress, &mut ()).await
    } else {
        let mut observer = ConsoleObserver::new(std::io::stderr());
        executor.execute(plan, progress, &mut observer).await
    };
    let elapsed = start.elapsed();

    envfile.record(outcome.checkpoint.clone());
    let saved = store.save(&envfile, Some(path.as_path()), true).await;

    eprintln!("\n{}", formatter.format_outcome(&outcome, elapsed));

    match (saved, outcome.error) {
        (Ok(path), None) => {
            info!("Checkpoint saved to {}", path.display());
            Ok(())
        }
        (Ok(path), Some(e)) => {
            info!("Checkpoint saved to {}", path.display());
            Err(e)
        }
        (Err(save_error), step_error) => {
            error!("Failed to save checkpoint: {save_error}");
            Err(step_error.unwrap_or(save_error))
        }
    }
}
