//! broker-access CLI entrypoint.
//!
//! This is the main entrypoint for the broker-access command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use broker_access::access::AccessDeclaration;
use broker_access::cli::{Cli, Commands, OutputFormatter};
use broker_access::config::{
    AccessConfig, ConfigParser, ConfigValidator, DEFAULT_CONFIG_FILES, find_config_file,
};
use broker_access::error::{AccessError, Result};
use broker_access::platform::CloudControllerClient;
use broker_access::reconciler::Reconciler;
use broker_access::registrar::{BrokerRegistrar, RegistrationOutcome};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

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

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(cli.config.as_ref(), detailed, &formatter).await,
        Commands::Apply { yes } => cmd_apply(cli.config.as_ref(), yes, &formatter).await,
        Commands::Register { force } => cmd_register(cli.config.as_ref(), force, &formatter).await,
        Commands::Unregister { yes } => cmd_unregister(cli.config.as_ref(), yes).await,
        Commands::Drift => cmd_drift(cli.config.as_ref(), &formatter).await,
        Commands::Observed => cmd_observed(cli.config.as_ref(), &formatter).await,
    }
}

/// Writes the template configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing broker access configuration in: {}", path.display());

    let config_path = path.join(DEFAULT_CONFIG_FILES[0]);
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/broker-access.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    // The token lives in .env and must stay out of version control.
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.lines().any(|line| line.trim() == ".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# broker-access\n.env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Copy .env.example to .env and set CF_ACCESS_TOKEN");
    eprintln!("     (and BROKER_ACCESS_BROKER_PASSWORD if broker.url is set)");
    eprintln!("  2. Edit {} with your broker and access entries", DEFAULT_CONFIG_FILES[0]);
    eprintln!("  3. Run 'broker-access validate' to check your configuration");
    eprintln!("  4. Run 'broker-access plan' to see what would change");
    eprintln!("  5. Run 'broker-access apply' to reconcile access");

    Ok(())
}

/// Validates the configuration and prints every problem found.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().collect(&config);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    if !result.is_valid() {
        return Err(AccessError::internal(format!(
            "{} validation errors",
            result.error_count()
        )));
    }

    eprintln!("Configuration summary:");
    eprintln!("  API: {}", config.platform.api);
    eprintln!("  Broker: {}", broker_ref(&config)?);
    eprintln!("  Access entries: {}", config.service_access.len());
    Ok(())
}

/// Shows the access plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, desired) = load_config(config_path)?;
    let client = create_client(&config)?;
    let broker = broker_ref(&config)?;

    let pass = Reconciler::new(&client, broker).prepare(&desired).await?;

    eprintln!("{}", formatter.format_plan(&pass.plan));

    if detailed {
        eprintln!("Observed access:");
        eprintln!("{}", formatter.format_declarations(&pass.observed));
    }

    Ok(())
}

/// Applies the access plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, desired) = load_config(config_path)?;
    let client = create_client(&config)?;
    let broker = broker_ref(&config)?;

    if config.broker.url.is_some() {
        let outcome = ensure_registered(&client, &config, false).await?;
        eprintln!("{}", formatter.format_registration(&outcome));
    }

    let reconciler = Reconciler::new(&client, broker);

    let plan = reconciler.plan(&desired).await?;
    if plan.is_empty() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    eprintln!("{}", formatter.format_plan(&plan));

    if !auto_approve && !confirm("Do you want to apply this plan?")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    // Aborts if the platform changed while the prompt was open.
    let result = reconciler.reconcile_approved(&desired, &plan).await?;
    eprintln!("{}", formatter.format_reconciliation(&result));

    Ok(())
}

/// Registers the broker or updates its registration.
async fn cmd_register(
    config_path: Option<&PathBuf>,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_client(&config)?;

    let outcome = ensure_registered(&client, &config, force).await?;
    eprintln!("{}", formatter.format_registration(&outcome));
    Ok(())
}

/// Deletes the broker registration.
async fn cmd_unregister(config_path: Option<&PathBuf>, auto_approve: bool) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_client(&config)?;
    let lookup = registration_lookup(&config)?;

    if !auto_approve && !confirm(&format!("Delete the registration of broker {lookup}?"))? {
        eprintln!("Unregister cancelled.");
        return Ok(());
    }

    if BrokerRegistrar::new(&client).unregister(lookup).await? {
        eprintln!("Broker {lookup} unregistered.");
    } else {
        eprintln!("Broker {lookup} was not registered.");
    }
    Ok(())
}

/// Checks for drift.
async fn cmd_drift(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, desired) = load_config(config_path)?;
    let client = create_client(&config)?;

    let report = Reconciler::new(&client, broker_ref(&config)?)
        .check_drift(&desired)
        .await?;

    eprintln!("{}", formatter.format_drift(&report));
    Ok(())
}

/// Prints the observed access in compact form.
async fn cmd_observed(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_client(&config)?;

    let observed = Reconciler::new(&client, broker_ref(&config)?)
        .observed()
        .await?;

    eprintln!("{}", formatter.format_declarations(&observed));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Creates a parser whose `.env` lookup sits next to the config file.
fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads, overrides and validates the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<(AccessConfig, Vec<AccessDeclaration>)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    ConfigValidator::new().validate(&config)?;

    let desired = config.declarations();
    Ok((config, desired))
}

/// Returns the configured broker name or GUID.
fn broker_ref(config: &AccessConfig) -> Result<&str> {
    config
        .broker
        .reference()
        .ok_or_else(|| AccessError::internal("Broker not configured"))
}

/// Returns the broker GUID if set, otherwise its name, so renames are found.
fn registration_lookup(config: &AccessConfig) -> Result<&str> {
    config
        .broker
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map_or_else(|| broker_ref(config), Ok)
}

/// Registers or updates the configured broker.
async fn ensure_registered(
    client: &CloudControllerClient,
    config: &AccessConfig,
    force: bool,
) -> Result<RegistrationOutcome> {
    let password = ConfigParser::get_broker_password()?;
    let registration = config.broker.registration(&password).ok_or_else(|| {
        AccessError::internal("broker.name and broker.url are required to register the broker")
    })?;

    BrokerRegistrar::new(client)
        .ensure(registration_lookup(config)?, &registration, force)
        .await
}

/// Asks a yes/no question on stderr.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Creates a Cloud Controller client.
fn create_client(config: &AccessConfig) -> Result<CloudControllerClient> {
    let token = ConfigParser::get_access_token()?;
    let client = CloudControllerClient::with_options(
        &config.platform.api,
        &token,
        config.platform.timeout_secs,
        config.platform.skip_ssl_validation,
    )?;
    debug!("Using Cloud Controller at {}", client.api());
    Ok(client)
}
