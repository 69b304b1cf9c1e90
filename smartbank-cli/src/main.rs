//! Smart Bank CLI - command-line client for the Smart Bank ledger
//!
//! Every account command goes through the same session gate, controllers and
//! confirmation flow as any other front end built on `smartbank-client`.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use smartbank_client::{
    Dashboard, DashboardAccess, FileRecordStore, HttpGateway, OperationPhase, OperationState,
    SessionStore,
};
use smartbank_core::{
    config_search_paths, default_config_path, format_currency, init_logging,
    log_operation_error, log_operation_start, log_operation_success, AccountId, BankError,
    BankResult, ErrorContext, LedgerGateway, LoggingConfig, SmartBankConfig,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "smartbank")]
#[command(about = "Manage your Smart Bank accounts from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new user on the ledger
    Register {
        email: String,

        /// Full name shown in greetings
        #[arg(short, long)]
        name: String,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log in and remember the session
    Login {
        email: String,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show who is logged in
    Whoami,

    /// List accounts with the total balance
    Accounts,

    /// Open a new account
    Open {
        /// Account type: savings, current or fd
        #[arg(short = 't', long = "type", default_value = "savings")]
        account_type: String,

        /// Initial deposit, at least 500
        #[arg(short, long, default_value = "500")]
        deposit: Decimal,
    },

    /// Move money out of one of your accounts
    Transfer {
        /// Source account id
        #[arg(long)]
        from: AccountId,

        /// Destination account number
        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: Decimal,
    },

    /// Close an account (its balance must be zero)
    Close {
        /// Account id
        id: AccountId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check that the ledger is reachable
    Status,

    /// Manage configuration
    Config {
        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

/// Handles shared by the session-aware commands
struct App {
    sessions: SessionStore,
    gateway: Arc<dyn LedgerGateway>,
}

impl App {
    fn new(config: &SmartBankConfig) -> BankResult<Self> {
        config.validate()?;

        let gateway: Arc<dyn LedgerGateway> = Arc::new(HttpGateway::new(&config.ledger)?);
        let records = Arc::new(FileRecordStore::new(config.resolve_data_dir())?);

        Ok(Self {
            sessions: SessionStore::new(records, Arc::clone(&gateway)),
            gateway,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging_config).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Smart Bank CLI v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_env_overrides();

    let result = match cli.command {
        Commands::Config {
            init,
            show,
            validate,
        } => handle_config(&config, init, show, validate),
        command => match App::new(&config) {
            Ok(app) => run(&app, &config, command).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            e.log();
            eprintln!("❌ {}", e.user_message());
            if let Some(context) = e.context() {
                for suggestion in &context.recovery_suggestions {
                    eprintln!("   💡 {}", suggestion);
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Dispatch a session-aware command. `Ok(false)` means the command ran but
/// the outcome was a failure the user has already been shown.
async fn run(app: &App, config: &SmartBankConfig, command: Commands) -> BankResult<bool> {
    match command {
        Commands::Register {
            email,
            name,
            password,
        } => handle_register(app, &email, &name, password).await,
        Commands::Login { email, password } => handle_login(app, &email, password).await,
        Commands::Logout => handle_logout(app),
        Commands::Whoami => Ok(handle_whoami(app)),
        Commands::Accounts => handle_accounts(app).await,
        Commands::Open {
            account_type,
            deposit,
        } => handle_open(app, &account_type, deposit).await,
        Commands::Transfer { from, to, amount } => {
            handle_transfer(app, from, &to, amount).await
        }
        Commands::Close { id, yes } => handle_close(app, id, yes).await,
        Commands::Status => handle_status(app).await,
        Commands::Config {
            init,
            show,
            validate,
        } => handle_config(config, init, show, validate),
    }
}

fn load_config(config_path: Option<&PathBuf>) -> BankResult<SmartBankConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return SmartBankConfig::from_file(path);
    }

    for path in config_search_paths() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return SmartBankConfig::from_file(&path);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(SmartBankConfig::default())
}

async fn handle_register(
    app: &App,
    email: &str,
    name: &str,
    password: Option<String>,
) -> BankResult<bool> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    let message = app.sessions.register(email, &password, name).await?;
    println!("✅ {}", message);
    Ok(true)
}

async fn handle_login(app: &App, email: &str, password: Option<String>) -> BankResult<bool> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    let session = app.sessions.login(email, &password).await?;
    println!("✅ Welcome, {}!", session.display_name);
    Ok(true)
}

fn handle_logout(app: &App) -> BankResult<bool> {
    app.sessions.logout()?;
    println!("👋 Logged out");
    Ok(true)
}

fn handle_whoami(app: &App) -> bool {
    match app.sessions.current_session() {
        Some(session) => {
            println!("{} <{}>", session.display_name, session.subject_email);
            true
        }
        None => {
            print_login_notice();
            false
        }
    }
}

async fn handle_accounts(app: &App) -> BankResult<bool> {
    let Some(dashboard) = enter_dashboard(app).await else {
        return Ok(false);
    };

    println!("{}", dashboard.greeting());

    if let Some(message) = dashboard.message() {
        println!("❌ {}", message);
        return Ok(false);
    }

    print_accounts(&dashboard);
    Ok(true)
}

async fn handle_open(app: &App, account_type: &str, deposit: Decimal) -> BankResult<bool> {
    let Some(dashboard) = enter_dashboard(app).await else {
        return Ok(false);
    };

    let create = dashboard.create_account();
    create.set_account_type(account_type);
    create.set_initial_deposit(deposit);

    if let Err(e) = create.submit().await {
        e.log();
    }
    create.wait_for_refresh().await;

    let succeeded = report(&create.state());
    if succeeded {
        print_accounts(&dashboard);
    }
    Ok(succeeded)
}

async fn handle_transfer(
    app: &App,
    from: AccountId,
    to: &str,
    amount: Decimal,
) -> BankResult<bool> {
    let Some(dashboard) = enter_dashboard(app).await else {
        return Ok(false);
    };

    let transfer = dashboard.transfer_funds();
    transfer.select_source(from);
    transfer.set_destination(to);
    transfer.set_amount(amount);

    if let Err(e) = transfer.submit().await {
        e.log();
    }
    transfer.wait_for_refresh().await;

    let succeeded = report(&transfer.state());
    if succeeded {
        if let Some(source) = dashboard.cache().find(from) {
            println!(
                "   {} balance: {}",
                source.account_number,
                format_currency(source.balance)
            );
        }
    }
    Ok(succeeded)
}

async fn handle_close(app: &App, account_id: AccountId, yes: bool) -> BankResult<bool> {
    let Some(dashboard) = enter_dashboard(app).await else {
        return Ok(false);
    };

    let deletion = dashboard.deletion();
    deletion.request_delete(account_id)?;

    if !yes {
        let label = dashboard
            .cache()
            .find(account_id)
            .map(|account| {
                format!(
                    "{} {} ({})",
                    account.account_type,
                    account.account_number,
                    format_currency(account.balance)
                )
            })
            .unwrap_or_else(|| format!("account {}", account_id));

        let answer = prompt(&format!(
            "Delete {}? This cannot be undone. [y/N] ",
            label
        ))?;

        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            deletion.cancel()?;
            println!("Cancelled; nothing was deleted.");
            return Ok(true);
        }
    }

    if deletion.confirm().await.is_err() {
        if let Some(message) = deletion.message() {
            println!("❌ {}", message);
        }
        return Ok(false);
    }

    deletion.wait_for_refresh().await;
    let succeeded = report(&deletion.operation_state());
    print_accounts(&dashboard);
    Ok(succeeded)
}

async fn handle_status(app: &App) -> BankResult<bool> {
    log_operation_start!("health_check");

    let status = app.gateway.health().await.inspect_err(|e| {
        log_operation_error!("health_check", e);
    })?;

    log_operation_success!("health_check", status = %status);
    println!("✅ Ledger: {}", status);

    match app.sessions.current_session() {
        Some(session) => println!("🔑 Logged in as {}", session.subject_email),
        None => println!("🔒 Not logged in"),
    }
    Ok(true)
}

fn handle_config(config: &SmartBankConfig, init: bool, show: bool, validate: bool) -> BankResult<bool> {
    if init {
        let config_path = default_config_path().ok_or_else(|| BankError::Config {
            message: "Could not determine a configuration directory".to_string(),
            source: None,
            context: ErrorContext::new("cli")
                .with_operation("config_init")
                .with_suggestion("Pass an explicit path with --config"),
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        SmartBankConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {:?}", config_path);
    }

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| BankError::Config {
            message: format!("Failed to render configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("cli").with_operation("config_show"),
        })?;
        println!("📋 Current configuration:");
        println!("{}", rendered);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(true)
}

/// The dashboard, or `None` after telling the user to log in.
async fn enter_dashboard(app: &App) -> Option<Dashboard> {
    match Dashboard::enter(&app.sessions).await {
        DashboardAccess::Granted(dashboard) => Some(dashboard),
        DashboardAccess::RedirectToLogin => {
            print_login_notice();
            None
        }
    }
}

fn print_login_notice() {
    println!("🔒 You are not logged in. Run 'smartbank login <email>' first.");
}

fn print_accounts(dashboard: &Dashboard) {
    let accounts = dashboard.accounts();

    if accounts.is_empty() {
        println!("No accounts yet. Open one with 'smartbank open'.");
    } else {
        println!(
            "{:>6}  {:<14} {:<8} {:<7} {:>14}",
            "ID", "NUMBER", "TYPE", "STATUS", "BALANCE"
        );
        for account in accounts.iter() {
            println!(
                "{:>6}  {:<14} {:<8} {:<7} {:>14}",
                account.id,
                account.account_number,
                account.account_type.to_string(),
                account.status.to_string(),
                format_currency(account.balance)
            );
        }
    }

    let summary = dashboard.summary();
    println!(
        "Total balance: {} across {} account(s)",
        summary.formatted_total(),
        summary.account_count
    );
}

/// Print a controller's outcome; true when it succeeded.
fn report(state: &OperationState) -> bool {
    match state.phase {
        OperationPhase::Succeeded => {
            println!("✅ {}", state.message);
            true
        }
        _ => {
            println!("❌ {}", state.message);
            false
        }
    }
}

fn prompt(label: &str) -> BankResult<String> {
    print!("{}", label);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
