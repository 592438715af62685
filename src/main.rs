//! db2i-tools - SQL tools for language-model agents working against Db2 for i.

mod cli;

use cli::{Cli, Command, SystemsCommand};
use db2i_tools::config::{Config, ConnectionConfig};
use db2i_tools::db::{MapepireDaemon, SqliteDaemon};
use db2i_tools::error::{Db2iError, Result};
use db2i_tools::logging::{init_file_logging, init_stderr_logging};
use db2i_tools::persistence::{NewSystem, SecretStorage, SecretStorageStatus, StateDb};
use db2i_tools::tools::Db2iTools;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Schema name used for SQLite files.
const SQLITE_SCHEMA: &str = "main";

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    if cli.log_file {
        init_file_logging();
    } else {
        init_stderr_logging();
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config_path();
    debug!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    match &cli.command {
        Command::Systems { action } => run_systems(cli, &config, action).await,
        Command::Tools => {
            let definitions = cli.tools_options(&config.tools).tool_definitions();
            print_json(&definitions)
        }
        command => {
            let toolkit = build_toolkit(cli, &config).await?;
            let output = run_tool(&toolkit, command).await?;
            println!("{output}");
            Ok(())
        }
    }
}

async fn run_tool(toolkit: &Db2iTools, command: &Command) -> Result<String> {
    let output = match command {
        Command::ListTables => toolkit.list_tables().await,
        Command::DescribeTable { table } => toolkit.describe_table(table).await,
        Command::RunSql {
            sql,
            params,
            include_columns,
            fetch,
        } => toolkit.run_sql(sql, params, *include_columns, *fetch).await,
        Command::Call { tool, arguments } => {
            let arguments = match arguments {
                Some(text) => serde_json::from_str(text).map_err(|e| {
                    Db2iError::invalid_argument(format!("Arguments are not valid JSON: {e}"))
                })?,
                None => serde_json::Value::Null,
            };
            toolkit.dispatch(tool, arguments).await
        }
        Command::Tools | Command::Systems { .. } => {
            return Err(Db2iError::internal("Command does not run a tool"));
        }
    };
    Ok(output)
}

/// Builds the toolkit for a local SQLite file or the Mapepire daemon.
async fn build_toolkit(cli: &Cli, config: &Config) -> Result<Db2iTools> {
    let options = cli.tools_options(&config.tools);

    if let Some(path) = &cli.sqlite {
        let daemon = SqliteDaemon::open(path)?;
        let schema = cli.schema.clone().unwrap_or_else(|| SQLITE_SCHEMA.to_string());
        info!("Using SQLite database {}", path.display());
        return Ok(Db2iTools::new(Arc::new(daemon), schema, options));
    }

    let connection = resolve_connection(cli, config).await?;
    let server = connection.daemon_server()?;
    let schema = connection.schema()?.to_string();
    info!("Connection: {}", connection.display_string());

    Ok(Db2iTools::new(
        Arc::new(MapepireDaemon::new(server)),
        schema,
        options,
    ))
}

/// Resolves the final connection configuration.
///
/// Precedence, highest first: CLI arguments, saved system, named or default
/// connection from the config file, environment variables.
async fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = match cli.connection_name() {
        Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
            Db2iError::config(format!("Connection '{name}' not found in config file"))
        })?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    if let Some(host) = &cli.system {
        let state = open_state_db(cli).await?;
        let system = state
            .get_system(host)
            .await?
            .ok_or_else(|| Db2iError::config(format!("System '{host}' not found")))?;
        let password = state.get_system_password(host).await?;
        state.close().await;
        connection.merge(&system.connection_config(password));
    }

    if let Some(cli_connection) = cli.to_connection_config() {
        connection.merge(&cli_connection);
    }

    connection.apply_env_defaults();
    Ok(connection)
}

async fn open_state_db(cli: &Cli) -> Result<StateDb> {
    match &cli.state_db {
        Some(path) => StateDb::open(path).await,
        None => StateDb::open_default().await,
    }
}

async fn run_systems(cli: &Cli, config: &Config, action: &SystemsCommand) -> Result<()> {
    let state = open_state_db(cli).await?;

    let result = match action {
        SystemsCommand::Add => add_system(cli, config, &state).await,
        SystemsCommand::Get { target } => match state.get_system(target).await? {
            Some(system) => print_json(&system),
            None => Err(Db2iError::config(format!("System '{target}' not found"))),
        },
        SystemsCommand::List => {
            let systems = state.list_systems().await?;
            if systems.is_empty() {
                println!("No saved systems");
            }
            for system in systems {
                println!("{}\t{}", system.id, system.display_string());
            }
            Ok(())
        }
        SystemsCommand::Remove { target } => {
            let removed = state.delete_system(target).await?;
            println!("Removed {removed} system(s) for {target}");
            Ok(())
        }
    };

    state.close().await;
    result
}

async fn add_system(cli: &Cli, config: &Config, state: &StateDb) -> Result<()> {
    let connection = resolve_connection(cli, config).await?;
    let server = connection.daemon_server()?;
    let schema = connection.schema()?.to_string();

    let masked = SecretStorage::mask_secret(&server.password);
    match state.secret_storage_status() {
        SecretStorageStatus::Secure => info!("Storing password {masked} in the OS keyring"),
        SecretStorageStatus::Plaintext => warn!(
            "OS keyring unavailable; password {masked} is stored in plaintext in the state database"
        ),
    }

    let system = state
        .create_system(&NewSystem {
            host: server.host,
            user: server.user,
            password: server.password,
            port: server.port,
            schema,
        })
        .await?;

    println!("Saved system {} (id {})", system.display_string(), system.id);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Db2iError::internal(format!("Failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}
