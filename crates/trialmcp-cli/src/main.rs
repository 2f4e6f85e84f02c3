mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::debug;

use trialmcp_aact::AactDatabase;
use trialmcp_core::ApiBackend;
use trialmcp_mcp::catalog::{AACT, OPENFDA};
use trialmcp_mcp::{run_server, ApiTools, Dispatcher, SqlTools, ToolBackend};
use trialmcp_openfda::{endpoints, OpenFdaClient};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "trialmcp",
    version,
    about = "MCP tools for the AACT clinical trials database and the openFDA drug safety API"
)]
struct Cli {
    /// AACT database host (overrides config and DB_HOST)
    #[arg(long, global = true)]
    db_host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio
    Serve {
        /// Data source to expose
        source: Source,
    },

    /// Print the tool catalog as JSON
    Tools {
        source: Source,
    },

    /// Invoke a single tool and print its text output
    Call {
        source: Source,

        /// Tool name, e.g. read-query
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Show openFDA adverse event reports for a drug
    Events {
        /// Medicinal product name
        drug: String,

        /// Maximum reports
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Show the config file location
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// AACT clinical trials database
    Aact,
    /// openFDA drug safety API
    Openfda,
}

fn open_aact(db_host: Option<String>, config: &Config) -> Result<SqlTools<AactDatabase>> {
    let mut settings = config.aact.settings();
    if let Some(host) = db_host {
        settings.host = host;
    }
    if settings.user.is_none() {
        bail!("no AACT user configured: set DB_USER and DB_PASSWORD or [aact] user/password");
    }

    let database =
        AactDatabase::new(settings)?.with_connect_timeout(config.aact.connect_timeout());
    debug!("using AACT database {:?}", database.settings());
    Ok(SqlTools::new(database))
}

fn openfda_client(config: &Config) -> OpenFdaClient {
    OpenFdaClient::new()
        .with_base_url(config.openfda.base_url.clone())
        .with_timeout(config.openfda.timeout())
        .with_api_key(config.openfda.api_key.clone())
}

fn open_openfda(config: &Config) -> Result<ApiTools<OpenFdaClient>> {
    let endpoint = &config.openfda.default_endpoint;
    if endpoints::resolve(endpoint).is_none() {
        bail!("configured default endpoint is unknown: {endpoint}");
    }

    let client = openfda_client(config);
    let base_url = client.base_url().to_string();
    Ok(ApiTools::new(client)
        .with_base_url(base_url)
        .with_defaults(endpoint.clone(), config.openfda.default_limit))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config()?;
    let instructions = config.mcp.instructions.clone();

    match cli.command {
        Commands::Serve { source } => match source {
            Source::Aact => {
                run_server(Dispatcher::new(open_aact(cli.db_host, &config)?), instructions)
            }
            Source::Openfda => run_server(Dispatcher::new(open_openfda(&config)?), instructions),
        },
        Commands::Tools { source } => {
            let catalog = match source {
                Source::Aact => &AACT,
                Source::Openfda => &OPENFDA,
            };
            println!("{}", serde_json::to_string_pretty(&catalog.tool_definitions())?);
            Ok(())
        }
        Commands::Call { source, tool, args } => match source {
            Source::Aact => {
                cmd_call(Dispatcher::new(open_aact(cli.db_host, &config)?), &tool, args)
            }
            Source::Openfda => cmd_call(Dispatcher::new(open_openfda(&config)?), &tool, args),
        },
        Commands::Events { drug, limit } => cmd_events(&config, &drug, limit),
        Commands::Config => {
            println!("{}", config::show_config_path());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_call<B: ToolBackend>(
    dispatcher: Dispatcher<B>,
    tool: &str,
    args: Option<String>,
) -> Result<()> {
    let args: Option<Value> = args
        .map(|a| serde_json::from_str(&a))
        .transpose()
        .context("--args must be a JSON object")?;

    let result = dispatcher.execute(tool, args.as_ref());
    dispatcher.shutdown();

    let result = result.with_context(|| format!("{tool} failed"))?;
    for block in &result.content {
        println!("{}", block.text);
    }
    Ok(())
}

fn cmd_events(config: &Config, drug: &str, limit: u32) -> Result<()> {
    let client = openfda_client(config);
    let events = client.drug_events(drug, limit);
    client.close();

    let events = events.with_context(|| format!("fetching adverse events for {drug}"))?;
    if events.is_empty() {
        println!("No adverse event reports found.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_call() {
        let cli = Cli::try_parse_from([
            "trialmcp",
            "--db-host",
            "localhost",
            "call",
            "aact",
            "read-query",
            "--args",
            r#"{"query":"SELECT 1"}"#,
        ])
        .unwrap();

        assert_eq!(cli.db_host.as_deref(), Some("localhost"));
        match cli.command {
            Commands::Call { tool, args, .. } => {
                assert_eq!(tool, "read-query");
                assert!(args.unwrap().contains("SELECT 1"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let config = Config::default();
        let err = open_aact(None, &config).unwrap_err();
        assert!(err.to_string().contains("DB_USER"));
    }

    #[test]
    fn test_host_flag_overrides_config() {
        let mut config = Config::default();
        config.aact.user = Some("reader".into());
        let tools = open_aact(Some("localhost".into()), &config).unwrap();
        assert_eq!(tools.db().settings().host, "localhost");
        assert_eq!(tools.db().settings().database, "aact");
    }

    #[test]
    fn test_openfda_tools_use_client_base_url() {
        let mut config = Config::default();
        config.openfda.base_url = "http://localhost:9200".into();
        let tools = open_openfda(&config).unwrap();
        assert_eq!(tools.client().base_url(), "http://localhost:9200");
    }

    #[test]
    fn test_unknown_default_endpoint_is_rejected() {
        let mut config = Config::default();
        config.openfda.default_endpoint = "device/event".into();
        assert!(open_openfda(&config).is_err());
    }
}
