use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wiki_lookup::config::{default_config_path, find_config_file, load_config, save_config, Config};
use wiki_lookup::mcp::McpServer;
use wiki_lookup::relay::RelayServer;

/// Wiki Lookup - answer questions with Wikipedia summaries over MCP
#[derive(Parser, Debug)]
#[command(name = "wiki-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server that looks up Wikipedia articles", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio unless --http is given)
    Serve {
        /// Serve streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Host to bind in HTTP mode
        #[arg(long)]
        host: Option<String>,

        /// Port to bind in HTTP mode
        #[arg(long, short)]
        port: Option<u16>,

        /// Close HTTP sessions idle for this many seconds
        #[arg(long)]
        session_idle_secs: Option<u64>,
    },

    /// List article titles matching a query
    #[command(alias = "s")]
    Search {
        query: String,

        /// Wikipedia language code
        #[arg(long, short)]
        lang: Option<String>,

        /// Print the full tool result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the summary of an article
    Summary {
        title: String,

        #[arg(long, short)]
        lang: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Search and summarize the best match
    #[command(alias = "l")]
    Lookup {
        query: String,

        /// Number of hits to consider (1-10)
        #[arg(long = "top-k", short = 'k')]
        top_k: Option<i64>,

        #[arg(long, short)]
        lang: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Run the transcript relay backend
    Relay {
        #[arg(long)]
        host: Option<String>,

        #[arg(long, short)]
        port: Option<u16>,

        /// MCP endpoint of the tool server
        #[arg(long)]
        tool_server: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Target path (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

fn init_tracing(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("wiki_lookup={}", level)),
    );

    // Stdout is the protocol pipe in stdio mode, so logs always go to stderr.
    let (json_layer, text_layer) = if cli.log_json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn load(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &path {
        tracing::info!("Using config file: {}", path.display());
    }
    load_config(path.as_deref()).context("Failed to load configuration")
}

/// Run one tool and print its result
async fn run_tool(config: &Config, name: &str, arguments: Value, as_json: bool) -> Result<()> {
    let server = McpServer::from_config(config)?;
    let output = server.registry().call(name, arguments).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(text) = output.display_text() {
        println!("{}", text);
    }

    if output.is_error {
        anyhow::bail!("{} failed", name);
    }
    Ok(())
}

async fn wait_for_shutdown(handle: tokio::task::JoinHandle<()>) -> Result<()> {
    tokio::select! {
        joined = handle => joined.context("Server task failed")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    let mut config = load(&cli)?;

    match cli.command {
        None => {
            McpServer::from_config(&config)?.run().await?;
        }

        Some(Commands::Serve {
            http,
            host,
            port,
            session_idle_secs,
        }) => {
            let server = McpServer::from_config(&config)?;

            if http {
                if let Some(host) = host {
                    config.server.host = host;
                }
                if let Some(port) = port {
                    config.server.port = port;
                }
                if session_idle_secs.is_some() {
                    config.server.session_idle_secs = session_idle_secs;
                }

                let (_, handle) = server
                    .run_http(&config.server.addr(), config.server.session_idle())
                    .await?;
                wait_for_shutdown(handle).await?;
            } else {
                server.run().await?;
            }
        }

        Some(Commands::Search { query, lang, json }) => {
            run_tool(&config, "search-titles", json!({"query": query, "lang": lang}), json).await?;
        }

        Some(Commands::Summary { title, lang, json }) => {
            run_tool(&config, "fetch-summary", json!({"title": title, "lang": lang}), json).await?;
        }

        Some(Commands::Lookup {
            query,
            top_k,
            lang,
            json,
        }) => {
            run_tool(
                &config,
                "lookup",
                json!({"query": query, "topK": top_k, "lang": lang}),
                json,
            )
            .await?;
        }

        Some(Commands::Relay {
            host,
            port,
            tool_server,
        }) => {
            if let Some(host) = host {
                config.relay.host = host;
            }
            if let Some(port) = port {
                config.relay.port = port;
            }
            if let Some(url) = tool_server {
                config.relay.tool_server_url = url;
            }

            let relay = RelayServer::from_config(&config.relay)?;
            let (_, handle) = relay.run(&config.relay.addr()).await?;
            wait_for_shutdown(handle).await?;
        }

        Some(Commands::Config { action }) => match action {
            ConfigCommands::Init { path, force } => {
                let path = path
                    .or_else(default_config_path)
                    .context("Could not determine a configuration directory")?;
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                save_config(&Config::default(), &path)?;
                eprintln!("Wrote {}", path.display());
            }
            ConfigCommands::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}
