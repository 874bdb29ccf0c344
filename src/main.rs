use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rmine::resource::get_all_resource_names;
use rmine::{Config, Params, Redmine, ResourceId};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command line client for the Redmine REST API
#[derive(Parser, Debug)]
#[command(name = "rmine", version, about, long_about = None)]
struct Args {
    /// Redmine base URL (overrides config and REDMINE_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// REST API key (overrides config and REDMINE_KEY)
    #[arg(long, global = true)]
    key: Option<String>,

    /// Version of the Redmine server, e.g. 4.2
    #[arg(long, global = true)]
    server_version: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered resource types and their operations
    Resources,
    /// Fetch a single resource
    Get {
        resource: String,
        id: String,
        /// Extra parameter, e.g. -p project_id=foo
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, Value)>,
    },
    /// List a collection, optionally filtered
    List {
        resource: String,
        /// Filter, e.g. -f project_id=foo
        #[arg(short, long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, Value)>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Number of items to fetch (0 = server default page)
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Create a resource
    Create {
        resource: String,
        #[arg(short, long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, Value)>,
        /// File to attach through the uploads API
        #[arg(long = "upload")]
        uploads: Vec<PathBuf>,
    },
    /// Update fields of a resource
    Update {
        resource: String,
        id: String,
        #[arg(short, long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, Value)>,
    },
    /// Delete a resource
    Delete {
        resource: String,
        id: String,
        #[arg(short, long = "param", value_parser = parse_key_value)]
        params: Vec<(String, Value)>,
    },
    /// Save --url, --key and --server-version to the config file
    Configure {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("rmine started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("rmine").join("rmine.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".rmine").join("rmine.log");
    }
    PathBuf::from("rmine.log")
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
fn parse_key_value(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_id(id: &str) -> ResourceId {
    id.parse::<i64>()
        .map(ResourceId::Int)
        .unwrap_or_else(|_| ResourceId::Str(id.to_string()))
}

fn to_params(pairs: Vec<(String, Value)>) -> Params {
    pairs.into_iter().collect()
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let cli_config = Config {
        url: args.url.clone(),
        key: args.key.clone(),
        version: args.server_version.clone(),
        ..Default::default()
    };

    if let Command::Configure {
        username,
        password,
        timeout_secs,
    } = &args.command
    {
        let config = Config::load().merge(Config {
            username: username.clone(),
            password: password.clone(),
            timeout_secs: *timeout_secs,
            ..cli_config
        });
        if let Some(url) = config.url.as_deref() {
            rmine::api::http::validate_base_url(url)?;
        }
        config.save()?;
        tracing::info!("Configuration saved");
        return Ok(());
    }

    let config = Config::load().merge(cli_config);
    run(args.command, &config, args.output).await
}

async fn run(command: Command, config: &Config, output: OutputFormat) -> Result<()> {
    if let Command::Resources = command {
        let listing: Vec<Value> = get_all_resource_names()
            .into_iter()
            .filter_map(rmine::resource::get_descriptor)
            .map(|d| {
                json!({
                    "name": d.resource_name,
                    "operations": d.operations.iter().map(|o| o.to_string()).collect::<Vec<_>>(),
                    "filters": d.queryable_filters,
                    "minimum_api_version": d.minimum_api_version.as_ref().map(|v| v.to_string()),
                })
            })
            .collect();
        return print(&listing, output);
    }

    let client = Redmine::from_config(config).context("Failed to create Redmine client")?;

    match command {
        Command::Get {
            resource,
            id,
            params,
        } => {
            let found = client
                .manager(&resource)?
                .get(parse_id(&id), to_params(params))
                .await?;
            print(&found, output)
        }
        Command::List {
            resource,
            filters,
            offset,
            limit,
        } => {
            let manager = client.manager(&resource)?;
            let set = if filters.is_empty() {
                manager.all(Params::new())?
            } else {
                manager.filter(to_params(filters))?
            };
            let window = if limit == 0 {
                set.slice(offset..)
            } else {
                set.slice(offset..offset + limit)
            };
            tracing::debug!("Listing {}", window);
            print(&window.to_vec().await?, output)
        }
        Command::Create {
            resource,
            fields,
            uploads,
        } => {
            let mut fields = to_params(fields);
            if !uploads.is_empty() {
                let entries: Vec<Value> = uploads
                    .iter()
                    .map(|p| json!({ "path": p.display().to_string() }))
                    .collect();
                fields.insert("uploads".to_string(), Value::Array(entries));
            }
            let created = client.manager(&resource)?.create(fields).await?;
            print(&created, output)
        }
        Command::Update {
            resource,
            id,
            fields,
        } => {
            let updated = client
                .manager(&resource)?
                .update(parse_id(&id), to_params(fields))
                .await?;
            print(&json!({ "updated": updated }), output)
        }
        Command::Delete {
            resource,
            id,
            params,
        } => {
            let deleted = client
                .manager(&resource)?
                .delete(parse_id(&id), to_params(params))
                .await?;
            print(&json!({ "deleted": deleted }), output)
        }
        Command::Resources | Command::Configure { .. } => Ok(()),
    }
}
