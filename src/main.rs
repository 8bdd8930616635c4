use anyhow::{Context, Result};
use chgrammar::{Connection, ConnectionConfig, TransportMode};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Run a SQL statement against ClickHouse and print the rows as JSON
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Use a saved connection by name
    #[arg(long = "connect", conflicts_with_all = ["host", "port", "mode", "database"])]
    connect: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// streaming or batch
    #[arg(long, value_parser = parse_mode)]
    mode: Option<TransportMode>,

    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    user: Option<String>,

    /// Prompt for the password instead of reading CLICKHOUSE_PASSWORD
    #[arg(long)]
    ask_password: bool,

    /// Print the SQL without sending it
    #[arg(long)]
    dry_run: bool,

    /// SQL to run; `?` placeholders are bound from --bind in order
    sql: String,

    /// Value for the next `?` placeholder
    #[arg(long = "bind")]
    bindings: Vec<String>,
}

fn parse_mode(s: &str) -> std::result::Result<TransportMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "streaming" | "tcp" => Ok(TransportMode::Streaming),
        "batch" | "http" => Ok(TransportMode::Batch),
        other => Err(format!("unknown mode {:?}, expected streaming or batch", other)),
    }
}

fn resolve_config(cli: &Cli) -> Result<ConnectionConfig> {
    let mut config = match &cli.connect {
        Some(name) => ConnectionConfig::find_saved(name).with_context(|| {
            let saved: Vec<String> = ConnectionConfig::load_saved_connections()
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect();
            format!("saved connections: {}", saved.join(", "))
        })?,
        None => ConnectionConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(user) = &cli.user {
        config.username = user.clone();
    }

    // Password: prompt, then CLICKHOUSE_PASSWORD, then whatever was saved
    if cli.ask_password {
        let prompt = format!("Password for {}: ", config.display_string());
        config.password = rpassword::read_password_from_tty(Some(&prompt))?;
    } else if let Ok(pw) = std::env::var("CLICKHOUSE_PASSWORD") {
        config.password = pw;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let connection = Connection::new(config);

    let bindings: Vec<chgrammar::Value> = cli.bindings.iter().map(|b| parse_binding(b)).collect();
    let mut statement = chgrammar::statement::Statement::new();
    statement.push_raw(&cli.sql, &bindings)?;
    let sql = connection.render(&statement);

    if cli.dry_run {
        println!("{}", sql);
        return Ok(());
    }

    let rows = connection
        .affecting_statement(&sql)
        .await
        .with_context(|| format!("running against {}", connection.config().display_string()))?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Integers and floats bind as numbers, `null` as NULL, anything else as text.
fn parse_binding(raw: &str) -> chgrammar::Value {
    if raw.eq_ignore_ascii_case("null") {
        return chgrammar::Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return i.into();
    }
    if let Ok(f) = raw.parse::<f64>() {
        return f.into();
    }
    raw.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_accepts_legacy_names() {
        assert_eq!(parse_mode("tcp").unwrap(), TransportMode::Streaming);
        assert_eq!(parse_mode("HTTP").unwrap(), TransportMode::Batch);
        assert!(parse_mode("udp").is_err());
    }

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding("42"), chgrammar::Value::Int(42));
        assert_eq!(parse_binding("1.5"), chgrammar::Value::Float(1.5));
        assert_eq!(parse_binding("NULL"), chgrammar::Value::Null);
        assert_eq!(parse_binding("abc"), chgrammar::Value::from("abc"));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "chgrammar",
            "--host",
            "ch.local",
            "--mode",
            "batch",
            "--database",
            "d",
            "select 1",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.host, "ch.local");
        assert_eq!(config.mode, TransportMode::Batch);
        assert_eq!(config.database, "d");
        assert_eq!(config.port, 8123);
    }
}
