use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sqlbot", about = "Ask PostgreSQL questions in natural language")]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, global = true, env = "SQLBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit diagnostics to stderr
    #[arg(short = 'v', long, global = true, env = "SQLBOT_VERBOSE")]
    pub verbose: bool,

    /// Disable credential masking
    #[arg(long, global = true, env = "SQLBOT_SHOW_SECRETS")]
    pub show_secrets: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub completion: CompletionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a natural-language question against the database
    Ask(AskArgs),

    /// Show the structured intent derived from a question
    Interpret(InterpretArgs),

    /// Execute SQL statements as one transaction
    Exec(ExecArgs),

    /// Show the database schema catalog
    Schema(SchemaArgs),

    /// Create and populate the sample `usuarios` table
    Seed,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// PostgreSQL host (default: localhost)
    #[arg(long, global = true, env = "SQLBOT_HOST")]
    pub host: Option<String>,

    /// PostgreSQL port (default: 5432)
    #[arg(long, global = true, env = "SQLBOT_PORT")]
    pub port: Option<u16>,

    /// Database user
    #[arg(short = 'u', long, global = true, env = "SQLBOT_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(short = 'p', long, global = true, env = "SQLBOT_PASSWORD")]
    pub password: Option<String>,

    /// Database name
    #[arg(short = 'd', long, global = true, env = "SQLBOT_DATABASE")]
    pub database: Option<String>,

    /// Schema to introspect (default: public)
    #[arg(short = 's', long, global = true, env = "SQLBOT_SCHEMA")]
    pub schema: Option<String>,

    /// Connection timeout in seconds (default: 10)
    #[arg(long, global = true, env = "SQLBOT_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Config file profile name
    #[arg(short = 'P', long, global = true, env = "SQLBOT_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct CompletionArgs {
    /// API key for the completion service
    #[arg(long, global = true, env = "SQLBOT_API_KEY")]
    pub api_key: Option<String>,

    /// Completion model name
    #[arg(long, global = true, env = "SQLBOT_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true, env = "SQLBOT_BASE_URL")]
    pub base_url: Option<String>,

    /// Completion request timeout in seconds (default: 60)
    #[arg(long, global = true, env = "SQLBOT_COMPLETION_TIMEOUT")]
    pub completion_timeout: Option<u64>,

    /// Default row cap for generated queries (default: 25)
    #[arg(long, global = true, env = "SQLBOT_ROW_CAP")]
    pub row_cap: Option<u64>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question in natural language
    pub question: String,

    /// Ask for SQL straight from the question, skipping intent interpretation
    #[arg(long)]
    pub direct: bool,

    /// Print the generated statements without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Add a natural-language answer generated from the result
    #[arg(long)]
    pub narrate: bool,

    /// Write results to file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InterpretArgs {
    /// Question in natural language
    pub question: String,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// SQL text (statements separated by `;`)
    pub sql: Option<String>,

    /// Read SQL from file
    #[arg(short = 'f', long = "file", conflicts_with = "sql")]
    pub sql_file: Option<PathBuf>,

    /// Write results to file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Print the schema description sent to the completion service
    #[arg(long)]
    pub text: bool,

    /// Include up to N sample rows per table
    #[arg(long)]
    pub samples: Option<usize>,
}
