use clap::Parser;
use sqlbot::backend::openai::OpenAiCompletion;
use sqlbot::backend::postgres::PostgresConnector;
use sqlbot::batch::StatementBatch;
use sqlbot::cli::{self, Cli, Command};
use sqlbot::compiler::Compiled;
use sqlbot::config::{self, AppConfig};
use sqlbot::engine::{self, ExecutionResult};
use sqlbot::error::SqlbotError;
use sqlbot::format_detect::{self, OutputFormat};
use sqlbot::pipeline::{Pipeline, PipelineOptions, Reply};
use sqlbot::table::{Table, materialize};
use sqlbot::verbose::{self, Timer};
use sqlbot::{catalog, format, format_csv, masking, output, semantic, summary};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;

const SEED_SQL: &str = "\
CREATE TABLE IF NOT EXISTS usuarios (
    id SERIAL PRIMARY KEY,
    nombre TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    edad INTEGER
);
INSERT INTO usuarios (nombre, email, edad)
SELECT v.nombre, v.email, v.edad
FROM (VALUES
    ('prueba 1', 'prueba1@example.com', 30),
    ('prueba 2', 'prueba2@example.com', 25),
    ('prueba 3', 'prueba3@example.com', 40)
) AS v(nombre, email, edad)
WHERE NOT EXISTS (SELECT 1 FROM usuarios);";

/// How a command ended when it did not hit an error.
enum Outcome {
    Done,
    /// The database rejected the batch; the failure was already printed.
    BatchFailed,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(app_config) => match cli.command {
            Command::Ask(ref args) => ask(args, app_config).await,
            Command::Interpret(ref args) => interpret(args, app_config).await,
            Command::Exec(ref args) => exec(args, &app_config).await,
            Command::Schema(ref args) => schema(args, &app_config).await,
            Command::Seed => seed(&app_config).await,
        },
        Err(err) => Err(err),
    };

    match result {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::BatchFailed) => ExitCode::FAILURE,
        Err(err) => {
            output::print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, SqlbotError> {
    let loaded = config::load(
        &cli.connection,
        &cli.completion,
        cli.verbose,
        cli.show_secrets,
        cli.config.as_ref(),
    );
    // The config file may turn verbose on, so logging starts after loading.
    let app_config = match loaded {
        Ok(app_config) => app_config,
        Err(err) => {
            verbose::init(cli.verbose);
            return Err(err);
        }
    };
    verbose::init(app_config.verbose);
    debug!(
        "database: {}",
        masking::describe_profile(&app_config.profile, app_config.show_secrets)
    );
    Ok(app_config)
}

fn connector(app_config: &AppConfig) -> PostgresConnector {
    PostgresConnector::new(Duration::from_secs(app_config.connect_timeout_secs))
}

fn pipeline(
    app_config: AppConfig,
) -> Result<Pipeline<PostgresConnector, OpenAiCompletion>, SqlbotError> {
    debug!(
        "completion: {}",
        masking::describe_completion(&app_config.completion, app_config.show_secrets)
    );
    let completion = OpenAiCompletion::new(&app_config.completion)?;
    let connector = connector(&app_config);
    let options = PipelineOptions::from_config(&app_config);
    Ok(Pipeline::new(app_config.profile, connector, completion, options))
}

async fn ask(args: &cli::AskArgs, app_config: AppConfig) -> Result<Outcome, SqlbotError> {
    // Detect output format before any remote call (fail-fast on bad extension)
    let format_info = detect_output(args.output.as_deref())?;
    let pipeline = pipeline(app_config)?;

    if args.dry_run {
        let (intent, compiled) = pipeline.plan(&args.question, args.direct).await?;
        if let Some(intent) = intent {
            debug!("intent: action={} table={:?}", intent.action, intent.table);
        }
        match compiled {
            Compiled::Batch(batch) => output::print_result(&batch.to_script()),
            Compiled::Rejected(message) => {
                output::print_result(&output::status_toon("rejected", message.as_str())?)
            }
        }
        return Ok(Outcome::Done);
    }

    let timer = Timer::start();
    let processed = if args.direct {
        pipeline.process_direct(&args.question).await?
    } else {
        pipeline.process(&args.question).await?
    };
    debug!(
        elapsed_ms = timer.elapsed_ms() as u64,
        states = ?processed.trace.states(),
        "question processed"
    );

    if let Some(batch) = processed.reply.batch() {
        debug!("statements:\n{}", batch.to_script());
    }

    let outcome = match &processed.reply {
        Reply::Table { table, .. } => {
            write_table(table, format_info)?;
            Outcome::Done
        }
        Reply::Ack { message, .. } => {
            output::print_result(&output::status_toon("ok", message)?);
            Outcome::Done
        }
        Reply::Rejected(message) => {
            output::print_result(&output::status_toon("rejected", message.as_str())?);
            Outcome::Done
        }
        Reply::Failed { message, .. } => {
            print_failure(message)?;
            Outcome::BatchFailed
        }
    };

    if args.narrate && !matches!(processed.reply, Reply::Rejected(_)) {
        let answer = pipeline.narrate(&args.question, &processed).await?;
        output::print_result(&answer);
    }

    Ok(outcome)
}

async fn interpret(
    args: &cli::InterpretArgs,
    app_config: AppConfig,
) -> Result<Outcome, SqlbotError> {
    let pipeline = pipeline(app_config)?;
    let intent = pipeline.interpret(&args.question).await?;
    output::print_result(&format::to_toon_value(&intent)?);
    Ok(Outcome::Done)
}

async fn exec(args: &cli::ExecArgs, app_config: &AppConfig) -> Result<Outcome, SqlbotError> {
    let script = resolve_sql(args)?;
    let format_info = detect_output(args.output.as_deref())?;

    let batch = StatementBatch::parse(&script);
    if batch.is_empty() {
        return Err(SqlbotError::Config {
            message: "no statements found in the SQL input".to_string(),
        });
    }

    debug!(statements = batch.len(), "executing batch");
    let result = engine::execute(&connector(app_config), &app_config.profile, &batch).await?;
    emit_result(result, format_info)
}

async fn schema(args: &cli::SchemaArgs, app_config: &AppConfig) -> Result<Outcome, SqlbotError> {
    let connector = connector(app_config);
    let timer = Timer::start();
    let catalog = catalog::load(&connector, &app_config.profile).await?;
    debug!(
        tables = catalog.len(),
        elapsed_ms = timer.elapsed_ms() as u64,
        "catalog loaded"
    );

    if args.text {
        output::print_result(&semantic::describe_schema(
            &catalog,
            app_config.include_foreign_keys,
        ));
    } else {
        output::print_result(&format::to_toon_value(&catalog)?);
    }

    let samples = args.samples.unwrap_or(0);
    if samples > 0 && !catalog.is_empty() {
        let text = summary::summarize(&connector, &app_config.profile, &catalog, samples).await?;
        output::print_result(&text);
    }
    Ok(Outcome::Done)
}

async fn seed(app_config: &AppConfig) -> Result<Outcome, SqlbotError> {
    let batch = StatementBatch::parse(SEED_SQL);
    let result = engine::execute(&connector(app_config), &app_config.profile, &batch).await?;
    emit_result(result, None)
}

// --- Helpers ---

fn resolve_sql(args: &cli::ExecArgs) -> Result<String, SqlbotError> {
    if let Some(ref sql) = args.sql {
        return Ok(sql.clone());
    }
    if let Some(ref path) = args.sql_file {
        let content = std::fs::read_to_string(path).map_err(|e| SqlbotError::Config {
            message: format!("cannot read SQL file {}: {}", path.display(), e),
        })?;
        return Ok(content);
    }
    Err(SqlbotError::Config {
        message: "no SQL provided — use positional argument or --file".to_string(),
    })
}

fn detect_output(path: Option<&Path>) -> Result<Option<(OutputFormat, PathBuf)>, SqlbotError> {
    path.map(format_detect::detect_format).transpose()
}

fn emit_result(
    result: ExecutionResult,
    format_info: Option<(OutputFormat, PathBuf)>,
) -> Result<Outcome, SqlbotError> {
    match result {
        ExecutionResult::Ack { message } => {
            output::print_result(&output::status_toon("ok", &message)?);
            Ok(Outcome::Done)
        }
        ExecutionResult::Failure { message } => {
            print_failure(&message)?;
            Ok(Outcome::BatchFailed)
        }
        rows @ ExecutionResult::Rows { .. } => {
            write_table(&materialize(rows)?, format_info)?;
            Ok(Outcome::Done)
        }
    }
}

fn print_failure(message: &str) -> Result<(), SqlbotError> {
    let text = engine::failure_text(message);
    output::print_result(&output::status_toon("failure", &text)?);
    Ok(())
}

fn write_table(
    table: &Table,
    format_info: Option<(OutputFormat, PathBuf)>,
) -> Result<(), SqlbotError> {
    let Some((format, path)) = format_info else {
        output::print_result(&format::to_toon(table)?);
        return Ok(());
    };

    debug!("writing {} output to {}", format.label(), path.display());
    match format {
        OutputFormat::Toon => output::write_file(&format::to_toon(table)?, &path)?,
        OutputFormat::Csv => format_csv::write_csv(table, &path)?,
    }
    output::print_summary(table.len(), &path, format.label())
}
