//! Caller-facing API: question → intent → statements → result.
//!
//! A [`Pipeline`] owns one immutable connection profile and the catalog
//! cache that belongs to it. New credentials mean a new pipeline.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{CompletionService, Connector};
use crate::batch::StatementBatch;
use crate::catalog::{CatalogCache, SchemaCatalog};
use crate::compiler::{self, CompileOptions, CompileRequest, Compiled, TerminalMessage};
use crate::config::{AppConfig, ConnectionProfile, DEFAULT_ROW_CAP};
use crate::engine::{self, ExecutionResult};
use crate::error::SqlbotError;
use crate::intent::{self, StructuredIntent};
use crate::narrator;
use crate::semantic::describe_schema;
use crate::summary;
use crate::table::{Table, materialize};

/// Where a request is in its single pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Interpreting,
    Compiling,
    Executing,
    Materializing,
    Completed,
    Rejected,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Completed | RequestState::Rejected | RequestState::Failed
        )
    }

    /// Allowed forward moves. `Received → Compiling` is the raw-question
    /// path, which skips interpretation.
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Interpreting)
                | (Received, Compiling)
                | (Interpreting, Compiling)
                | (Interpreting, Rejected)
                | (Compiling, Executing)
                | (Compiling, Rejected)
                | (Executing, Materializing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Materializing, Completed)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The states one request passed through, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTrace {
    states: Vec<RequestState>,
}

impl RequestTrace {
    fn new() -> Self {
        Self {
            states: vec![RequestState::Received],
        }
    }

    pub fn current(&self) -> RequestState {
        self.states.last().copied().unwrap_or(RequestState::Received)
    }

    fn advance(&mut self, next: RequestState) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "invalid request transition {current} -> {next}"
        );
        debug!(from = %current, to = %next, "request state");
        self.states.push(next);
    }

    pub fn states(&self) -> &[RequestState] {
        &self.states
    }

    pub fn reached(&self, state: RequestState) -> bool {
        self.states.contains(&state)
    }
}

/// How a processed question ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Table { batch: StatementBatch, table: Table },
    Ack { batch: StatementBatch, message: String },
    Failed { batch: StatementBatch, message: String },
    Rejected(TerminalMessage),
}

impl Reply {
    pub fn batch(&self) -> Option<&StatementBatch> {
        match self {
            Reply::Table { batch, .. } | Reply::Ack { batch, .. } | Reply::Failed { batch, .. } => {
                Some(batch)
            }
            Reply::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub intent: Option<StructuredIntent>,
    pub trace: RequestTrace,
    pub reply: Reply,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub row_cap: u64,
    pub include_foreign_keys: bool,
    /// Sample rows per table added to prompts; 0 disables sampling.
    pub sample_rows: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            row_cap: DEFAULT_ROW_CAP,
            include_foreign_keys: true,
            sample_rows: 0,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            row_cap: config.row_cap,
            include_foreign_keys: config.include_foreign_keys,
            sample_rows: config.sample_rows,
        }
    }
}

pub struct Pipeline<C, L> {
    profile: Arc<ConnectionProfile>,
    connector: Arc<C>,
    completion: Arc<L>,
    cache: CatalogCache,
    options: PipelineOptions,
}

impl<C: Connector, L: CompletionService> Pipeline<C, L> {
    pub fn new(
        profile: ConnectionProfile,
        connector: C,
        completion: L,
        options: PipelineOptions,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            connector: Arc::new(connector),
            completion: Arc::new(completion),
            cache: CatalogCache::new(),
            options,
        }
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// A pipeline for new credentials, sharing the connector and completion
    /// service but starting from an empty cache. `self` is left untouched.
    pub fn with_profile(&self, profile: ConnectionProfile) -> Self {
        Self {
            profile: Arc::new(profile),
            connector: Arc::clone(&self.connector),
            completion: Arc::clone(&self.completion),
            cache: CatalogCache::new(),
            options: self.options,
        }
    }

    pub async fn load_schema(&self) -> Result<Arc<SchemaCatalog>, SqlbotError> {
        self.cache.load(self.connector.as_ref(), &self.profile).await
    }

    /// Forget the cached catalog; the next request reloads it.
    pub fn invalidate_schema(&self) -> bool {
        self.cache.invalidate(&self.profile)
    }

    /// Schema text for prompts, with sample rows when configured.
    pub async fn schema_context(&self) -> Result<String, SqlbotError> {
        let catalog = self.load_schema().await?;
        let mut text = describe_schema(&catalog, self.options.include_foreign_keys);
        if self.options.sample_rows > 0 && !catalog.is_empty() {
            let samples = summary::summarize(
                self.connector.as_ref(),
                &self.profile,
                &catalog,
                self.options.sample_rows,
            )
            .await?;
            text.push_str("\n\nSample data:\n");
            text.push_str(&samples);
        }
        Ok(text)
    }

    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            row_cap: self.options.row_cap,
        }
    }

    pub async fn interpret(&self, question: &str) -> Result<StructuredIntent, SqlbotError> {
        let schema = self.schema_context().await?;
        intent::interpret(self.completion.as_ref(), question, &schema).await
    }

    pub async fn compile(&self, intent: &StructuredIntent) -> Result<Compiled, SqlbotError> {
        if !intent.targets_database() {
            return Ok(Compiled::Rejected(TerminalMessage::not_a_database_question()));
        }
        let schema = self.schema_context().await?;
        self.compile_with(CompileRequest::Intent(intent), &schema).await
    }

    /// Compile straight from a question, without an intent.
    pub async fn compile_question(&self, question: &str) -> Result<Compiled, SqlbotError> {
        let schema = self.schema_context().await?;
        self.compile_with(CompileRequest::Question(question), &schema).await
    }

    async fn compile_with(
        &self,
        request: CompileRequest<'_>,
        schema: &str,
    ) -> Result<Compiled, SqlbotError> {
        compiler::compile(
            self.completion.as_ref(),
            request,
            schema,
            self.compile_options(),
        )
        .await
    }

    pub async fn execute(&self, batch: &StatementBatch) -> Result<ExecutionResult, SqlbotError> {
        engine::execute(self.connector.as_ref(), &self.profile, batch).await
    }

    /// Interpret, compile, execute and materialize one question.
    pub async fn process(&self, question: &str) -> Result<Processed, SqlbotError> {
        let mut trace = RequestTrace::new();

        // One schema snapshot (and one round of samples) per request.
        let schema = self.schema_context().await?;

        trace.advance(RequestState::Interpreting);
        let intent = intent::interpret(self.completion.as_ref(), question, &schema).await?;
        if !intent.targets_database() {
            trace.advance(RequestState::Rejected);
            return Ok(Processed {
                intent: Some(intent),
                trace,
                reply: Reply::Rejected(TerminalMessage::not_a_database_question()),
            });
        }

        trace.advance(RequestState::Compiling);
        let compiled = self
            .compile_with(CompileRequest::Intent(&intent), &schema)
            .await?;
        self.finish(Some(intent), trace, compiled).await
    }

    /// Like [`Pipeline::process`] but compiles from the raw question.
    pub async fn process_direct(&self, question: &str) -> Result<Processed, SqlbotError> {
        let mut trace = RequestTrace::new();
        let schema = self.schema_context().await?;
        trace.advance(RequestState::Compiling);
        let compiled = self
            .compile_with(CompileRequest::Question(question), &schema)
            .await?;
        self.finish(None, trace, compiled).await
    }

    async fn finish(
        &self,
        intent: Option<StructuredIntent>,
        mut trace: RequestTrace,
        compiled: Compiled,
    ) -> Result<Processed, SqlbotError> {
        let batch = match compiled {
            Compiled::Batch(batch) => batch,
            Compiled::Rejected(message) => {
                trace.advance(RequestState::Rejected);
                return Ok(Processed {
                    intent,
                    trace,
                    reply: Reply::Rejected(message),
                });
            }
        };

        trace.advance(RequestState::Executing);
        let reply = match self.execute(&batch).await? {
            result @ ExecutionResult::Rows { .. } => {
                trace.advance(RequestState::Materializing);
                let table = materialize(result)?;
                trace.advance(RequestState::Completed);
                Reply::Table { batch, table }
            }
            ExecutionResult::Ack { message } => {
                trace.advance(RequestState::Completed);
                Reply::Ack { batch, message }
            }
            ExecutionResult::Failure { message } => {
                trace.advance(RequestState::Failed);
                Reply::Failed { batch, message }
            }
        };

        Ok(Processed {
            intent,
            trace,
            reply,
        })
    }

    /// Compile only, for showing the statements a question would run.
    pub async fn plan(
        &self,
        question: &str,
        direct: bool,
    ) -> Result<(Option<StructuredIntent>, Compiled), SqlbotError> {
        let schema = self.schema_context().await?;
        if direct {
            let compiled = self
                .compile_with(CompileRequest::Question(question), &schema)
                .await?;
            return Ok((None, compiled));
        }
        let intent = intent::interpret(self.completion.as_ref(), question, &schema).await?;
        let compiled = if intent.targets_database() {
            self.compile_with(CompileRequest::Intent(&intent), &schema)
                .await?
        } else {
            Compiled::Rejected(TerminalMessage::not_a_database_question())
        };
        Ok((Some(intent), compiled))
    }

    pub async fn narrate(&self, question: &str, processed: &Processed) -> Result<String, SqlbotError> {
        narrator::narrate(
            self.completion.as_ref(),
            question,
            processed.intent.as_ref(),
            &processed.reply,
        )
        .await
    }
}
