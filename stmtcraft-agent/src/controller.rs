//! The generate → write → execute → validate loop.
//!
//! `RefinementController` drives an explicit state machine:
//!
//! ```text
//! Planning -> Generating -> Writing -> Executing -> Validating -> Succeeded
//!     ^                                                  |
//!     +--------------------- Retrying <------------------+--> Exhausted
//! ```
//!
//! A failure in any phase ends the attempt. While fewer than
//! [`MAX_ATTEMPTS`] have been spent the failure text is carried into the next
//! prompt; after that the run is exhausted. Sample loading, the runtime check
//! and configuration errors (such as an interpreter without pandas) abort the
//! run with an error instead of consuming attempts.

use crate::config::{AgentConfig, MAX_ATTEMPTS};
use crate::executor::ParserRuntime;
use crate::generator::CodeGenerator;
use crate::prompt::{build_prompt, Prompt, PromptContext};
use crate::sample::{SampleSet, SchemaReader, Target};
use crate::table::Table;
use crate::validator::{compare, Verdict};
use crate::writer::ParserWriter;
use std::fmt;
use std::path::PathBuf;
use stmtcraft_error::{Error, ErrorKind, ErrorStatus, Result};
use stmtcraft_llm::{LlmProvider, UsageTracker};
use tracing::{info, warn};

/// Where the loop currently is
#[derive(Debug)]
pub enum RunState {
    Planning,
    Generating(Prompt),
    Writing(String),
    Executing(PathBuf),
    Validating(Table),
    Retrying(String),
    Succeeded,
    Exhausted,
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Planning => "planning",
            RunState::Generating(_) => "generating",
            RunState::Writing(_) => "writing",
            RunState::Executing(_) => "executing",
            RunState::Validating(_) => "validating",
            RunState::Retrying(_) => "retrying",
            RunState::Succeeded => "succeeded",
            RunState::Exhausted => "exhausted",
        }
    }
}

/// The phase of an attempt that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    Writing,
    Executing,
    Validating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Generating => "generation",
            Phase::Writing => "write",
            Phase::Executing => "execution",
            Phase::Validating => "validation",
        };
        f.write_str(name)
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub phase: Phase,
    pub kind: ErrorKind,
    /// Persistent once the last attempt has failed
    pub status: ErrorStatus,
    /// Text handed to the next prompt
    pub description: String,
}

/// One iteration of the loop
#[derive(Debug, Clone)]
pub struct Attempt {
    pub index: u32,
    pub source: Option<String>,
    pub table: Option<Table>,
    pub failure: Option<Failure>,
}

impl Attempt {
    fn new(index: u32) -> Self {
        Self {
            index,
            source: None,
            table: None,
            failure: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.table.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Exhausted,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: String,
    pub status: RunStatus,
    pub attempts: Vec<Attempt>,
    pub parser_path: PathBuf,
    pub usage: UsageTracker,
    /// Exit code of the post-success test suite, when it ran
    pub test_suite_exit: Option<i32>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.attempts.iter().rev().find_map(|a| a.failure.as_ref())
    }

    /// 0 on success, 1 when attempts ran out
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Succeeded => 0,
            RunStatus::Exhausted => 1,
        }
    }
}

/// Progress notifications for the caller
#[derive(Debug, Clone)]
pub enum Progress<'a> {
    Started { target: &'a str, columns: &'a [String] },
    AttemptStarted { index: u32, max: u32 },
    /// `retrying` is false for the last attempt
    AttemptFailed { index: u32, failure: &'a Failure, retrying: bool },
    Succeeded { parser: &'a std::path::Path },
    Exhausted { attempts: u32 },
}

type ProgressFn = Box<dyn Fn(&Progress<'_>) + Send + Sync>;

/// Runs the refinement loop for one target.
pub struct RefinementController<P, R> {
    config: AgentConfig,
    generator: CodeGenerator<P>,
    runtime: R,
    reader: SchemaReader,
    writer: ParserWriter,
    progress: Option<ProgressFn>,
}

impl<P: LlmProvider, R: ParserRuntime> RefinementController<P, R> {
    pub fn new(config: AgentConfig, provider: P, runtime: R) -> Self {
        let generator = CodeGenerator::new(provider, config.model.clone(), config.temperature);
        let reader = SchemaReader::new(config.data_dir());
        let writer = ParserWriter::new(config.parser_dir());
        Self {
            config,
            generator,
            runtime,
            reader,
            writer,
            progress: None,
        }
    }

    /// Receive a callback at each visible step of the run
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress<'_>) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn generator(&self) -> &CodeGenerator<P> {
        &self.generator
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn notify(&self, event: Progress<'_>) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }

    /// Run up to [`MAX_ATTEMPTS`] attempts for `target`.
    ///
    /// Errors when the samples cannot be loaded or the runtime is unusable;
    /// both are checked before the first generation call.
    pub async fn run(&mut self, target: &Target) -> Result<RunReport> {
        let samples = self
            .reader
            .read(target)
            .map_err(|e| e.with_operation("controller::run"))?;
        self.runtime
            .check()
            .await
            .map_err(|e| e.with_operation("controller::run"))?;
        let pdf_name = samples.pdf_name();

        info!(target = %target, columns = ?samples.schema.columns(), "starting run");
        self.notify(Progress::Started {
            target: target.name(),
            columns: samples.schema.columns(),
        });

        let mut attempts: Vec<Attempt> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut state = RunState::Planning;

        let status = loop {
            state = match state {
                RunState::Planning => {
                    let index = attempts.len() as u32 + 1;
                    info!(attempt = index, max = MAX_ATTEMPTS, "planning attempt");
                    self.notify(Progress::AttemptStarted {
                        index,
                        max: MAX_ATTEMPTS,
                    });
                    attempts.push(Attempt::new(index));

                    let prompt = build_prompt(
                        &samples.schema,
                        &PromptContext {
                            target: target.name(),
                            pdf_name: &pdf_name,
                            attempt: index,
                            last_error: last_error.as_deref(),
                        },
                    );
                    RunState::Generating(prompt)
                }
                RunState::Retrying(description) => {
                    last_error = Some(description);
                    RunState::Planning
                }
                RunState::Succeeded => break RunStatus::Succeeded,
                RunState::Exhausted => break RunStatus::Exhausted,
                phase => {
                    let attempt = attempts
                        .last_mut()
                        .ok_or_else(|| Error::unexpected("attempt phase reached before planning"))?;
                    self.advance(phase, target, &samples, attempt).await?
                }
            };
        };

        let parser_path = self.writer.path_for(target);
        let test_suite_exit = match status {
            RunStatus::Succeeded => {
                info!(parser = %parser_path.display(), attempts = attempts.len(), "parser generated");
                self.notify(Progress::Succeeded {
                    parser: &parser_path,
                });
                self.run_test_suite().await
            }
            RunStatus::Exhausted => {
                warn!(attempts = attempts.len(), "attempts exhausted");
                self.notify(Progress::Exhausted {
                    attempts: attempts.len() as u32,
                });
                None
            }
        };

        Ok(RunReport {
            target: target.name().to_string(),
            status,
            attempts,
            parser_path,
            usage: self.generator.usage().clone(),
            test_suite_exit,
        })
    }

    /// Execute one phase of the current attempt.
    async fn advance(
        &mut self,
        state: RunState,
        target: &Target,
        samples: &SampleSet,
        attempt: &mut Attempt,
    ) -> Result<RunState> {
        info!(attempt = attempt.index, phase = state.name(), "entering phase");
        match state {
            RunState::Generating(prompt) => match self.generator.generate(&prompt).await {
                Ok(source) => {
                    attempt.source = Some(source.clone());
                    Ok(RunState::Writing(source))
                }
                Err(err) => self.fail(attempt, Phase::Generating, err),
            },
            RunState::Writing(source) => match self.writer.write(target, &source) {
                Ok(path) => Ok(RunState::Executing(path)),
                Err(err) => self.fail(attempt, Phase::Writing, err),
            },
            RunState::Executing(path) => {
                match self.runtime.invoke(&path, &samples.files.pdf).await {
                    Ok(table) => Ok(RunState::Validating(table)),
                    Err(err) => self.fail(attempt, Phase::Executing, err),
                }
            }
            RunState::Validating(table) => {
                let verdict = compare(&samples.schema.table, &table);
                attempt.table = Some(table);
                match verdict {
                    Verdict::Pass => Ok(RunState::Succeeded),
                    Verdict::Fail(diff) => {
                        self.fail(attempt, Phase::Validating, Error::validation_mismatch(diff))
                    }
                }
            }
            other => Ok(other),
        }
    }

    /// Record a failed attempt and decide between retrying and giving up.
    /// Kinds that do not consume an attempt abort the run instead.
    fn fail(&self, attempt: &mut Attempt, phase: Phase, err: Error) -> Result<RunState> {
        if !err.kind().consumes_attempt() {
            warn!(attempt = attempt.index, %phase, error = %err, "fatal error, aborting run");
            return Err(err.with_operation("controller::run"));
        }
        let err = if attempt.index >= MAX_ATTEMPTS { err.persist() } else { err };
        warn!(attempt = attempt.index, %phase, error = %err, "attempt failed");

        let description = describe(phase, &err);
        let failure = Failure {
            phase,
            kind: err.kind(),
            status: err.status(),
            description: description.clone(),
        };
        let retrying = attempt.index < MAX_ATTEMPTS;
        self.notify(Progress::AttemptFailed {
            index: attempt.index,
            failure: &failure,
            retrying,
        });
        attempt.failure = Some(failure);

        if retrying {
            Ok(RunState::Retrying(description))
        } else {
            Ok(RunState::Exhausted)
        }
    }

    async fn run_test_suite(&self) -> Option<i32> {
        if !self.config.run_pytest {
            return None;
        }
        info!(dir = %self.config.root().display(), runtime = self.runtime.name(), "running test suite");
        match self.runtime.run_test_suite(self.config.root()).await {
            Ok(code) => code,
            Err(err) => {
                warn!(error = %err, "test suite did not run");
                None
            }
        }
    }
}

/// Failure text handed to the next prompt.
fn describe(phase: Phase, err: &Error) -> String {
    match err.kind() {
        ErrorKind::ValidationMismatch | ErrorKind::ExecutionFailed => err.message().to_string(),
        kind => format!("{} failed ({}): {}", phase, kind, err.message()),
    }
}
