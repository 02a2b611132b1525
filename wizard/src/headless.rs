// Non-interactive wizard runs
//
// Feeds a JSON answers file through the same controller the TUI drives and records a
// transcript of everything the view is asked to do.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::path::Path;
use std::sync::Mutex;

use crate::models::draft::FormDraft;
use crate::wizard::controller::{Prompt, StepView, Submission, Transition};
use crate::wizard::handle::WizardHandle;
use crate::wizard::history::HistoryBackend;
use crate::wizard::steps::Step;
use crate::wizard::validators::FieldErrors;

/// View without a screen: logs, keeps a transcript, answers prompts with a fixed reply.
pub struct ConsoleView {
    accept_prompts: bool,
    transcript: Mutex<Vec<String>>,
}

impl ConsoleView {
    pub fn new(accept_prompts: bool) -> Self {
        Self {
            accept_prompts,
            transcript: Mutex::new(Vec::new()),
        }
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn record(&self, line: String) {
        if let Ok(mut t) = self.transcript.lock() {
            t.push(line);
        }
    }
}

#[async_trait]
impl StepView for ConsoleView {
    async fn mount(&self, step: Step, markup: &str) {
        info!(
            "[PHASE: headless] [STEP: mount] step {} ({} bytes of markup)",
            step.number(),
            markup.len()
        );
        self.record(format!("mount {}", step.number()));
    }

    async fn show_errors(&self, step: Step, errors: &FieldErrors) {
        for (field, message) in errors.iter() {
            warn!(
                "[PHASE: headless] [STEP: validate] step {} {}: {}",
                step.number(),
                field,
                message
            );
            self.record(format!("error {} {}: {}", step.number(), field, message));
        }
    }

    async fn show_load_error(&self, step: Step, message: &str) {
        warn!(
            "[PHASE: headless] [STEP: load] step {} failed to load: {}",
            step.number(),
            message
        );
        self.record(format!("load-error {}: {}", step.number(), message));
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        info!(
            "[PHASE: headless] [STEP: confirm] {:?} -> {}",
            prompt, self.accept_prompts
        );
        self.record(format!("confirm {:?} {}", prompt, self.accept_prompts));
        self.accept_prompts
    }
}

/// Where a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Submitted(Submission),
    /// Validation failed or a prompt was declined on `step`.
    Stopped { step: Step, transition: Transition },
}

pub fn read_answers(path: &Path) -> Result<FormDraft> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read answers file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid answers file {:?}", path))
}

/// Boot the wizard, optionally replace the draft with `answers` and press "Next" until the
/// order is submitted or a step refuses to move.
pub async fn run_answers<B: HistoryBackend>(
    handle: &WizardHandle<B>,
    answers: Option<FormDraft>,
    resume: bool,
) -> Result<RunOutcome> {
    let restored = handle.boot(resume).await?;
    info!(
        "[PHASE: headless] [STEP: boot] resume requested: {}, restored: {}",
        resume, restored
    );

    if let Some(answers) = answers {
        handle.edit(|draft| *draft = answers)?;
    }

    // Each step moves at most once, plus the submission itself.
    for _ in 0..=Step::ALL.len() {
        let transition = handle.next().await?;
        match transition {
            Transition::Moved { from, to } => {
                info!(
                    "[PHASE: headless] [STEP: next] {} -> {}",
                    from.number(),
                    to.number()
                );
            }
            Transition::Submitted(submission) => return Ok(RunOutcome::Submitted(submission)),
            other => {
                let (state, _) = handle.snapshot()?;
                return Ok(RunOutcome::Stopped {
                    step: state.current(),
                    transition: other,
                });
            }
        }
    }

    anyhow::bail!("wizard did not finish after {} steps", Step::ALL.len())
}
