//! Linear provisioning sequencer.
//!
//! A [`Sequencer`] owns an ordered list of named [`Step`]s and runs them one
//! after the other. The first failing step ends the run; the remaining steps
//! are never started. Nothing is rolled back: every step is written so that
//! running the whole sequence again after fixing the cause is safe.

use serde::Serialize;
use tracing::{error, info};

use crate::error::ProvisionError;

/// One named unit of provisioning work.
pub trait Step {
  fn name(&self) -> &str;

  fn run(&mut self) -> Result<(), ProvisionError>;
}

/// A [`Step`] backed by a closure.
pub struct FnStep<F> {
  name: String,
  f: F,
}

impl<F> FnStep<F>
where
  F: FnMut() -> Result<(), ProvisionError>,
{
  pub fn new(name: impl Into<String>, f: F) -> Self {
    Self { name: name.into(), f }
  }
}

impl<F> Step for FnStep<F>
where
  F: FnMut() -> Result<(), ProvisionError>,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn run(&mut self) -> Result<(), ProvisionError> {
    (self.f)()
  }
}

/// Lifecycle of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
  Pending,
  Running,
  Succeeded,
  Failed,
}

/// Final state of a step after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
  pub name: String,
  pub state: StepState,
}

/// Aggregate result of a run.
#[derive(Debug)]
pub enum Outcome {
  AllSucceeded,
  FailedAt { step: String, reason: ProvisionError },
}

impl Outcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::AllSucceeded)
  }
}

/// Outcome of a run plus the state every step ended in.
///
/// Steps after a failure stay [`StepState::Pending`].
#[derive(Debug)]
pub struct RunReport {
  pub outcome: Outcome,
  pub steps: Vec<StepStatus>,
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug)]
pub enum SequenceEvent<'e> {
  Started { index: usize, total: usize, name: &'e str },
  Succeeded { name: &'e str },
  Failed { name: &'e str, reason: &'e ProvisionError },
}

/// Ordered list of steps, run at most once.
#[derive(Default)]
pub struct Sequencer<'a> {
  steps: Vec<Box<dyn Step + 'a>>,
}

impl<'a> Sequencer<'a> {
  pub fn new() -> Self {
    Self { steps: Vec::new() }
  }

  pub fn push(&mut self, step: impl Step + 'a) {
    self.steps.push(Box::new(step));
  }

  /// Append a closure step.
  pub fn step<F>(mut self, name: impl Into<String>, f: F) -> Self
  where
    F: FnMut() -> Result<(), ProvisionError> + 'a,
  {
    self.push(FnStep::new(name, f));
    self
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name()).collect()
  }

  pub fn run(self) -> RunReport {
    self.run_with(|_| {})
  }

  /// Run every step in order, reporting progress to `observe`.
  pub fn run_with<O>(self, mut observe: O) -> RunReport
  where
    O: FnMut(SequenceEvent<'_>),
  {
    let total = self.steps.len();
    let mut statuses: Vec<StepStatus> = self
      .steps
      .iter()
      .map(|s| StepStatus {
        name: s.name().to_string(),
        state: StepState::Pending,
      })
      .collect();

    for (index, mut step) in self.steps.into_iter().enumerate() {
      let name = step.name().to_string();
      statuses[index].state = StepState::Running;
      info!(step = %name, index = index + 1, total, "running step");
      observe(SequenceEvent::Started {
        index,
        total,
        name: &name,
      });

      match step.run() {
        Ok(()) => {
          statuses[index].state = StepState::Succeeded;
          info!(step = %name, "step succeeded");
          observe(SequenceEvent::Succeeded { name: &name });
        }
        Err(reason) => {
          statuses[index].state = StepState::Failed;
          error!(step = %name, error = %reason, "step failed, aborting");
          observe(SequenceEvent::Failed {
            name: &name,
            reason: &reason,
          });
          return RunReport {
            outcome: Outcome::FailedAt { step: name, reason },
            steps: statuses,
          };
        }
      }
    }

    RunReport {
      outcome: Outcome::AllSucceeded,
      steps: statuses,
    }
  }
}
