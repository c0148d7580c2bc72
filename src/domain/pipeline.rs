//! Per-session strategy construction workflow.

use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::SessionId;
use crate::domain::step::{PipelineState, StepGate, StepState};
use crate::ports::session_store_port::SessionStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    pub state: PipelineState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    pub allowed: bool,
    pub state: PipelineState,
}

pub struct PipelineController<'a> {
    gate: &'a StepGate,
    store: &'a dyn SessionStore,
}

impl<'a> PipelineController<'a> {
    pub fn new(gate: &'a StepGate, store: &'a dyn SessionStore) -> Self {
        Self { gate, store }
    }

    pub fn gate(&self) -> &StepGate {
        self.gate
    }

    pub fn load_state(&self, session_id: &SessionId) -> PipelineState {
        self.gate.evaluate(session_id, self.store)
    }

    /// Publishes a module's result under the step's storage key.
    pub fn export_step(
        &self,
        session_id: &SessionId,
        step_id: &str,
        payload: &StepPayload,
    ) -> Result<StepRecord, StratlabError> {
        let step = self.gate.definition(step_id)?;
        let record = self.store.put(&step.store_key(session_id), payload)?;
        tracing::info!(session = %session_id, step = %step.id, module = %payload.module, "exported step data");
        Ok(record)
    }

    /// Absent and corrupted data are reported through the outcome, not as
    /// errors. Only an unknown step id fails.
    pub fn import_step(
        &self,
        session_id: &SessionId,
        step_id: &str,
    ) -> Result<ImportOutcome, StratlabError> {
        let step = self.gate.definition(step_id)?;
        let state = self.load_state(session_id);

        let status = state.step(&step.id).map(|s| s.state.clone());
        let (success, message) = match status {
            Some(StepState::Imported(_)) => {
                tracing::info!(session = %session_id, step = %step.id, "step data imported");
                (true, format!("{} data imported successfully.", step.name))
            }
            Some(StepState::Corrupted { reason }) => {
                tracing::error!(session = %session_id, step = %step.id, %reason, "stored step data is corrupted");
                (
                    false,
                    format!("Error parsing imported data for {}: {}", step.name, reason),
                )
            }
            Some(StepState::Missing) | None => (
                false,
                format!(
                    "No exported data found for {}. Please run and export from the module first.",
                    step.name
                ),
            ),
        };

        Ok(ImportOutcome {
            success,
            message,
            state,
        })
    }

    /// Never writes. What advancing means is up to the caller.
    pub fn try_advance(&self, session_id: &SessionId) -> AdvanceOutcome {
        let state = self.load_state(session_id);
        let allowed = StepGate::can_advance(&state);
        if !allowed {
            tracing::debug!(session = %session_id, missing = ?state.missing_required(), "advance blocked");
        }
        AdvanceOutcome { allowed, state }
    }
}
