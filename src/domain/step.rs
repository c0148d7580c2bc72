//! Pipeline step definitions and the step gate.
//!
//! The gate owns the fixed, ordered list of [`StepDefinition`]s and derives a
//! [`PipelineState`] for a session from whatever the session store currently
//! holds. Storage absence and corruption never escape the gate: they become
//! [`StepState::Missing`] and [`StepState::Corrupted`].

use crate::domain::error::StratlabError;
use crate::domain::record::StepRecord;
use crate::domain::session::{SessionId, StoreKey};
use crate::ports::session_store_port::SessionStore;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    pub name: String,
    /// Where the producing module lives. Informational only.
    pub path: String,
    pub required: bool,
    pub storage_key: String,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        required: bool,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            required,
            storage_key: storage_key.into(),
        }
    }

    pub fn store_key(&self, session_id: &SessionId) -> StoreKey {
        StoreKey::new(self.storage_key.clone(), session_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepState {
    Missing,
    Imported(StepRecord),
    /// Something is stored but cannot be read back.
    Corrupted { reason: String },
}

impl StepState {
    /// Corrupted data counts as imported but carries no usable record.
    pub fn is_imported(&self) -> bool {
        !matches!(self, StepState::Missing)
    }

    pub fn data(&self) -> Option<&StepRecord> {
        match self {
            StepState::Imported(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepStatus {
    pub step_id: String,
    pub name: String,
    pub required: bool,
    pub state: StepState,
}

impl StepStatus {
    fn satisfied(&self) -> bool {
        !self.required || self.state.data().is_some()
    }
}

/// Per-session view of the pipeline, in definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub session_id: SessionId,
    pub steps: Vec<StepStatus>,
    pub all_required_satisfied: bool,
}

impl PipelineState {
    pub fn step(&self, step_id: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Ids of required steps that still block advancement.
    pub fn missing_required(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.satisfied())
            .map(|s| s.step_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGate {
    steps: Vec<StepDefinition>,
}

impl StepGate {
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, StratlabError> {
        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.trim().is_empty() {
                return Err(StratlabError::InvalidStep {
                    step_id: step.id.clone(),
                    reason: "id must not be empty".into(),
                });
            }
            if step.storage_key.trim().is_empty() {
                return Err(StratlabError::InvalidStep {
                    step_id: step.id.clone(),
                    reason: "storage key must not be empty".into(),
                });
            }
            if !seen.insert(step.id.as_str()) {
                return Err(StratlabError::InvalidStep {
                    step_id: step.id.clone(),
                    reason: "duplicate id".into(),
                });
            }
        }
        Ok(Self { steps })
    }

    /// Regime detection through risk analysis; alpha signal and backtesting
    /// are the mandatory steps.
    pub fn standard() -> Self {
        Self {
            steps: standard_steps(),
        }
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn definition(&self, step_id: &str) -> Result<&StepDefinition, StratlabError> {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .ok_or_else(|| StratlabError::UnknownStep {
                step_id: step_id.to_string(),
            })
    }

    pub fn evaluate(&self, session_id: &SessionId, store: &dyn SessionStore) -> PipelineState {
        let steps: Vec<StepStatus> = self
            .steps
            .iter()
            .map(|def| {
                let key = def.store_key(session_id);
                let state = match store.get(&key) {
                    Ok(record) => StepState::Imported(record),
                    Err(StratlabError::NotFound { .. }) => StepState::Missing,
                    Err(StratlabError::Deserialization { reason, .. }) => {
                        tracing::warn!(step = %def.id, key = %key, %reason, "stored step data is corrupted");
                        StepState::Corrupted { reason }
                    }
                    Err(e) => {
                        tracing::warn!(step = %def.id, key = %key, error = %e, "step lookup failed; treating as not imported");
                        StepState::Missing
                    }
                };
                StepStatus {
                    step_id: def.id.clone(),
                    name: def.name.clone(),
                    required: def.required,
                    state,
                }
            })
            .collect();

        let all_required_satisfied = steps.iter().all(StepStatus::satisfied);
        PipelineState {
            session_id: session_id.clone(),
            steps,
            all_required_satisfied,
        }
    }

    /// Pure function of `state`; never touches storage.
    pub fn can_advance(state: &PipelineState) -> bool {
        state.steps.iter().all(StepStatus::satisfied)
    }
}

fn standard_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(
            "regime",
            "Regime Detection",
            "/regime-detection",
            false,
            "strategyLab_regimeData",
        ),
        StepDefinition::new(
            "alphaSignal",
            "Alpha Signal Discovery",
            "/alpha-signal",
            true,
            "strategyLab_alphaSignalData",
        ),
        StepDefinition::new(
            "backtesting",
            "Backtesting",
            "/backtesting",
            true,
            "strategyLab_backtestingData",
        ),
        StepDefinition::new(
            "optimization",
            "Portfolio Optimization",
            "/portfolio-optimization",
            false,
            "strategyLab_optimizationData",
        ),
        StepDefinition::new(
            "riskAnalysis",
            "Risk Analysis",
            "/risk-analysis",
            false,
            "strategyLab_riskAnalysisData",
        ),
    ]
}
