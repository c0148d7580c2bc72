//! Step payload envelopes and persisted step records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which analysis module produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    RegimeDetection,
    AlphaSignal,
    Backtesting,
    PortfolioOptimization,
    RiskAnalysis,
    OptionsPricing,
    Other,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 7] = [
        ModuleKind::RegimeDetection,
        ModuleKind::AlphaSignal,
        ModuleKind::Backtesting,
        ModuleKind::PortfolioOptimization,
        ModuleKind::RiskAnalysis,
        ModuleKind::OptionsPricing,
        ModuleKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::RegimeDetection => "regimeDetection",
            ModuleKind::AlphaSignal => "alphaSignal",
            ModuleKind::Backtesting => "backtesting",
            ModuleKind::PortfolioOptimization => "portfolioOptimization",
            ModuleKind::RiskAnalysis => "riskAnalysis",
            ModuleKind::OptionsPricing => "optionsPricing",
            ModuleKind::Other => "other",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown module kind: {s}"))
    }
}

/// Schema-tagged module output. `data` is opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPayload {
    pub module: ModuleKind,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub data: serde_json::Value,
}

fn default_schema_version() -> u32 {
    1
}

impl StepPayload {
    pub fn new(module: ModuleKind, data: serde_json::Value) -> Self {
        Self {
            module,
            schema_version: default_schema_version(),
            data,
        }
    }
}

/// What the session store holds for one `(storageKey, sessionId)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub payload: StepPayload,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn stamped_now(payload: StepPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }
}
