//! Building the pipeline and metrics settings from configuration.
//!
//! `[pipeline] steps` lists step ids in order. Each id may be refined by a
//! `[step.<id>]` section; ids from the standard pipeline fall back to their
//! standard definition, any other id must name at least `name` and
//! `storage_key`. Without a step list the standard pipeline is used, still
//! subject to per-step overrides.

use crate::domain::error::StratlabError;
use crate::domain::metrics::{SummaryConfig, TRADING_DAYS_PER_YEAR};
use crate::domain::step::{StepDefinition, StepGate};
use crate::ports::config_port::ConfigPort;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Postgres,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// `[store] backend`, defaulting to sqlite.
pub fn store_backend(config: &dyn ConfigPort) -> Result<StoreBackend, StratlabError> {
    match config.get_string("store", "backend") {
        None => Ok(StoreBackend::Sqlite),
        Some(raw) => raw.parse().map_err(|reason| StratlabError::ConfigInvalid {
            section: "store".to_string(),
            key: "backend".to_string(),
            reason,
        }),
    }
}

pub fn load_step_gate(config: &dyn ConfigPort) -> Result<StepGate, StratlabError> {
    let standard = StepGate::standard();
    let listed = config.get_list("pipeline", "steps");

    let ids: Vec<String> = if listed.is_empty() {
        standard.definitions().iter().map(|d| d.id.clone()).collect()
    } else {
        listed
    };

    let mut steps = Vec::with_capacity(ids.len());
    for id in &ids {
        let base = standard.definition(id).ok();
        steps.push(load_step(config, id, base)?);
    }

    tracing::debug!(steps = ?ids, "loaded pipeline definition");
    StepGate::new(steps)
}

fn load_step(
    config: &dyn ConfigPort,
    id: &str,
    base: Option<&StepDefinition>,
) -> Result<StepDefinition, StratlabError> {
    let section = format!("step.{id}");
    let lookup = |key: &str| {
        config
            .get_string(&section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let name = match (lookup("name"), base) {
        (Some(name), _) => name,
        (None, Some(base)) => base.name.clone(),
        (None, None) => {
            return Err(StratlabError::ConfigMissing {
                section,
                key: "name".to_string(),
            });
        }
    };

    let storage_key = match (lookup("storage_key"), base) {
        (Some(key), _) => key,
        (None, Some(base)) => base.storage_key.clone(),
        (None, None) => {
            return Err(StratlabError::ConfigMissing {
                section,
                key: "storage_key".to_string(),
            });
        }
    };

    let path = lookup("path")
        .or_else(|| base.map(|b| b.path.clone()))
        .unwrap_or_else(|| format!("/{id}"));
    let required = config.get_bool(&section, "required", base.is_some_and(|b| b.required));

    Ok(StepDefinition::new(id, name, path, required, storage_key))
}

pub fn load_summary_config(config: &dyn ConfigPort) -> Result<SummaryConfig, StratlabError> {
    let defaults = SummaryConfig::default();

    let risk_free_rate = config.get_double("metrics", "risk_free_rate", defaults.risk_free_rate);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(StratlabError::ConfigInvalid {
            section: "metrics".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }

    let periods_per_year = config.get_double("metrics", "periods_per_year", TRADING_DAYS_PER_YEAR);
    if periods_per_year <= 0.0 || !periods_per_year.is_finite() {
        return Err(StratlabError::ConfigInvalid {
            section: "metrics".to_string(),
            key: "periods_per_year".to_string(),
            reason: "periods_per_year must be positive".to_string(),
        });
    }

    Ok(SummaryConfig {
        risk_free_rate,
        periods_per_year,
    })
}
