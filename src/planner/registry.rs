//! Name-keyed planner construction
//!
//! Configuration names a planner by key (`index.planner`); the registry maps
//! that key to a factory. A missing key or a failing factory disables
//! indexing for the table and is reported as a planner init failure.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::IndexerConfig;
use crate::coordinator::{IndexError, IndexResult};
use crate::observability::{log_event_with_fields, Event};

use super::covered::CoveredColumnPlanner;
use super::table::TableState;
use super::{IndexPlanner, PlannerError};

/// Registry key of the covered-columns planner
pub const COVERED_COLUMNS: &str = "covered-columns";

/// What a factory gets to build a planner for one table
pub struct PlannerContext<'a> {
    pub table: &'a str,
    pub options: &'a BTreeMap<String, String>,
    pub state: Arc<dyn TableState>,
}

pub type PlannerFactory =
    Box<dyn Fn(&PlannerContext<'_>) -> Result<Arc<dyn IndexPlanner>, PlannerError> + Send + Sync>;

pub struct PlannerRegistry {
    factories: BTreeMap<String, PlannerFactory>,
}

impl PlannerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in planners
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(COVERED_COLUMNS, |ctx| {
            Ok(Arc::new(CoveredColumnPlanner::from_context(ctx)?) as Arc<dyn IndexPlanner>)
        });
        registry
    }

    /// Add or replace the factory for `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&PlannerContext<'_>) -> Result<Arc<dyn IndexPlanner>, PlannerError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the planner `config` selects for `table`.
    ///
    /// Returns Ok(None) when the config leaves the table unindexed.
    pub fn build(
        &self,
        table: &str,
        config: &IndexerConfig,
        state: Arc<dyn TableState>,
    ) -> IndexResult<Option<Arc<dyn IndexPlanner>>> {
        if !config.is_active() {
            return Ok(None);
        }
        let Some(name) = config.planner.as_deref() else {
            return Ok(None);
        };

        let result = match self.factories.get(name) {
            Some(factory) => factory(&PlannerContext {
                table,
                options: &config.options,
                state,
            })
            .map_err(|e| IndexError::planner_init_failed(table, e.to_string())),
            None => Err(IndexError::planner_init_failed(
                table,
                format!(
                    "no planner registered as '{}' (known: {})",
                    name,
                    self.names().join(", ")
                ),
            )),
        };

        match result {
            Ok(planner) => Ok(Some(planner)),
            Err(err) => {
                log_event_with_fields(
                    Event::PlannerInitFailed,
                    &[
                        ("code", err.code().code()),
                        ("planner", name),
                        ("table", table),
                        ("error", err.message()),
                    ],
                );
                Err(err)
            }
        }
    }
}

impl Default for PlannerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for PlannerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerRegistry")
            .field("planners", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
