//! Success/failure accounting for builders and components.

use std::fmt::Display;

use serde::Serialize;
use tracing::{info, warn};

use crate::pipeline::Component;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub key: String,
    pub error: String,
}

/// Outcome of one batch: how many entities were written and which failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub name: String,
    pub succeeded: usize,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Count `result` against this batch, returning the success value.
    pub fn record<T, E: Display>(&mut self, key: impl Into<String>, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => {
                self.succeeded += 1;
                Some(value)
            }
            Err(e) => {
                self.fail(key, e);
                None
            }
        }
    }

    pub fn fail(&mut self, key: impl Into<String>, error: impl Display) {
        self.failures.push(Failure {
            key: key.into(),
            error: error.to_string(),
        });
    }

    /// Fold keyed outcomes into a report.
    pub fn fold<T, E: Display>(
        name: impl Into<String>,
        outcomes: impl IntoIterator<Item = (String, Result<T, E>)>,
    ) -> Self {
        outcomes
            .into_iter()
            .fold(Self::new(name), |mut report, (key, result)| {
                report.record(key, result);
                report
            })
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log the summary, then each failure.
    pub fn log(&self) {
        info!(
            batch = self.name.as_str(),
            succeeded = self.succeeded,
            failed = self.failed(),
            "Batch complete"
        );
        for failure in &self.failures {
            warn!(
                batch = self.name.as_str(),
                key = failure.key.as_str(),
                error = failure.error.as_str(),
                "Batch item failed"
            );
        }
    }
}

/// Batches run by one component, plus the error that stopped it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentReport {
    pub component: Component,
    pub batches: Vec<BatchReport>,
    pub error: Option<String>,
}

impl ComponentReport {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            batches: Vec::new(),
            error: None,
        }
    }

    pub fn push(&mut self, batch: BatchReport) {
        batch.log();
        self.batches.push(batch);
    }

    pub fn batch(&self, name: &str) -> Option<&BatchReport> {
        self.batches.iter().find(|b| b.name == name)
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(BatchReport::failed).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationReport {
    pub cleanup: Option<BatchReport>,
    pub constraints: Option<BatchReport>,
    pub components: Vec<ComponentReport>,
}

impl PopulationReport {
    pub fn component(&self, component: Component) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.component == component)
    }

    pub fn total_failures(&self) -> usize {
        let setup: usize = [&self.cleanup, &self.constraints]
            .into_iter()
            .flatten()
            .map(BatchReport::failed)
            .sum();
        setup + self.components.iter().map(ComponentReport::failed).sum::<usize>()
    }

    /// Components that stopped on a top-level error.
    pub fn aborted(&self) -> Vec<Component> {
        self.components
            .iter()
            .filter(|c| c.error.is_some())
            .map(|c| c.component)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_counts_successes_and_keeps_failure_messages() {
        let outcomes = vec![
            ("a".to_string(), Ok::<_, String>(())),
            ("b".to_string(), Err("boom".to_string())),
            ("c".to_string(), Ok(())),
        ];
        let report = BatchReport::fold("zipcodes", outcomes);
        assert_eq!(report.succeeded, 2);
        assert_eq!(
            report.failures,
            vec![Failure {
                key: "b".into(),
                error: "boom".into()
            }]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn record_returns_value_only_on_success() {
        let mut report = BatchReport::new("x");
        assert_eq!(report.record("k", Ok::<_, String>(7)), Some(7));
        assert_eq!(report.record::<i32, _>("k", Err("no")), None);
        assert_eq!((report.succeeded, report.failed()), (1, 1));
    }

    #[test]
    fn totals_include_constraint_failures() {
        let mut constraints = BatchReport::new("constraints");
        constraints.fail("c", "exists");
        let mut component = ComponentReport::new(Component::BlockGroups);
        component.push(BatchReport::fold(
            "block_groups",
            vec![("1".to_string(), Err::<(), _>("bad"))],
        ));
        let report = PopulationReport {
            cleanup: None,
            constraints: Some(constraints),
            components: vec![component],
        };
        assert_eq!(report.total_failures(), 2);
        assert!(report.aborted().is_empty());
    }
}
