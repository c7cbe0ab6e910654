//! Per-period evaluation and publication lifecycle.
//!
//! Opening and closing an evaluation is a free toggle. Publishing freezes
//! the aggregated results of a period into a snapshot; publishing again
//! recomputes and replaces it. There is no way back to draft.

use crate::aggregate::{self, PeriodAggregation};
use crate::models::{PeriodSnapshot, PeriodState, SkippedRecord};
use crate::state::EvaluationState;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub period: String,
    pub teachers: usize,
    pub republished: bool,
    pub skipped: Vec<SkippedRecord>,
}

impl EvaluationState {
    pub fn set_evaluation_open(&mut self, period: &str, open: bool) {
        tracing::info!(period, open, "evaluation toggled");
        self.evaluation_open.insert(period.to_string(), open);
    }

    pub fn is_evaluation_open(&self, period: &str) -> bool {
        self.evaluation_open.get(period).copied().unwrap_or(false)
    }

    pub fn is_published(&self, period: &str) -> bool {
        self.results_published.get(period).copied().unwrap_or(false)
    }

    pub fn period_state(&self, period: &str) -> PeriodState {
        PeriodState {
            evaluation_open: self.is_evaluation_open(period),
            published: self.is_published(period),
        }
    }

    /// Computes the results of `period` from the current state without publishing them.
    pub fn aggregate(&self, period: &str) -> PeriodAggregation {
        aggregate::aggregate_period(
            period,
            &self.responses,
            &self.roster,
            &self.questions,
            &self.factors,
        )
    }

    /// Aggregates `period`, stores the snapshot over any earlier one and marks
    /// the period published.
    pub fn publish(&mut self, period: &str) -> PublishOutcome {
        let PeriodAggregation {
            results, skipped, ..
        } = self.aggregate(period);
        let republished = self.is_published(period);
        let teachers = results.len();

        self.results.insert(period.to_string(), results);
        self.results_published.insert(period.to_string(), true);

        tracing::info!(
            period,
            teachers,
            skipped = skipped.len(),
            republished,
            "published period results"
        );

        PublishOutcome {
            period: period.to_string(),
            teachers,
            republished,
            skipped,
        }
    }

    /// The published snapshot of `period`, if any.
    pub fn snapshot(&self, period: &str) -> Option<&PeriodSnapshot> {
        if !self.is_published(period) {
            return None;
        }
        self.results.get(period)
    }
}
