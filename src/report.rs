use std::collections::BTreeMap;
use std::fmt::Write;

use crate::aggregate::{format_average, round2};
use crate::models::{PeriodSnapshot, PeriodState, TeacherPeriodResult};

#[derive(Debug, Clone, PartialEq)]
pub struct FactorSummary {
    pub factor_id: u32,
    pub name: String,
    pub teacher_count: usize,
    pub mean_average: f64,
}

/// Mean factor average across the teachers that were scored on each factor.
pub fn summarize_by_factor(snapshot: &PeriodSnapshot) -> Vec<FactorSummary> {
    let mut map: BTreeMap<u32, (String, usize, f64)> = BTreeMap::new();

    for result in snapshot.values() {
        for factor in result.factor_results.values() {
            if factor.max_points == 0 {
                continue;
            }
            let entry = map
                .entry(factor.factor_id)
                .or_insert_with(|| (factor.name.clone(), 0, 0.0));
            entry.1 += 1;
            entry.2 += factor.average;
        }
    }

    map.into_iter()
        .map(|(factor_id, (name, teacher_count, total))| FactorSummary {
            factor_id,
            name,
            teacher_count,
            mean_average: if teacher_count == 0 {
                0.0
            } else {
                round2(total / teacher_count as f64)
            },
        })
        .collect()
}

/// Teachers by overall average, best first; ties by name.
pub fn ranked(snapshot: &PeriodSnapshot) -> Vec<&TeacherPeriodResult> {
    let mut results: Vec<&TeacherPeriodResult> = snapshot.values().collect();
    results.sort_by(|a, b| {
        b.overall_average
            .partial_cmp(&a.overall_average)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

pub fn build_report(period: &str, state: PeriodState, snapshot: Option<&PeriodSnapshot>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Teacher Evaluation Results");
    let _ = writeln!(
        output,
        "Period {} ({}, evaluation {})",
        period,
        state.publication(),
        if state.evaluation_open { "open" } else { "closed" }
    );
    let _ = writeln!(output);

    let Some(snapshot) = snapshot else {
        let _ = writeln!(output, "Results for this period have not been published.");
        return output;
    };

    let _ = writeln!(output, "## Factor Overview");
    let summaries = summarize_by_factor(snapshot);
    if summaries.is_empty() {
        let _ = writeln!(output, "No scored answers for this period.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} across {} teachers",
                summary.name,
                format_average(summary.mean_average),
                summary.teacher_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Teachers");

    if snapshot.is_empty() {
        let _ = writeln!(output, "No teachers were evaluated in this period.");
        return output;
    }

    for result in ranked(snapshot) {
        let _ = writeln!(
            output,
            "- {} ({}) overall {} from {} responses",
            result.name,
            result.teacher_id,
            format_average(result.overall_average),
            result.response_count
        );
        for factor in result.factor_results.values() {
            let _ = writeln!(
                output,
                "  - {}: {} ({}/{} points)",
                factor.name,
                format_average(factor.average),
                factor.total_points,
                factor.max_points
            );
        }
    }

    output
}
