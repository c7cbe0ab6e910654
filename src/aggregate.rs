use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{
    Answer, EnrollmentKey, Factor, FactorResult, PeriodSnapshot, Question, ResponseRecord,
    SkipReason, SkippedRecord, TeacherPeriodResult,
};
use crate::roster::Roster;
use crate::rubric;

/// Top of the published scale.
pub const SCALE: f64 = 5.0;

/// Results of one period together with everything that was left out of them.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAggregation {
    pub period: String,
    pub results: PeriodSnapshot,
    pub skipped: Vec<SkippedRecord>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rescales `points` out of `max_points` to the 0-5 scale, or 0 when nothing was scored.
pub fn scaled_average(points: u32, max_points: u32) -> f64 {
    if max_points == 0 {
        return 0.0;
    }
    round2(points as f64 / max_points as f64 * SCALE)
}

pub fn format_average(value: f64) -> String {
    format!("{value:.2}")
}

fn skipped(response: &ResponseRecord, reason: SkipReason) -> SkippedRecord {
    tracing::warn!(
        response = %response.id,
        student = %response.student_id,
        teacher = %response.teacher_id,
        course = %response.course_id,
        %reason,
        "response excluded from aggregation"
    );
    SkippedRecord {
        response_id: response.id,
        student_id: response.student_id.clone(),
        teacher_id: response.teacher_id.clone(),
        course_id: response.course_id.clone(),
        reason,
    }
}

/// Scores every response that belongs to `period` and rolls the points up
/// per teacher and factor.
///
/// A response belongs to the period when the roster holds an enrollment for
/// its student, course and teacher in that period and the response resolves
/// to that period (see `Roster::response_period`), so an untagged response
/// counts in one period only. Teachers missing from the roster get
/// no result. Open questions never count. Every exclusion that is a data
/// problem rather than a response from another period ends up in `skipped`.
pub fn aggregate_period(
    period: &str,
    responses: &[ResponseRecord],
    roster: &Roster,
    questions: &[Question],
    factors: &[Factor],
) -> PeriodAggregation {
    let in_period: HashSet<EnrollmentKey> = roster
        .enrollments
        .iter()
        .filter(|enrollment| enrollment.period == period)
        .map(|enrollment| enrollment.key())
        .collect();
    let question_index: HashMap<u32, &Question> =
        questions.iter().map(|question| (question.id, question)).collect();

    let mut skipped_records = Vec::new();
    let mut by_teacher: BTreeMap<&str, Vec<&ResponseRecord>> = BTreeMap::new();

    for response in responses {
        let key = EnrollmentKey {
            student_id: response.student_id.clone(),
            course_id: response.course_id.clone(),
            teacher_id: response.teacher_id.clone(),
            period: period.to_string(),
        };

        match roster.response_period(response) {
            Some(resolved) if resolved != period => continue,
            Some(_) if in_period.contains(&key) => {}
            _ => {
                skipped_records.push(skipped(response, SkipReason::NoEnrollment));
                continue;
            }
        }

        by_teacher
            .entry(response.teacher_id.as_str())
            .or_default()
            .push(response);
    }

    let mut results = PeriodSnapshot::new();

    for (teacher_id, teacher_responses) in by_teacher {
        let Some(teacher) = roster.teacher(teacher_id) else {
            for response in teacher_responses {
                skipped_records.push(skipped(response, SkipReason::UnknownTeacher));
            }
            continue;
        };

        let mut factor_results: BTreeMap<u32, FactorResult> = factors
            .iter()
            .map(|factor| {
                (
                    factor.id,
                    FactorResult {
                        factor_id: factor.id,
                        name: factor.name.clone(),
                        total_points: 0,
                        max_points: 0,
                        average: 0.0,
                    },
                )
            })
            .collect();

        for response in &teacher_responses {
            for (question_id, answer) in &response.answers {
                let Some(question) = question_index.get(question_id) else {
                    skipped_records.push(skipped(response, SkipReason::UnknownQuestion(*question_id)));
                    continue;
                };
                if question.answer_type.is_open() {
                    continue;
                }
                let Some(slot) = factor_results.get_mut(&question.factor_id) else {
                    skipped_records.push(skipped(
                        response,
                        SkipReason::UnknownFactor {
                            question_id: question.id,
                            factor_id: question.factor_id,
                        },
                    ));
                    continue;
                };
                let code = match answer {
                    Answer::Code(code) => *code,
                    Answer::Text(_) => {
                        skipped_records.push(skipped(
                            response,
                            SkipReason::NonNumericAnswer {
                                question_id: question.id,
                            },
                        ));
                        continue;
                    }
                };

                match rubric::score(&question.answer_type, code) {
                    Ok(points) => {
                        slot.total_points += points.points;
                        slot.max_points += points.max_points;
                    }
                    Err(_) => {
                        skipped_records.push(skipped(
                            response,
                            SkipReason::UnknownAnswerType {
                                question_id: question.id,
                                answer_type: question.answer_type.to_string(),
                            },
                        ));
                    }
                }
            }
        }

        let mut total_points = 0;
        let mut max_points = 0;
        for factor in factor_results.values_mut() {
            if factor.max_points > 0 {
                factor.average = scaled_average(factor.total_points, factor.max_points);
                total_points += factor.total_points;
                max_points += factor.max_points;
            }
        }
        let overall_average = scaled_average(total_points, max_points);

        tracing::debug!(
            teacher = teacher_id,
            period,
            responses = teacher_responses.len(),
            total_points,
            max_points,
            overall = %format_average(overall_average),
            "aggregated teacher"
        );

        results.insert(
            teacher_id.to_string(),
            TeacherPeriodResult {
                teacher_id: teacher_id.to_string(),
                name: teacher.name.clone(),
                factor_results,
                total_points,
                max_points,
                overall_average,
                response_count: teacher_responses.len(),
                period: period.to_string(),
            },
        );
    }

    PeriodAggregation {
        period: period.to_string(),
        results,
        skipped: skipped_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerType, Enrollment, Teacher};

    fn question(id: u32, factor_id: u32, answer_type: AnswerType) -> Question {
        Question {
            id,
            text: format!("Question {id}"),
            factor_id,
            answer_type,
        }
    }

    fn factors() -> Vec<Factor> {
        vec![
            Factor {
                id: 1,
                name: "Preparation".to_string(),
            },
            Factor {
                id: 2,
                name: "Engagement".to_string(),
            },
        ]
    }

    fn roster() -> Roster {
        let enrollment = |student: &str, teacher: &str, period: &str| Enrollment {
            student_id: student.to_string(),
            course_id: "c1".to_string(),
            teacher_id: teacher.to_string(),
            group: "1".to_string(),
            period: period.to_string(),
        };
        Roster {
            teachers: vec![Teacher {
                id: "t1".to_string(),
                name: "Ada Ruiz".to_string(),
                email: "ada@uni.edu".to_string(),
            }],
            enrollments: vec![
                enrollment("s1", "t1", "2024-1"),
                enrollment("s2", "t1", "2024-1"),
                enrollment("s3", "t1", "2023-2"),
                enrollment("s1", "ghost", "2024-1"),
            ],
            ..Roster::default()
        }
    }

    fn response(student: &str, teacher: &str, answers: &[(u32, i64)]) -> ResponseRecord {
        ResponseRecord::new(
            student,
            teacher,
            "c1",
            Some("2024-1".to_string()),
            answers
                .iter()
                .map(|(id, code)| (*id, Answer::Code(*code)))
                .collect(),
        )
    }

    #[test]
    fn single_binary_answer_scores_full_marks() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let responses = vec![response("s1", "t1", &[(1, 5)])];
        let aggregation = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());

        let result = &aggregation.results["t1"];
        let factor = &result.factor_results[&1];
        assert_eq!(factor.total_points, 4);
        assert_eq!(factor.max_points, 4);
        assert_eq!(factor.average, 5.0);
        assert_eq!(format_average(result.overall_average), "5.00");
        assert_eq!(result.factor_results[&2].average, 0.0);
        assert!(aggregation.skipped.is_empty());
    }

    #[test]
    fn frequency_answers_accumulate_across_responses() {
        let questions = vec![question(1, 1, AnswerType::Frequency)];
        let responses = vec![
            response("s1", "t1", &[(1, 3)]),
            response("s2", "t1", &[(1, 2)]),
        ];
        let aggregation = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());

        let result = &aggregation.results["t1"];
        let factor = &result.factor_results[&1];
        assert_eq!(factor.total_points, 4);
        assert_eq!(factor.max_points, 8);
        assert_eq!(factor.average, 2.5);
        assert_eq!(result.response_count, 2);
    }

    #[test]
    fn period_without_responses_yields_no_results() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let responses = vec![response("s1", "t1", &[(1, 5)])];
        let aggregation = aggregate_period("2025-1", &responses, &roster(), &questions, &factors());

        assert!(aggregation.results.is_empty());
        assert!(aggregation.skipped.is_empty());
    }

    #[test]
    fn overall_totals_match_factor_sums() {
        let questions = vec![
            question(1, 1, AnswerType::Binary),
            question(2, 2, AnswerType::Rating),
            question(3, 2, AnswerType::FrequencyOrNa),
            question(4, 1, AnswerType::Open),
        ];
        let responses = vec![
            response("s1", "t1", &[(1, 1), (2, 4), (3, 5), (4, 5)]),
            response("s2", "t1", &[(1, 5), (2, 3), (3, 2)]),
        ];
        let aggregation = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());
        let result = &aggregation.results["t1"];

        let points: u32 = result.factor_results.values().map(|f| f.total_points).sum();
        let max: u32 = result.factor_results.values().map(|f| f.max_points).sum();
        assert_eq!(result.total_points, points);
        assert_eq!(result.max_points, max);
        // 2 + 3 + 4 + 4 + 0 + 1 out of six scored answers
        assert_eq!(points, 14);
        assert_eq!(max, 24);
        assert_eq!(result.overall_average, 2.92);
        for factor in result.factor_results.values() {
            assert!(factor.max_points >= factor.total_points);
            assert!((0.0..=SCALE).contains(&factor.average));
        }
    }

    #[test]
    fn open_questions_do_not_count() {
        let questions = vec![question(1, 1, AnswerType::Open)];
        let mut record = response("s1", "t1", &[]);
        record
            .answers
            .insert(1, Answer::Text("clear explanations".to_string()));
        let aggregation = aggregate_period("2024-1", &[record], &roster(), &questions, &factors());

        let result = &aggregation.results["t1"];
        assert_eq!(result.max_points, 0);
        assert_eq!(format_average(result.overall_average), "0.00");
        assert!(aggregation.skipped.is_empty());
    }

    #[test]
    fn short_positional_answers_leave_remaining_questions_unscored() {
        let questions = vec![
            question(1, 1, AnswerType::Binary),
            question(2, 1, AnswerType::Binary),
            question(3, 2, AnswerType::Rating),
        ];
        let record = ResponseRecord::bind_positional(
            "s1",
            "t1",
            "c1",
            Some("2024-1".to_string()),
            vec![Answer::Code(5)],
            &questions,
        );
        let aggregation = aggregate_period("2024-1", &[record], &roster(), &questions, &factors());

        let result = &aggregation.results["t1"];
        assert_eq!(result.factor_results[&1].max_points, 4);
        assert_eq!(result.factor_results[&2].max_points, 0);
    }

    #[test]
    fn answers_follow_question_ids_not_catalog_order() {
        let questions = vec![
            question(1, 1, AnswerType::Binary),
            question(2, 2, AnswerType::Binary),
        ];
        let responses = vec![response("s1", "t1", &[(2, 5)])];
        let reordered = vec![questions[1].clone(), questions[0].clone()];

        let before = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());
        let after = aggregate_period("2024-1", &responses, &roster(), &reordered, &factors());

        assert_eq!(before.results, after.results);
        assert_eq!(after.results["t1"].factor_results[&2].total_points, 4);
    }

    #[test]
    fn response_without_enrollment_is_reported() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let responses = vec![response("s9", "t1", &[(1, 5)])];
        let aggregation = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());

        assert!(aggregation.results.is_empty());
        assert_eq!(aggregation.skipped.len(), 1);
        assert_eq!(aggregation.skipped[0].reason, SkipReason::NoEnrollment);
    }

    #[test]
    fn untagged_response_resolves_period_through_enrollment() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let mut record = response("s3", "t1", &[(1, 5)]);
        record.period_id = None;

        let current = aggregate_period("2024-1", &[record.clone()], &roster(), &questions, &factors());
        assert!(current.results.is_empty());
        assert!(current.skipped.is_empty());

        let earlier = aggregate_period("2023-2", &[record], &roster(), &questions, &factors());
        assert_eq!(earlier.results["t1"].total_points, 4);
    }

    #[test]
    fn untagged_response_counts_in_one_period_only() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let mut roster = roster();
        roster.enrollments.insert(
            0,
            Enrollment {
                student_id: "s1".to_string(),
                course_id: "c1".to_string(),
                teacher_id: "t1".to_string(),
                group: "1".to_string(),
                period: "2023-2".to_string(),
            },
        );
        let mut record = response("s1", "t1", &[(1, 5)]);
        record.period_id = None;

        let earlier = aggregate_period("2023-2", &[record.clone()], &roster, &questions, &factors());
        let current = aggregate_period("2024-1", &[record], &roster, &questions, &factors());

        assert_eq!(earlier.results["t1"].total_points, 4);
        assert!(current.results.is_empty());
        assert!(current.skipped.is_empty());
    }

    #[test]
    fn untagged_response_without_any_enrollment_is_reported() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let mut record = response("s9", "t1", &[(1, 5)]);
        record.period_id = None;
        let aggregation = aggregate_period("2024-1", &[record], &roster(), &questions, &factors());

        assert!(aggregation.results.is_empty());
        assert_eq!(aggregation.skipped[0].reason, SkipReason::NoEnrollment);
    }

    #[test]
    fn response_tagged_with_other_period_is_not_counted() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let mut record = response("s1", "t1", &[(1, 5)]);
        record.period_id = Some("2023-2".to_string());
        let aggregation = aggregate_period("2024-1", &[record], &roster(), &questions, &factors());

        assert!(aggregation.results.is_empty());
        assert!(aggregation.skipped.is_empty());
    }

    #[test]
    fn teacher_missing_from_roster_is_dropped_and_reported() {
        let questions = vec![question(1, 1, AnswerType::Binary)];
        let responses = vec![
            response("s1", "ghost", &[(1, 5)]),
            response("s1", "t1", &[(1, 1)]),
        ];
        let aggregation = aggregate_period("2024-1", &responses, &roster(), &questions, &factors());

        assert_eq!(aggregation.results.len(), 1);
        assert_eq!(aggregation.results["t1"].total_points, 2);
        assert_eq!(aggregation.skipped.len(), 1);
        assert_eq!(aggregation.skipped[0].teacher_id, "ghost");
        assert_eq!(aggregation.skipped[0].reason, SkipReason::UnknownTeacher);
    }

    #[test]
    fn bad_answers_are_skipped_without_losing_the_rest() {
        let questions = vec![
            question(1, 1, AnswerType::Binary),
            question(2, 1, AnswerType::Unrecognized("likert7".to_string())),
            question(3, 9, AnswerType::Binary),
            question(4, 2, AnswerType::Rating),
        ];
        let mut record = response("s1", "t1", &[(1, 5), (2, 5), (3, 5), (7, 5)]);
        record
            .answers
            .insert(4, Answer::Text("very high".to_string()));
        let aggregation = aggregate_period("2024-1", &[record], &roster(), &questions, &factors());

        let result = &aggregation.results["t1"];
        assert_eq!(result.total_points, 4);
        assert_eq!(result.max_points, 4);

        let reasons: Vec<SkipReason> = aggregation
            .skipped
            .iter()
            .map(|record| record.reason.clone())
            .collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::UnknownAnswerType {
                    question_id: 2,
                    answer_type: "likert7".to_string(),
                },
                SkipReason::UnknownFactor {
                    question_id: 3,
                    factor_id: 9,
                },
                SkipReason::NonNumericAnswer { question_id: 4 },
                SkipReason::UnknownQuestion(7),
            ]
        );
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(scaled_average(1, 3), 1.67);
        assert_eq!(scaled_average(2, 3), 3.33);
        assert_eq!(scaled_average(0, 0), 0.0);
        assert_eq!(format_average(scaled_average(0, 0)), "0.00");
    }
}
