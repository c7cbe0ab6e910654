//! The complete persisted state of the evaluation system.
//!
//! Every field is stored under its own key so that stores can persist and
//! load the keys independently. A key missing from a store loads as empty.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::EvaluationError;
use crate::models::{Factor, ImportRow, ImportStats, PeriodSnapshot, Question, ResponseRecord};
use crate::roster::Roster;

pub const EVALUATION_OPEN: &str = "encuestaActiva";
pub const RESULTS_PUBLISHED: &str = "resultsPublished";
pub const RESULTS: &str = "results";
pub const QUESTIONS: &str = "questions";
pub const QUESTION_WEIGHTS: &str = "questionWeights";
pub const FACTORS: &str = "factores";
pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";
pub const COURSES: &str = "courses";
pub const ENROLLMENTS: &str = "studentCourses";
pub const PERIODS: &str = "periods";
pub const CURRENT_PERIOD: &str = "currentPeriod";
pub const RESPONSES: &str = "responses";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationState {
    pub evaluation_open: BTreeMap<String, bool>,
    pub results_published: BTreeMap<String, bool>,
    pub results: BTreeMap<String, PeriodSnapshot>,
    pub questions: Vec<Question>,
    /// Per-question weights, aligned by index with `questions`. Editable and
    /// persisted, but scoring weighs every question equally.
    pub question_weights: Vec<u32>,
    pub factors: Vec<Factor>,
    pub roster: Roster,
    pub current_period: Option<String>,
    pub responses: Vec<ResponseRecord>,
    /// Store revision this state was loaded at. Not persisted as a key.
    pub(crate) revision: i64,
}

fn encode<T: Serialize>(key: &'static str, value: &T) -> Result<(&'static str, Value), EvaluationError> {
    let value = serde_json::to_value(value).map_err(|source| EvaluationError::Serialization {
        key: key.to_string(),
        source,
    })?;
    Ok((key, value))
}

fn decode<T: DeserializeOwned + Default>(
    entries: &mut HashMap<String, Value>,
    key: &str,
) -> Result<T, EvaluationError> {
    match entries.remove(key) {
        Some(value) => serde_json::from_value(value).map_err(|source| {
            EvaluationError::Serialization {
                key: key.to_string(),
                source,
            }
        }),
        None => Ok(T::default()),
    }
}

impl EvaluationState {
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Serializes each persisted key on its own.
    pub fn to_entries(&self) -> Result<Vec<(&'static str, Value)>, EvaluationError> {
        Ok(vec![
            encode(EVALUATION_OPEN, &self.evaluation_open)?,
            encode(RESULTS_PUBLISHED, &self.results_published)?,
            encode(RESULTS, &self.results)?,
            encode(QUESTIONS, &self.questions)?,
            encode(QUESTION_WEIGHTS, &self.question_weights)?,
            encode(FACTORS, &self.factors)?,
            encode(STUDENTS, &self.roster.students)?,
            encode(TEACHERS, &self.roster.teachers)?,
            encode(COURSES, &self.roster.courses)?,
            encode(ENROLLMENTS, &self.roster.enrollments)?,
            encode(PERIODS, &self.roster.periods)?,
            encode(CURRENT_PERIOD, &self.current_period)?,
            encode(RESPONSES, &self.responses)?,
        ])
    }

    /// Rebuilds a state from persisted keys. Unknown keys are ignored.
    pub fn from_entries(
        mut entries: HashMap<String, Value>,
        revision: i64,
    ) -> Result<Self, EvaluationError> {
        Ok(Self {
            evaluation_open: decode(&mut entries, EVALUATION_OPEN)?,
            results_published: decode(&mut entries, RESULTS_PUBLISHED)?,
            results: decode(&mut entries, RESULTS)?,
            questions: decode(&mut entries, QUESTIONS)?,
            question_weights: decode(&mut entries, QUESTION_WEIGHTS)?,
            factors: decode(&mut entries, FACTORS)?,
            roster: Roster {
                students: decode(&mut entries, STUDENTS)?,
                teachers: decode(&mut entries, TEACHERS)?,
                courses: decode(&mut entries, COURSES)?,
                periods: decode(&mut entries, PERIODS)?,
                enrollments: decode(&mut entries, ENROLLMENTS)?,
            },
            current_period: decode(&mut entries, CURRENT_PERIOD)?,
            responses: decode(&mut entries, RESPONSES)?,
            revision,
        })
    }

    /// Merges a schedule export into the roster.
    ///
    /// When no period is current yet, the first period the import introduced
    /// becomes current.
    pub fn import(&mut self, rows: &[ImportRow]) -> ImportStats {
        let known_periods = self.roster.periods.len();
        let stats = self.roster.merge(rows);

        if self.current_period.is_none() {
            if let Some(period) = self.roster.periods.get(known_periods) {
                tracing::info!(period = %period.id, "selected current period");
                self.current_period = Some(period.id.clone());
            }
        }

        stats
    }

    /// Appends a submitted response. Responses are never edited or removed.
    pub fn record_response(&mut self, response: ResponseRecord) {
        tracing::info!(
            response = %response.id,
            student = %response.student_id,
            teacher = %response.teacher_id,
            course = %response.course_id,
            answers = response.answers.len(),
            "recorded response"
        );
        self.responses.push(response);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{Answer, AnswerType};

    fn row(period: &str) -> ImportRow {
        ImportRow {
            student_id: Some("s1".to_string()),
            student_name: Some("Lina Ortiz".to_string()),
            teacher_id: Some("t1".to_string()),
            teacher_name: Some("Ada Ruiz".to_string()),
            course_id: Some("c1".to_string()),
            course_name: Some("Biology".to_string()),
            period_id: Some(period.to_string()),
            ..ImportRow::default()
        }
    }

    #[test]
    fn first_imported_period_becomes_current() {
        let mut state = EvaluationState::default();
        state.import(&[row("2024-1"), row("2024-2")]);
        assert_eq!(state.current_period.as_deref(), Some("2024-1"));

        state.import(&[row("2025-1")]);
        assert_eq!(state.current_period.as_deref(), Some("2024-1"));
    }

    #[test]
    fn entries_round_trip_through_json() {
        let mut state = EvaluationState::default();
        state.import(&[row("2024-1")]);
        state.questions.push(Question {
            id: 3,
            text: "Was the course well prepared?".to_string(),
            factor_id: 1,
            answer_type: AnswerType::Frequency,
        });
        state.question_weights.push(10);
        state.evaluation_open.insert("2024-1".to_string(), true);
        state.record_response(ResponseRecord::new(
            "s1",
            "t1",
            "c1",
            Some("2024-1".to_string()),
            BTreeMap::from([(3, Answer::Code(5)), (18, Answer::Text("great".to_string()))]),
        ));

        let entries: HashMap<String, Value> = state
            .to_entries()
            .unwrap()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        assert_eq!(entries[ENROLLMENTS][0]["studentId"], "s1");
        assert_eq!(entries[QUESTIONS][0]["answerType"], "FREQUENCY");

        let restored = EvaluationState::from_entries(entries, 7).unwrap();
        assert_eq!(restored.revision(), 7);
        assert_eq!(restored.roster, state.roster);
        assert_eq!(restored.responses, state.responses);
        assert_eq!(restored.evaluation_open, state.evaluation_open);
    }

    #[test]
    fn missing_keys_load_as_empty() {
        let entries = HashMap::from([(
            QUESTIONS.to_string(),
            serde_json::json!([
                {"id": 1, "text": "Would you enrol again?", "factorId": 1, "answerType": "binaria"}
            ]),
        )]);
        let state = EvaluationState::from_entries(entries, 0).unwrap();

        assert_eq!(state.questions[0].answer_type, AnswerType::Binary);
        assert!(state.roster.students.is_empty());
        assert!(state.current_period.is_none());
    }

    #[test]
    fn malformed_key_names_the_key() {
        let entries = HashMap::from([(PERIODS.to_string(), serde_json::json!("2024-1"))]);
        let err = EvaluationState::from_entries(entries, 0).unwrap_err();
        assert!(matches!(err, EvaluationError::Serialization { ref key, .. } if key == PERIODS));
    }
}
