use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub id: u32,
    pub name: String,
}

/// Answer scale of a question.
///
/// Persisted as a string. Legacy lowercase names are accepted on read, and a
/// name that matches no scale is kept verbatim as `Unrecognized` so that the
/// rubric can reject it per question instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnswerType {
    Binary,
    Frequency,
    FrequencyOrNa,
    Rating,
    Open,
    Unrecognized(String),
}

impl AnswerType {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "BINARY" | "binaria" => AnswerType::Binary,
            "FREQUENCY" | "frecuencia" => AnswerType::Frequency,
            "FREQUENCY_OR_NA" | "frecuencia_na" => AnswerType::FrequencyOrNa,
            "RATING" | "valoracion" => AnswerType::Rating,
            "OPEN" | "abierta" => AnswerType::Open,
            other => AnswerType::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AnswerType::Binary => "BINARY",
            AnswerType::Frequency => "FREQUENCY",
            AnswerType::FrequencyOrNa => "FREQUENCY_OR_NA",
            AnswerType::Rating => "RATING",
            AnswerType::Open => "OPEN",
            AnswerType::Unrecognized(value) => value,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AnswerType::Open)
    }
}

impl From<String> for AnswerType {
    fn from(value: String) -> Self {
        AnswerType::parse(&value)
    }
}

impl From<AnswerType> for String {
    fn from(value: AnswerType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub factor_id: u32,
    pub answer_type: AnswerType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub group: String,
    pub period: String,
}

impl Enrollment {
    pub fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            student_id: self.student_id.clone(),
            course_id: self.course_id.clone(),
            teacher_id: self.teacher_id.clone(),
            period: self.period.clone(),
        }
    }
}

/// Composite identity of an enrollment. The group is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnrollmentKey {
    pub student_id: String,
    pub course_id: String,
    pub teacher_id: String,
    pub period: String,
}

/// A single answer as captured by the survey form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Code(i64),
    Text(String),
}

/// One submitted evaluation of a teacher for a course.
///
/// Answers are keyed by question id. A record without `period_id` is
/// attributed to a period only through its matching enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub student_id: String,
    pub teacher_id: String,
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_id: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<u32, Answer>,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn new(
        student_id: impl Into<String>,
        teacher_id: impl Into<String>,
        course_id: impl Into<String>,
        period_id: Option<String>,
        answers: BTreeMap<u32, Answer>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            teacher_id: teacher_id.into(),
            course_id: course_id.into(),
            period_id,
            answers,
            submitted_at: Utc::now(),
        }
    }

    /// Binds a form's positional answers to the questions it displayed.
    ///
    /// Answers past the end of `questions` have no question to belong to and
    /// are dropped; questions past the end of `answers` stay unanswered.
    pub fn bind_positional(
        student_id: impl Into<String>,
        teacher_id: impl Into<String>,
        course_id: impl Into<String>,
        period_id: Option<String>,
        answers: Vec<Answer>,
        questions: &[Question],
    ) -> Self {
        let answers = questions
            .iter()
            .zip(answers)
            .map(|(question, answer)| (question.id, answer))
            .collect();
        Self::new(student_id, teacher_id, course_id, period_id, answers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorResult {
    pub factor_id: u32,
    pub name: String,
    pub total_points: u32,
    pub max_points: u32,
    /// 0 to 5, two decimals.
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPeriodResult {
    pub teacher_id: String,
    pub name: String,
    pub factor_results: BTreeMap<u32, FactorResult>,
    pub total_points: u32,
    pub max_points: u32,
    pub overall_average: f64,
    pub response_count: usize,
    pub period: String,
}

/// Per-teacher results of one period, as frozen by a publish.
pub type PeriodSnapshot = BTreeMap<String, TeacherPeriodResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodState {
    pub evaluation_open: bool,
    pub published: bool,
}

impl PeriodState {
    pub fn publication(&self) -> PublicationStatus {
        if self.published {
            PublicationStatus::Published
        } else {
            PublicationStatus::Draft
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    Draft,
    Published,
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationStatus::Draft => f.write_str("draft"),
            PublicationStatus::Published => f.write_str("published"),
        }
    }
}

/// One flat row of an academic schedule export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub teacher_email: Option<String>,
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub group: Option<String>,
    pub period_id: Option<String>,
}

impl ImportRow {
    pub const STUDENT_ID: &'static str = "DOCUMENTO";
    pub const STUDENT_NAME: &'static str = "NOMBRE_ESTUDIANTE";
    pub const STUDENT_EMAIL: &'static str = "EMAIL";
    pub const TEACHER_ID: &'static str = "DOC_DOCENTE_PPAL";
    pub const TEACHER_NAME: &'static str = "NOMBRE_DOCENTE_PRINCIPAL";
    pub const TEACHER_EMAIL: &'static str = "EMAIL_DOCENTE_PRINCIPAL";
    pub const COURSE_ID: &'static str = "ID_ASIGNATURA";
    pub const COURSE_NAME: &'static str = "ASIGNATURA";
    pub const GROUP: &'static str = "ID_GRUPO_ACTIVIDAD";
    pub const PERIOD: &'static str = "PERIODO";

    /// Builds a row from column name to cell text. Blank cells count as absent.
    pub fn from_cells(cells: &HashMap<String, String>) -> Self {
        let cell = |column: &str| {
            cells
                .get(column)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            student_id: cell(Self::STUDENT_ID),
            student_name: cell(Self::STUDENT_NAME),
            student_email: cell(Self::STUDENT_EMAIL),
            teacher_id: cell(Self::TEACHER_ID),
            teacher_name: cell(Self::TEACHER_NAME),
            teacher_email: cell(Self::TEACHER_EMAIL),
            course_id: cell(Self::COURSE_ID),
            course_name: cell(Self::COURSE_NAME),
            group: cell(Self::GROUP),
            period_id: cell(Self::PERIOD),
        }
    }
}

/// Counts of records an import added to the canonical sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub students_count: usize,
    pub teachers_count: usize,
    pub courses_count: usize,
    pub periods_count: usize,
    pub relations_count: usize,
}

impl ImportStats {
    pub fn is_empty(&self) -> bool {
        *self == ImportStats::default()
    }
}

/// Why a response, or one answer of it, did not count toward a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoEnrollment,
    UnknownTeacher,
    UnknownQuestion(u32),
    UnknownFactor { question_id: u32, factor_id: u32 },
    UnknownAnswerType { question_id: u32, answer_type: String },
    NonNumericAnswer { question_id: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoEnrollment => f.write_str("no matching enrollment"),
            SkipReason::UnknownTeacher => f.write_str("teacher not in roster"),
            SkipReason::UnknownQuestion(id) => write!(f, "question {id} not in catalog"),
            SkipReason::UnknownFactor {
                question_id,
                factor_id,
            } => write!(f, "question {question_id} refers to unknown factor {factor_id}"),
            SkipReason::UnknownAnswerType {
                question_id,
                answer_type,
            } => write!(f, "question {question_id} has unknown answer type {answer_type}"),
            SkipReason::NonNumericAnswer { question_id } => {
                write!(f, "question {question_id} expects a numeric answer")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub response_id: Uuid,
    pub student_id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub reason: SkipReason,
}
