use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::EvaluationError;
use crate::models::{Answer, ImportRow, Question, ResponseRecord};
use crate::state::EvaluationState;
use crate::store::StateStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store: one JSONB row per state key plus a revision row.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStore {
    async fn load(&self) -> Result<EvaluationState, EvaluationError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let revision: i64 = sqlx::query("SELECT revision FROM faculty_evaluation.revision WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?
            .try_get("revision")?;

        let rows = sqlx::query("SELECT key, value FROM faculty_evaluation.state")
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let Json(value): Json<Value> = row.try_get("value")?;
            entries.insert(key, value);
        }

        tracing::debug!(revision, keys = entries.len(), "loaded state");
        EvaluationState::from_entries(entries, revision)
    }

    async fn save(&self, state: &mut EvaluationState) -> Result<(), EvaluationError> {
        let entries = state.to_entries()?;
        let mut tx = self.pool.begin().await?;

        let advanced = sqlx::query(
            r#"
            UPDATE faculty_evaluation.revision
            SET revision = revision + 1
            WHERE id = 1 AND revision = $1
            RETURNING revision
            "#,
        )
        .bind(state.revision())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(advanced) = advanced else {
            let found: i64 =
                sqlx::query("SELECT revision FROM faculty_evaluation.revision WHERE id = 1")
                    .fetch_one(&mut *tx)
                    .await?
                    .try_get("revision")?;
            return Err(EvaluationError::StaleState {
                expected: state.revision(),
                found,
            });
        };
        let revision: i64 = advanced.try_get("revision")?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO faculty_evaluation.state (key, value, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(key)
            .bind(Json(value))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        state.revision = revision;
        tracing::debug!(revision, "saved state");
        Ok(())
    }
}

/// Reads a schedule export. `.json` files hold an array of row objects;
/// anything else is read as CSV with a header row.
pub fn read_import_file(path: &Path) -> anyhow::Result<Vec<ImportRow>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let objects: Vec<serde_json::Map<String, Value>> = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array of rows", path.display()))?;

        return Ok(objects
            .iter()
            .map(|object| {
                let cells: HashMap<String, String> = object
                    .iter()
                    .filter_map(|(column, value)| json_cell(value).map(|cell| (column.clone(), cell)))
                    .collect();
                ImportRow::from_cells(&cells)
            })
            .collect());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();

    for result in reader.deserialize::<HashMap<String, String>>() {
        let cells = result.with_context(|| format!("malformed CSV in {}", path.display()))?;
        rows.push(ImportRow::from_cells(&cells));
    }

    Ok(rows)
}

/// Renders a JSON cell as identifier text. Whole numbers lose any `.0`
/// spreadsheets add; nulls, arrays and objects count as blank.
fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Some(int.to_string())
            } else if let Some(int) = number.as_u64() {
                Some(int.to_string())
            } else {
                number.as_f64().map(|float| {
                    if float.fract() == 0.0 && float.abs() < 1e15 {
                        format!("{}", float as i64)
                    } else {
                        float.to_string()
                    }
                })
            }
        }
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A response as produced by the survey form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub student_id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub period_id: String,
    pub answers: SubmittedAnswers,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswers {
    /// Keyed by question id.
    ById(BTreeMap<String, Answer>),
    /// In the order the form displayed the questions.
    Positional(Vec<Answer>),
}

impl Submission {
    /// Turns the submission into a stored record, binding positional
    /// answers to `questions` as they stand now.
    pub fn into_record(self, questions: &[Question]) -> anyhow::Result<ResponseRecord> {
        let period = Some(self.period_id);
        match self.answers {
            SubmittedAnswers::ById(answers) => {
                let answers = answers
                    .into_iter()
                    .map(|(id, answer)| {
                        id.trim()
                            .parse::<u32>()
                            .map(|id| (id, answer))
                            .with_context(|| format!("invalid question id {id:?}"))
                    })
                    .collect::<anyhow::Result<BTreeMap<u32, Answer>>>()?;
                Ok(ResponseRecord::new(
                    self.student_id,
                    self.teacher_id,
                    self.course_id,
                    period,
                    answers,
                ))
            }
            SubmittedAnswers::Positional(answers) => Ok(ResponseRecord::bind_positional(
                self.student_id,
                self.teacher_id,
                self.course_id,
                period,
                answers,
                questions,
            )),
        }
    }
}

pub fn read_submission(path: &Path) -> anyhow::Result<Submission> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid submission", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::catalog;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_rows_keep_identifiers_verbatim() {
        let file = write_temp(
            ".csv",
            "DOCUMENTO,NOMBRE_ESTUDIANTE,EMAIL,DOC_DOCENTE_PPAL,NOMBRE_DOCENTE_PRINCIPAL,EMAIL_DOCENTE_PRINCIPAL,ID_ASIGNATURA,ASIGNATURA,ID_GRUPO_ACTIVIDAD,PERIODO\n\
             0012345,Lina Ortiz,lortiz@uni.edu,51709551,Ada Ruiz,,1000009-M,Biology,,2024-1\n",
        );
        let rows = read_import_file(file.path()).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.student_id.as_deref(), Some("0012345"));
        assert_eq!(row.course_id.as_deref(), Some("1000009-M"));
        assert_eq!(row.teacher_email, None);
        assert_eq!(row.group, None);
        assert_eq!(row.period_id.as_deref(), Some("2024-1"));
    }

    #[test]
    fn json_rows_coerce_numbers_to_text() {
        let file = write_temp(
            ".json",
            r#"[
                {"DOCUMENTO": 1016592846, "NOMBRE_ESTUDIANTE": "Lina Ortiz",
                 "DOC_DOCENTE_PPAL": 40987816.0, "NOMBRE_DOCENTE_PRINCIPAL": "Ada Ruiz",
                 "ID_ASIGNATURA": "8000150", "ASIGNATURA": "Caribbean Studies",
                 "ID_GRUPO_ACTIVIDAD": 2, "PERIODO": "2024-1"},
                {"DOCUMENTO": null, "PERIODO": ""}
            ]"#,
        );
        let rows = read_import_file(file.path()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_id.as_deref(), Some("1016592846"));
        assert_eq!(rows[0].teacher_id.as_deref(), Some("40987816"));
        assert_eq!(rows[0].group.as_deref(), Some("2"));
        assert_eq!(rows[1], ImportRow::default());
    }

    #[test]
    fn json_file_must_hold_an_array() {
        let file = write_temp(".json", r#"{"DOCUMENTO": "1"}"#);
        assert!(read_import_file(file.path()).is_err());
    }

    #[test]
    fn submission_by_id_keeps_question_ids() {
        let submission: Submission = serde_json::from_str(
            r#"{"studentId": "s1", "teacherId": "t1", "courseId": "c1", "periodId": "2024-1",
                "answers": {"17": 4, "18": "clear and patient"}}"#,
        )
        .unwrap();
        let record = submission.into_record(&catalog::default_questions()).unwrap();

        assert_eq!(record.period_id.as_deref(), Some("2024-1"));
        assert_eq!(record.answers[&17], Answer::Code(4));
        assert_eq!(
            record.answers[&18],
            Answer::Text("clear and patient".to_string())
        );
    }

    #[test]
    fn positional_submission_binds_to_current_questions() {
        let submission: Submission = serde_json::from_str(
            r#"{"studentId": "s1", "teacherId": "t1", "courseId": "c1", "periodId": "2024-1",
                "answers": [5, 1, 3]}"#,
        )
        .unwrap();
        let questions = catalog::default_questions();
        let record = submission.into_record(&questions[2..]).unwrap();

        let ids: Vec<u32> = record.answers.keys().copied().collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn submission_with_bad_question_id_is_rejected() {
        let submission: Submission = serde_json::from_str(
            r#"{"studentId": "s1", "teacherId": "t1", "courseId": "c1", "periodId": "2024-1",
                "answers": {"first": 5}}"#,
        )
        .unwrap();
        assert!(submission.into_record(&[]).is_err());
    }
}
