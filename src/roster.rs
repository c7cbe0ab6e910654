use std::collections::HashSet;

use serde::Serialize;

use crate::models::{
    Course, Enrollment, EnrollmentKey, ImportRow, ImportStats, Period, ResponseRecord, Student,
    Teacher,
};

/// Group assigned to a course or enrollment when the export leaves it blank.
pub const DEFAULT_GROUP: &str = "1";

/// The canonical entity sets built up by schedule imports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub courses: Vec<Course>,
    pub periods: Vec<Period>,
    pub enrollments: Vec<Enrollment>,
}

/// A student's enrollment in one period, as shown on the student portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEvaluation {
    pub course_id: String,
    pub teacher_id: String,
    pub course_name: String,
    pub teacher_name: String,
    pub group: String,
    pub evaluated: bool,
}

/// Merges `rows` into a copy of `current`, leaving `current` untouched.
pub fn reconcile(rows: &[ImportRow], current: &Roster) -> (Roster, ImportStats) {
    let mut roster = current.clone();
    let stats = roster.merge(rows);
    (roster, stats)
}

fn placeholder_email(id: &str) -> String {
    format!("{id}@example.com")
}

impl Roster {
    /// Adds every student, teacher, course, period and enrollment in `rows`
    /// that is not already known. Existing records are never modified.
    ///
    /// Students, teachers and courses need both an id and a name to be
    /// registered. An enrollment needs the student, course, teacher and
    /// period ids, and is keyed on exactly those four; the group is ignored
    /// for deduplication. Rows missing some fields still contribute the
    /// records they do carry.
    pub fn merge(&mut self, rows: &[ImportRow]) -> ImportStats {
        let mut student_ids: HashSet<String> =
            self.students.iter().map(|student| student.id.clone()).collect();
        let mut teacher_ids: HashSet<String> =
            self.teachers.iter().map(|teacher| teacher.id.clone()).collect();
        let mut course_ids: HashSet<String> =
            self.courses.iter().map(|course| course.id.clone()).collect();
        let mut period_ids: HashSet<String> =
            self.periods.iter().map(|period| period.id.clone()).collect();
        let mut enrollment_keys: HashSet<EnrollmentKey> =
            self.enrollments.iter().map(Enrollment::key).collect();

        let mut stats = ImportStats::default();

        for row in rows {
            if let (Some(id), Some(name)) = (&row.student_id, &row.student_name) {
                if student_ids.insert(id.clone()) {
                    self.students.push(Student {
                        id: id.clone(),
                        name: name.clone(),
                        email: row
                            .student_email
                            .clone()
                            .unwrap_or_else(|| placeholder_email(id)),
                    });
                    stats.students_count += 1;
                }
            }

            if let (Some(id), Some(name)) = (&row.teacher_id, &row.teacher_name) {
                if teacher_ids.insert(id.clone()) {
                    self.teachers.push(Teacher {
                        id: id.clone(),
                        name: name.clone(),
                        email: row
                            .teacher_email
                            .clone()
                            .unwrap_or_else(|| placeholder_email(id)),
                    });
                    stats.teachers_count += 1;
                }
            }

            let group = row
                .group
                .clone()
                .unwrap_or_else(|| DEFAULT_GROUP.to_string());

            if let (Some(id), Some(name)) = (&row.course_id, &row.course_name) {
                if course_ids.insert(id.clone()) {
                    self.courses.push(Course {
                        id: id.clone(),
                        name: name.clone(),
                        group: group.clone(),
                    });
                    stats.courses_count += 1;
                }
            }

            if let Some(id) = &row.period_id {
                if period_ids.insert(id.clone()) {
                    self.periods.push(Period {
                        id: id.clone(),
                        name: id.clone(),
                    });
                    stats.periods_count += 1;
                }
            }

            if let (Some(student_id), Some(course_id), Some(teacher_id), Some(period)) = (
                &row.student_id,
                &row.course_id,
                &row.teacher_id,
                &row.period_id,
            ) {
                let enrollment = Enrollment {
                    student_id: student_id.clone(),
                    course_id: course_id.clone(),
                    teacher_id: teacher_id.clone(),
                    group,
                    period: period.clone(),
                };
                if enrollment_keys.insert(enrollment.key()) {
                    self.enrollments.push(enrollment);
                    stats.relations_count += 1;
                }
            }
        }

        tracing::info!(
            rows = rows.len(),
            students = stats.students_count,
            teachers = stats.teachers_count,
            courses = stats.courses_count,
            periods = stats.periods_count,
            enrollments = stats.relations_count,
            "merged schedule import"
        );

        stats
    }

    pub fn teacher(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|teacher| teacher.id == id)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    /// The period a response counts for: its own tag, or else the period of
    /// the first enrollment matching its student, course and teacher.
    pub fn response_period<'a>(&'a self, response: &'a ResponseRecord) -> Option<&'a str> {
        if let Some(tagged) = response.period_id.as_deref() {
            return Some(tagged);
        }
        self.enrollments
            .iter()
            .find(|enrollment| {
                enrollment.student_id == response.student_id
                    && enrollment.course_id == response.course_id
                    && enrollment.teacher_id == response.teacher_id
            })
            .map(|enrollment| enrollment.period.as_str())
    }

    /// Periods in which the student has at least one enrollment, in catalog order.
    pub fn student_periods(&self, student_id: &str) -> Vec<&Period> {
        let enrolled: HashSet<&str> = self
            .enrollments
            .iter()
            .filter(|enrollment| enrollment.student_id == student_id)
            .map(|enrollment| enrollment.period.as_str())
            .collect();

        self.periods
            .iter()
            .filter(|period| enrolled.contains(period.id.as_str()))
            .collect()
    }

    /// The student's enrollments in `period`, flagged with whether a response
    /// has already been submitted for each.
    pub fn student_courses(
        &self,
        student_id: &str,
        period: &str,
        responses: &[ResponseRecord],
    ) -> Vec<CourseEvaluation> {
        self.enrollments
            .iter()
            .filter(|enrollment| enrollment.student_id == student_id && enrollment.period == period)
            .map(|enrollment| {
                let evaluated = responses.iter().any(|response| {
                    response.student_id == student_id
                        && response.teacher_id == enrollment.teacher_id
                        && response.course_id == enrollment.course_id
                        && self.response_period(response) == Some(period)
                });

                CourseEvaluation {
                    course_id: enrollment.course_id.clone(),
                    teacher_id: enrollment.teacher_id.clone(),
                    course_name: self
                        .course(&enrollment.course_id)
                        .map_or_else(|| "Unknown Course".to_string(), |course| course.name.clone()),
                    teacher_name: self
                        .teacher(&enrollment.teacher_id)
                        .map_or_else(|| "Unknown Teacher".to_string(), |teacher| teacher.name.clone()),
                    group: enrollment.group.clone(),
                    evaluated,
                }
            })
            .collect()
    }
}
