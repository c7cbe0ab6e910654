//! Survey catalog a fresh installation starts from.

use crate::models::{AnswerType, Factor, Question};
use crate::state::EvaluationState;

pub const DEFAULT_WEIGHT: u32 = 10;

pub fn default_factors() -> Vec<Factor> {
    (1..=3)
        .map(|id| Factor {
            id,
            name: format!("Factor {id}"),
        })
        .collect()
}

fn question(id: u32, text: &str, factor_id: u32, answer_type: AnswerType) -> Question {
    Question {
        id,
        text: text.to_string(),
        factor_id,
        answer_type,
    }
}

pub fn default_questions() -> Vec<Question> {
    vec![
        question(1, "Would you gladly enrol in another course with this teacher?", 1, AnswerType::Binary),
        question(2, "Did the teacher encourage argumentation or critical reflection?", 1, AnswerType::Binary),
        question(3, "Did the teacher help you acquire tools for independent learning?", 1, AnswerType::Binary),
        question(4, "Did you learn the course topics thoroughly and in depth with this teacher?", 1, AnswerType::Binary),
        question(5, "Did the teacher prepare each session or activity properly?", 2, AnswerType::Frequency),
        question(6, "Did the teacher make an effort for you to learn?", 2, AnswerType::Frequency),
        question(7, "Did the teacher inspire or motivate your interest in the topics?", 2, AnswerType::Binary),
        question(8, "Did the teacher help you connect the topics with other contexts or courses in your programme?", 2, AnswerType::Binary),
        question(9, "Did the teacher show enjoyment and enthusiasm for teaching?", 3, AnswerType::Frequency),
        question(10, "Did the teacher respect the agreed rules and dates, including those of assessments?", 3, AnswerType::Frequency),
        question(11, "Did the teacher set aside enough time to advise you and answer questions?", 3, AnswerType::FrequencyOrNa),
        question(12, "Was the teacher respectful towards you and tolerant of your views?", 3, AnswerType::Frequency),
        question(13, "Was the teacher fair and impartial during the course?", 3, AnswerType::Frequency),
        question(14, "Did the teacher adapt the teaching methods to the students' needs?", 3, AnswerType::Frequency),
        question(15, "Did the teacher's assessments help you improve your learning?", 3, AnswerType::Frequency),
        question(16, "Did the assessment results reflect your learning fairly?", 3, AnswerType::Binary),
        question(17, "Overall, this teacher's performance was:", 1, AnswerType::Rating),
        question(18, "Which strengths of the teacher's performance would you highlight?", 3, AnswerType::Open),
    ]
}

/// An empty roster with the default factors, questions and weights.
pub fn default_state() -> EvaluationState {
    let questions = default_questions();
    EvaluationState {
        question_weights: vec![DEFAULT_WEIGHT; questions.len()],
        questions,
        factors: default_factors(),
        ..EvaluationState::default()
    }
}

/// Fills in whichever of questions, weights and factors are still empty.
/// Returns whether anything changed.
pub fn seed(state: &mut EvaluationState) -> bool {
    let mut changed = false;
    if state.factors.is_empty() {
        state.factors = default_factors();
        changed = true;
    }
    if state.questions.is_empty() {
        state.questions = default_questions();
        changed = true;
    }
    if state.question_weights.is_empty() {
        state.question_weights = vec![DEFAULT_WEIGHT; state.questions.len()];
        changed = true;
    }
    changed
}
