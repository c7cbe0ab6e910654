use crate::error::EvaluationError;
use crate::models::AnswerType;

/// Points awarded for a scored answer. Every scored scale tops out at 4.
pub const MAX_POINTS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Points {
    pub points: u32,
    pub max_points: u32,
}

/// Converts a raw answer code into points on the question's scale.
///
/// The scales are fixed lookups, not linear: codes that are not listed for a
/// scale score 0 out of 4. Open questions score 0 out of 0.
pub fn score(answer_type: &AnswerType, code: i64) -> Result<Points, EvaluationError> {
    let points = match answer_type {
        AnswerType::Binary => match code {
            5 => 4,
            1 => 2,
            _ => 0,
        },
        AnswerType::Frequency | AnswerType::FrequencyOrNa => match code {
            5 => 4,
            3 => 3,
            2 => 1,
            _ => 0,
        },
        AnswerType::Rating => match code {
            5 => 4,
            4 => 3,
            2 => 1,
            _ => 0,
        },
        AnswerType::Open => return Ok(Points::default()),
        AnswerType::Unrecognized(name) => {
            return Err(EvaluationError::UnknownAnswerType(name.clone()))
        }
    };

    Ok(Points {
        points,
        max_points: MAX_POINTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(answer_type: AnswerType, code: i64) -> u32 {
        let scored = score(&answer_type, code).unwrap();
        assert_eq!(scored.max_points, MAX_POINTS);
        scored.points
    }

    #[test]
    fn binary_scale_matches_table() {
        let table = [(0, 0), (1, 2), (2, 0), (3, 0), (4, 0), (5, 4), (6, 0), (-1, 0)];
        for (code, expected) in table {
            assert_eq!(points(AnswerType::Binary, code), expected, "code {code}");
        }
    }

    #[test]
    fn frequency_scales_match_table() {
        let table = [(0, 0), (1, 0), (2, 1), (3, 3), (4, 0), (5, 4), (9, 0)];
        for (code, expected) in table {
            assert_eq!(points(AnswerType::Frequency, code), expected, "code {code}");
            assert_eq!(points(AnswerType::FrequencyOrNa, code), expected, "code {code}");
        }
    }

    #[test]
    fn rating_scale_is_asymmetric() {
        let table = [(0, 0), (1, 0), (2, 1), (3, 0), (4, 3), (5, 4), (7, 0)];
        for (code, expected) in table {
            assert_eq!(points(AnswerType::Rating, code), expected, "code {code}");
        }
    }

    #[test]
    fn open_questions_carry_no_points() {
        assert_eq!(score(&AnswerType::Open, 5).unwrap(), Points::default());
    }

    #[test]
    fn unrecognized_scale_is_rejected() {
        let err = score(&AnswerType::Unrecognized("likert7".to_string()), 5).unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownAnswerType(ref name) if name == "likert7"));
    }
}
