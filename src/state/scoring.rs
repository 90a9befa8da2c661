//! Scoring engine: maps one answer (correctness + elapsed time) to points.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Points awarded for a correct answer, independent of timing.
pub const ACCURACY_POINTS: u32 = 100;
/// Countdown length of every question, in seconds.
pub const TIME_LIMIT_SECS: u64 = 30;
/// Bonus points per unused second of the countdown.
pub const TIME_BONUS_RATE: u32 = 10;
/// Highest score a single question can yield (`100 + 10 * 30`).
pub const MAX_QUESTION_SCORE: u32 = ACCURACY_POINTS + TIME_BONUS_RATE * TIME_LIMIT_SECS as u32;

/// Countdown length as a [`Duration`].
pub const TIME_LIMIT: Duration = Duration::from_secs(TIME_LIMIT_SECS);

/// Points earned on a single question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionScore {
    /// [`ACCURACY_POINTS`] when the answer was correct, otherwise zero.
    pub accuracy: u32,
    /// Reward proportional to the unused countdown time.
    pub time_bonus: u32,
}

impl QuestionScore {
    /// Contribution of this question to the running score.
    pub fn total(&self) -> u32 {
        self.accuracy + self.time_bonus
    }

    /// Whether the question was answered correctly.
    pub fn is_correct(&self) -> bool {
        self.accuracy > 0
    }
}

/// Score one question.
///
/// An incorrect answer still earns the time bonus; only a timeout (see
/// [`timeout_score`]) yields nothing. Negative elapsed times count as an instant
/// answer and non-finite ones as a full countdown.
pub fn score_question(is_correct: bool, time_spent_secs: f64) -> QuestionScore {
    let limit = TIME_LIMIT_SECS as f64;
    let time_spent = if time_spent_secs.is_finite() {
        time_spent_secs.max(0.0)
    } else {
        limit
    };
    let time_remaining = (limit - time_spent).max(0.0);
    let time_bonus = (time_remaining * f64::from(TIME_BONUS_RATE)).floor() as u32;

    QuestionScore {
        accuracy: if is_correct { ACCURACY_POINTS } else { 0 },
        time_bonus,
    }
}

/// Score of a question whose countdown ran out before an answer was chosen.
pub fn timeout_score() -> QuestionScore {
    score_question(false, TIME_LIMIT_SECS as f64)
}

/// Sum of `accuracy + time_bonus` across questions.
pub fn total_score(scores: &[QuestionScore]) -> u32 {
    scores.iter().map(QuestionScore::total).sum()
}

/// Share of the maximum attainable score, in percent (0 when there are no questions).
pub fn percentage(total: u32, question_count: usize) -> f64 {
    if question_count == 0 {
        return 0.0;
    }
    let max = f64::from(MAX_QUESTION_SCORE) * question_count as f64;
    (f64::from(total) / max * 100.0).min(100.0)
}

/// Coarse end-of-quiz rating shown alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Performance {
    /// At least 80 % of the maximum score.
    Master,
    /// At least 60 % of the maximum score.
    Good,
    /// Anything below.
    KeepPracticing,
}

impl Performance {
    /// Rate a finished run.
    pub fn rate(total: u32, question_count: usize) -> Self {
        let pct = percentage(total, question_count);
        if pct >= 80.0 {
            Performance::Master
        } else if pct >= 60.0 {
            Performance::Good
        } else {
            Performance::KeepPracticing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answer_after_five_seconds() {
        let score = score_question(true, 5.0);
        assert_eq!(
            score,
            QuestionScore {
                accuracy: 100,
                time_bonus: 250
            }
        );
        assert_eq!(score.total(), 350);
    }

    #[test]
    fn incorrect_answer_keeps_time_bonus() {
        let score = score_question(false, 10.0);
        assert_eq!(score.accuracy, 0);
        assert_eq!(score.time_bonus, 200);
    }

    #[test]
    fn fractional_time_is_floored() {
        assert_eq!(score_question(true, 5.55).time_bonus, 244);
        assert_eq!(score_question(true, 29.99).time_bonus, 0);
    }

    #[test]
    fn bonus_within_limit_matches_formula() {
        for tenths in 0..=300u32 {
            let spent = f64::from(tenths) / 10.0;
            for correct in [true, false] {
                let score = score_question(correct, spent);
                assert!(score.accuracy == 0 || score.accuracy == 100);
                let expected = ((30.0 - spent) * 10.0).floor() as u32;
                assert_eq!(score.time_bonus, expected, "spent {spent}");
            }
        }
    }

    #[test]
    fn overtime_is_clamped_to_zero() {
        assert_eq!(score_question(true, 31.0).time_bonus, 0);
        assert_eq!(score_question(true, 1_000.0).time_bonus, 0);
        assert_eq!(score_question(true, f64::NAN).time_bonus, 0);
    }

    #[test]
    fn negative_time_counts_as_instant() {
        assert_eq!(score_question(true, -3.0).time_bonus, 300);
    }

    #[test]
    fn timeout_scores_nothing() {
        assert_eq!(timeout_score(), QuestionScore::default());
    }

    #[test]
    fn max_score_and_rating() {
        assert_eq!(MAX_QUESTION_SCORE, 400);
        assert_eq!(percentage(2_000, 5), 100.0);
        assert_eq!(Performance::rate(1_600, 5), Performance::Master);
        assert_eq!(Performance::rate(1_200, 5), Performance::Good);
        assert_eq!(Performance::rate(350, 5), Performance::KeepPracticing);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
