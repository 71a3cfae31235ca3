// src/engine/difficulty.rs

use crate::models::session::Difficulty;

/// Computes the difficulty for the next question from the current level and
/// the live streaks. Moves one level per call, saturating at the ends.
///
/// The decrease check runs first: should both thresholds ever hold at once,
/// the level steps down.
pub fn next_difficulty(
    current: Difficulty,
    correct_streak: u32,
    incorrect_streak: u32,
    increase_threshold: u32,
    decrease_threshold: u32,
) -> Difficulty {
    if incorrect_streak >= decrease_threshold {
        return current.step_down();
    }
    if correct_streak >= increase_threshold {
        return current.step_up();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_correct_answers_step_up_from_easy() {
        assert_eq!(
            next_difficulty(Difficulty::Easy, 3, 0, 3, 2),
            Difficulty::Medium
        );
    }

    #[test]
    fn below_threshold_keeps_the_level() {
        assert_eq!(
            next_difficulty(Difficulty::Medium, 2, 0, 3, 2),
            Difficulty::Medium
        );
        assert_eq!(
            next_difficulty(Difficulty::Medium, 0, 1, 3, 2),
            Difficulty::Medium
        );
    }

    #[test]
    fn two_incorrect_answers_step_down() {
        assert_eq!(
            next_difficulty(Difficulty::Hard, 0, 2, 3, 2),
            Difficulty::Medium
        );
    }

    #[test]
    fn saturates_at_both_ends() {
        assert_eq!(next_difficulty(Difficulty::Hard, 5, 0, 3, 2), Difficulty::Hard);
        assert_eq!(next_difficulty(Difficulty::Easy, 0, 9, 3, 2), Difficulty::Easy);
    }

    #[test]
    fn decrease_wins_when_both_thresholds_hold() {
        assert_eq!(
            next_difficulty(Difficulty::Medium, 3, 2, 3, 2),
            Difficulty::Easy
        );
    }

    #[test]
    fn moves_one_level_at_a_time() {
        assert_eq!(
            next_difficulty(Difficulty::Easy, 30, 0, 3, 2),
            Difficulty::Medium
        );
    }
}
