//! Ebbinghaus scheduler.
//!
//! Pure, deterministic, no I/O. Stages 0-8 walk a fixed forgetting-curve
//! table; the only inputs are the current stage, whether the answer was
//! correct, and "now".

use chrono::{DateTime, Duration, Utc};

/// Stage 0 means "never entered the curve". Stage 8 means "mastered" (no
/// further review scheduled). Intervals line up 1:1 with stage index;
/// `INTERVALS[0]` is unused (stage 0 has no scheduled interval).
const INTERVALS: [Duration; 9] = [
    Duration::zero(),
    Duration::minutes(30),
    Duration::hours(12),
    Duration::days(1),
    Duration::days(2),
    Duration::days(4),
    Duration::days(7),
    Duration::days(15),
    Duration::zero(), // stage 8: mastered, interval is infinite (None)
];

pub const MAX_STAGE: u8 = 8;
pub const MASTERED_STAGE: u8 = 8;

/// Outcome of advancing a record through the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: u8,
    pub next_review_time: Option<DateTime<Utc>>,
}

/// `next(stage, correct) -> (stage', next_time?)`.
///
/// - Wrong: always resets to stage 1, due in 30 minutes.
/// - Correct at stage >= 1: advances one stage (capped at 8); stage 8 has no
/// further review (mastered).
/// - Correct at stage 0: stays at stage 0 with no review time — a correct
/// answer never puts a question on the curve.
pub fn next(stage: u8, correct: bool, now: DateTime<Utc>) -> Transition {
    if !correct {
        return Transition {
            stage: 1,
            next_review_time: Some(now + INTERVALS[1]),
        };
    }

    if stage == 0 {
        return Transition {
            stage: 0,
            next_review_time: None,
        };
    }

    let next_stage = (stage + 1).min(MAX_STAGE);
    let next_review_time = if next_stage == MASTERED_STAGE {
        None
    } else {
        Some(now + INTERVALS[next_stage as usize])
    };

    Transition {
        stage: next_stage,
        next_review_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn wrong_answer_resets_to_stage_one() {
        let tr = next(5, false, t0());
        assert_eq!(tr.stage, 1);
        assert_eq!(tr.next_review_time, Some(t0() + Duration::minutes(30)));
    }

    #[test]
    fn correct_at_stage_zero_never_enters_curve() {
        let tr = next(0, true, t0());
        assert_eq!(tr.stage, 0);
        assert_eq!(tr.next_review_time, None);
    }

    #[test]
    fn correct_on_curve_advances_one_stage() {
        let tr = next(1, true, t0());
        assert_eq!(tr.stage, 2);
        assert_eq!(tr.next_review_time, Some(t0() + Duration::hours(12)));
    }

    #[test]
    fn stage_eight_is_mastered_with_no_further_review() {
        let tr = next(8, true, t0());
        assert_eq!(tr.stage, 8);
        assert_eq!(tr.next_review_time, None);

        let tr = next(7, true, t0());
        assert_eq!(tr.stage, 8);
        assert_eq!(tr.next_review_time, None);
    }

    /// Scenario 1: full walk from a wrong answer through
    /// mastery.
    #[test]
    fn ebbinghaus_walk_scenario() {
        let t0 = t0();
        let tr = next(0, false, t0);
        assert_eq!((tr.stage, tr.next_review_time), (1, Some(t0 + Duration::minutes(30))));

        let t1 = t0 + Duration::minutes(31);
        let tr = next(1, true, t1);
        assert_eq!((tr.stage, tr.next_review_time), (2, Some(t1 + Duration::hours(12))));

        let t2 = t1 + Duration::hours(12) + Duration::seconds(1);
        let tr = next(2, true, t2);
        assert_eq!(tr.stage, 3);
        assert_eq!(tr.next_review_time, Some(t2 + Duration::days(1)));

        let mut stage = 3;
        let mut now = t2;
        while stage < MASTERED_STAGE {
            let tr = next(stage, true, now);
            stage = tr.stage;
            now += Duration::hours(1);
        }
        assert_eq!(stage, MASTERED_STAGE);
        assert_eq!(next(stage, true, now).next_review_time, None);
    }
}
