//! Accuracy-loss scoring — pure functions only, no engine or DB access.

use crate::engine::RawEval;

/// Sentinel magnitude for forced-mate scores. A reported mate is clamped to
/// exactly this value so downstream arithmetic stays uniform.
pub const MATE_SCORE: i32 = 100_000;

/// Policy for a side with zero evaluated plies: zero loss, full accuracy.
/// A deliberate convention, not a numeric accident.
pub const EMPTY_SIDE_ACPL: f64 = 0.0;
pub const EMPTY_SIDE_ACCURACY: f64 = 100.0;

/// Collapse a raw engine score to a single centipawn value from the side
/// to move's perspective. Mates and out-of-range centipawn reports are both
/// clamped to `±MATE_SCORE`, so every score fits in the sentinel range and
/// negating one can never overflow.
pub fn mover_score(eval: &RawEval) -> i32 {
    if let Some(mate) = eval.mate {
        // `mate 0` means the side to move is already checkmated.
        if mate > 0 {
            MATE_SCORE
        } else {
            -MATE_SCORE
        }
    } else {
        eval.cp.unwrap_or(0).clamp(-MATE_SCORE, MATE_SCORE)
    }
}

/// Centipawn loss for one ply. `best` and `after` are both from the
/// mover's perspective; a move that does not worsen the position costs 0.
pub fn ply_loss(best: i32, after: i32) -> i64 {
    i64::from(best).saturating_sub(i64::from(after)).max(0)
}

/// Map average centipawn loss to a bounded accuracy figure in [0, 100].
///
/// `100 - 0.5 * sqrt(acpl)`, floored at 0. A monotone approximation, not a
/// probabilistic best-move-match accuracy.
pub fn acpl_to_accuracy(acpl: f64) -> f64 {
    (100.0 - 0.5 * acpl.max(0.0).sqrt()).max(0.0)
}

/// Per-side running totals over the evaluated plies of one game.
#[derive(Debug, Clone, Default)]
pub struct LossTally {
    white_loss: i64,
    black_loss: i64,
    white_plies: u32,
    black_plies: u32,
}

impl LossTally {
    pub fn record(&mut self, white_moved: bool, best: i32, after: i32) {
        let loss = ply_loss(best, after);
        if white_moved {
            self.white_loss += loss;
            self.white_plies += 1;
        } else {
            self.black_loss += loss;
            self.black_plies += 1;
        }
    }

    /// Evaluated plies only; skipped or truncated plies never count.
    pub fn plies(&self) -> u32 {
        self.white_plies + self.black_plies
    }

    pub fn acpl_white(&self) -> f64 {
        average(self.white_loss, self.white_plies)
    }

    pub fn acpl_black(&self) -> f64 {
        average(self.black_loss, self.black_plies)
    }

    pub fn accuracy_white(&self) -> f64 {
        if self.white_plies == 0 {
            EMPTY_SIDE_ACCURACY
        } else {
            acpl_to_accuracy(self.acpl_white())
        }
    }

    pub fn accuracy_black(&self) -> f64 {
        if self.black_plies == 0 {
            EMPTY_SIDE_ACCURACY
        } else {
            acpl_to_accuracy(self.acpl_black())
        }
    }
}

fn average(loss: i64, plies: u32) -> f64 {
    if plies == 0 {
        EMPTY_SIDE_ACPL
    } else {
        loss as f64 / f64::from(plies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_clamp_to_sentinel() {
        let mate_for = RawEval { cp: None, mate: Some(3) };
        let mate_against = RawEval { cp: None, mate: Some(-2) };
        let mated_now = RawEval { cp: None, mate: Some(0) };
        assert_eq!(mover_score(&mate_for), MATE_SCORE);
        assert_eq!(mover_score(&mate_against), -MATE_SCORE);
        assert_eq!(mover_score(&mated_now), -MATE_SCORE);
    }

    #[test]
    fn cp_scores_pass_through() {
        let eval = RawEval { cp: Some(-42), mate: None };
        assert_eq!(mover_score(&eval), -42);
        assert_eq!(mover_score(&RawEval::default()), 0);
    }

    #[test]
    fn extreme_cp_scores_clamp_into_sentinel_range() {
        let huge = RawEval { cp: Some(i32::MAX), mate: None };
        let tiny = RawEval { cp: Some(i32::MIN), mate: None };
        assert_eq!(mover_score(&huge), MATE_SCORE);
        assert_eq!(mover_score(&tiny), -MATE_SCORE);
        // Negating a clamped score is always safe.
        assert_eq!(-mover_score(&tiny), MATE_SCORE);
        let edge = RawEval { cp: Some(-MATE_SCORE), mate: None };
        assert_eq!(mover_score(&edge), -MATE_SCORE);
    }

    #[test]
    fn loss_is_never_negative() {
        assert_eq!(ply_loss(50, 30), 20);
        assert_eq!(ply_loss(30, 50), 0);
        assert_eq!(ply_loss(-100, -100), 0);
        assert_eq!(ply_loss(MATE_SCORE, -MATE_SCORE), 200_000);
        assert_eq!(ply_loss(-MATE_SCORE, MATE_SCORE), 0);
    }

    #[test]
    fn accuracy_stays_in_bounds() {
        assert_eq!(acpl_to_accuracy(0.0), 100.0);
        assert_eq!(acpl_to_accuracy(-5.0), 100.0);
        assert_eq!(acpl_to_accuracy(1e9), 0.0);
        for acpl in [1.0, 25.0, 100.0, 900.0, 40_000.0] {
            let acc = acpl_to_accuracy(acpl);
            assert!((0.0..=100.0).contains(&acc), "acpl={acpl} acc={acc}");
        }
        // 100 ACPL -> 100 - 0.5 * 10 = 95
        assert!((acpl_to_accuracy(100.0) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn empty_side_gets_zero_loss_and_full_accuracy() {
        let mut tally = LossTally::default();
        tally.record(true, 80, 30); // only White evaluated
        assert_eq!(tally.plies(), 1);
        assert_eq!(tally.acpl_black(), EMPTY_SIDE_ACPL);
        assert_eq!(tally.accuracy_black(), EMPTY_SIDE_ACCURACY);
        assert!((tally.acpl_white() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn per_side_averages_use_that_sides_ply_count() {
        let mut tally = LossTally::default();
        tally.record(true, 100, 0); // white loses 100
        tally.record(false, 0, 0); // black loses 0
        tally.record(true, 40, 20); // white loses 20
        assert_eq!(tally.plies(), 3);
        assert!((tally.acpl_white() - 60.0).abs() < 1e-9);
        assert_eq!(tally.acpl_black(), 0.0);
        assert_eq!(tally.accuracy_black(), 100.0);
    }
}
