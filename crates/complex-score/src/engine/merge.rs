use crate::rules::FieldMode;

/// Folds one field score into the running total.
///
/// Negative scores never contribute. NaN is not negative, so it reaches the fold:
/// `sum`/`mult` propagate it while `max`/`min` keep the current total.
pub fn merge_field_score(mode: FieldMode, total: f64, score: f64) -> f64 {
    if score < 0.0 {
        return total;
    }
    match mode {
        FieldMode::Sum => total + score,
        FieldMode::Mult => total * score,
        FieldMode::Max => {
            if total < score {
                score
            } else {
                total
            }
        }
        FieldMode::Min => {
            if total > score {
                score
            } else {
                total
            }
        }
    }
}

/// Merges scores in order, starting from zero.
pub fn merge_field_scores<I>(mode: FieldMode, scores: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    scores
        .into_iter()
        .fold(0.0, |total, score| merge_field_score(mode, total, score))
}
