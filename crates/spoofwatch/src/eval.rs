//! Scoring helpers for labelled capture datasets

/// Precision, recall, and F1 from raw counts
///
/// Ratios with a zero denominator are undefined and come back as `None`.
pub fn precision_recall_f1(
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    let precision = (true_positives + false_positives > 0)
        .then(|| true_positives as f64 / (true_positives + false_positives) as f64);
    let recall = (true_positives + false_negatives > 0)
        .then(|| true_positives as f64 / (true_positives + false_negatives) as f64);
    let f1 = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        _ => None,
    };
    (precision, recall, f1)
}
