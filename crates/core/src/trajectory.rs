//! Gap handling for learner-recorded series.

/// Replace non-finite samples with the previous finite value, then fill
/// any leading gap with the first finite value.
///
/// A series with no finite value is returned unchanged.
pub fn fill_holes(series: &[f64]) -> Vec<f64> {
    let mut out = series.to_vec();

    let mut last = None;
    for v in out.iter_mut() {
        if v.is_finite() {
            last = Some(*v);
        } else if let Some(prev) = last {
            *v = prev;
        }
    }

    let mut next = None;
    for v in out.iter_mut().rev() {
        if v.is_finite() {
            next = Some(*v);
        } else if let Some(following) = next {
            *v = following;
        }
    }

    out
}
