//! Fixed-window moving-average smoothing.

/// Smooth `series` with a uniform `k`-tap kernel.
///
/// The output has the same length as the input and is aligned like a
/// "same"-mode convolution: sample `i` averages the `k` inputs ending at
/// `i + (k - 1) / 2`, with positions outside the series counted as zero.
/// Series shorter than `k` (and `k == 0`) are returned unchanged.
pub fn moving_average(series: &[f64], k: usize) -> Vec<f64> {
    if k == 0 || series.len() < k {
        return series.to_vec();
    }

    let n = series.len() as isize;
    let k_i = k as isize;
    let lead = (k_i - 1) / 2;
    let weight = 1.0 / k as f64;

    (0..n)
        .map(|i| {
            let hi = i + lead;
            let lo = hi - (k_i - 1);
            let sum: f64 = (lo.max(0)..=hi.min(n - 1))
                .map(|j| series[j as usize])
                .sum();
            sum * weight
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
