/// Linear-interpolated quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Quantile of the finite values, `None` when there are none.
pub fn nan_quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    finite.sort_by(f64::total_cmp);
    quantile_sorted(&finite, q)
}

pub fn nan_median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    nan_quantile(values, 0.5)
}

/// Median absolute deviation from `center` over the finite values.
pub fn nan_mad(values: impl IntoIterator<Item = f64>, center: f64) -> Option<f64> {
    nan_median(values.into_iter().map(|v| (v - center).abs()))
}

pub fn rms(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v * v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        (sum / n as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_skips_nan() {
        assert_eq!(nan_median([3.0, f64::NAN, 1.0, 2.0]), Some(2.0));
        assert_eq!(nan_median([f64::NAN, f64::NAN]), None);
    }

    #[test]
    fn median_of_even_count_interpolates() {
        assert_eq!(nan_median([1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }

    #[test]
    fn quantile_matches_linear_rule() {
        let sorted: Vec<f64> = (0..=10).map(|v| v as f64).collect();
        assert_eq!(quantile_sorted(&sorted, 0.9), Some(9.0));
        assert_eq!(quantile_sorted(&sorted, 0.95), Some(9.5));
    }
}
