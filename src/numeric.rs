//! NaN-aware numeric kernel
//!
//! Every reduction ignores NaN inputs. When no real value remains the result
//! is NaN, which is how missing data propagates through series functions.

/// Sum of the non-NaN values
pub fn sum(values: &[f64]) -> f64 {
    let mut acc = 0.0;
    let mut seen = false;
    for v in values.iter().filter(|v| !v.is_nan()) {
        acc += v;
        seen = true;
    }
    if seen {
        acc
    } else {
        f64::NAN
    }
}

/// Arithmetic mean of the non-NaN values
pub fn avg(values: &[f64]) -> f64 {
    let mut acc = 0.0;
    let mut count = 0usize;
    for v in values.iter().filter(|v| !v.is_nan()) {
        acc += v;
        count += 1;
    }
    if count == 0 {
        f64::NAN
    } else {
        acc / count as f64
    }
}

/// Minimum of the non-NaN values
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(f64::NAN)
}

/// Maximum of the non-NaN values
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(f64::NAN)
}

/// Product of the non-NaN values
pub fn multiply(values: &[f64]) -> f64 {
    let mut acc = 1.0;
    let mut seen = false;
    for v in values.iter().filter(|v| !v.is_nan()) {
        acc *= v;
        seen = true;
    }
    if seen {
        acc
    } else {
        f64::NAN
    }
}

/// `a / b`; NaN when either side is NaN or the divisor is zero
pub fn divide(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() || b == 0.0 {
        f64::NAN
    } else {
        a / b
    }
}

/// Last non-NaN value
pub fn last(values: &[f64]) -> f64 {
    values
        .iter()
        .rev()
        .copied()
        .find(|v| !v.is_nan())
        .unwrap_or(f64::NAN)
}

/// Percentile following NIST Engineering Statistics Handbook §2.5.2
///
/// `n` is in `[0, 100]`. Without interpolation the rank is rounded up to the
/// next whole rank; with interpolation the fractional part of the rank is
/// used to blend towards the next value.
pub fn percentile(values: &[f64], n: f64, interpolate: bool) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || n.is_nan() || !(0.0..=100.0).contains(&n) {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let len = sorted.len();

    let fractional_rank = (n / 100.0) * (len as f64 + 1.0);
    let mut rank = fractional_rank.floor() as usize;
    let rank_fraction = fractional_rank - rank as f64;

    if !interpolate {
        rank += rank_fraction.ceil() as usize;
    }

    if rank == 0 {
        return sorted[0];
    }
    if rank >= len {
        return sorted[len - 1];
    }

    let mut result = sorted[rank - 1];
    if interpolate {
        let next = sorted[rank];
        result += rank_fraction * (next - result);
    }
    result
}

/// Least-squares fit of `y = factor * x + offset`
///
/// `x` for index `i` is `start + step * i`. NaN values are skipped. Returns
/// `(NaN, NaN)` when fewer than two real values exist or the fit is singular.
pub fn linear_regression(values: &[f64], start: i64, step: i64) -> (f64, f64) {
    let mut n = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;

    for (i, y) in values.iter().enumerate() {
        if y.is_nan() {
            continue;
        }
        let x = (start + step * i as i64) as f64;
        n += 1.0;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }

    if n < 2.0 {
        return (f64::NAN, f64::NAN);
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 || !denominator.is_finite() {
        return (f64::NAN, f64::NAN);
    }

    let factor = (n * sum_xy - sum_x * sum_y) / denominator;
    let offset = (sum_y - factor * sum_x) / n;
    (factor, offset)
}

/// Greatest common divisor of two positive integers
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Least common multiple of two positive integers
pub fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b)) * b
}

/// Least common multiple of a list; 0 for an empty list
pub fn lcm_all(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, |acc, v| if acc == 0 { v } else { lcm(acc, v) })
}
