//! Statistical helpers for allele frequency consistency checks.

use statrs::distribution::{Binomial, Discrete, DiscreteCDF};

/// Relative tolerance when comparing point probabilities, as in R's `binom.test`.
const RELATIVE_ERROR: f64 = 1.0 + 1e-7;

/// Two-sided exact binomial test.
///
/// Returns the probability under `Binomial(n, p)` of all outcomes that are at
/// most as likely as observing `x` successes.  `x` is rounded to the nearest
/// integer and clamped to `0..=n`.  The degenerate cases `n == 0`, `p == 0`
/// and `p == 1` do not fail but return 1 if `x` is consistent with the
/// boundary and 0 otherwise.
pub fn binom_test_two_sided(x: f64, n: u64, p: f64) -> f64 {
    if n == 0 || p.is_nan() {
        return 1.0;
    }
    let x = if x.is_nan() {
        0
    } else {
        x.round().clamp(0.0, n as f64) as u64
    };
    if p <= 0.0 {
        return if x == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if x == n { 1.0 } else { 0.0 };
    }

    let (dist, flipped) = match (Binomial::new(p, n), Binomial::new(1.0 - p, n)) {
        (Ok(dist), Ok(flipped)) => (dist, flipped),
        _ => return 1.0,
    };
    // P(X <= k)
    let lower_tail = |k: u64| dist.cdf(k);
    // P(X >= k), through the number of failures to keep precision in the tail
    let upper_tail = |k: u64| if k == 0 { 1.0 } else { flipped.cdf(n - k) };

    let mean = n as f64 * p;
    if x as f64 == mean {
        return 1.0;
    }
    let threshold = dist.ln_pmf(x) + RELATIVE_ERROR.ln();

    // The pmf is non-increasing on `ceil(mean)..=n` and non-decreasing on
    // `0..=floor(mean)`, so the opposite tail can be found by bisection.
    let p_value = if (x as f64) < mean {
        let first = partition_point(mean.ceil() as u64, n + 1, |k| {
            dist.ln_pmf(k) > threshold
        });
        let other = if first > n { 0.0 } else { upper_tail(first) };
        lower_tail(x) + other
    } else {
        let end = partition_point(0, mean.floor() as u64 + 1, |k| {
            dist.ln_pmf(k) <= threshold
        });
        let other = if end == 0 { 0.0 } else { lower_tail(end - 1) };
        other + upper_tail(x)
    };

    p_value.clamp(0.0, 1.0)
}

/// Return the first `k` in `lo..hi` for which `pred` is false, assuming that
/// `pred` holds for a (possibly empty) prefix of the range only.
fn partition_point<F>(mut lo: u64, mut hi: u64, pred: F) -> u64
where
    F: Fn(u64) -> bool,
{
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
