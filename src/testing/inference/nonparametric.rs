use crate::testing::utils::split_by_mask;
use crate::testing::{Alternative, RankSumMethod, TestResult};
use num_traits::{Float, NumCast};
use single_utilities::traits::FloatOps;
use statrs::function::erf::erfc;
use std::cmp::Ordering;

/// Largest size of the smaller group for which [`RankSumMethod::Auto`] uses the
/// exact null distribution.
pub const EXACT_MAX_GROUP_SIZE: usize = 8;

const CONTINUITY: f64 = 0.5;

fn cast<T: FloatOps>(value: f64) -> T {
    <T as NumCast>::from(value).unwrap_or_else(<T as Float>::nan)
}

/// Upper tail of the standard normal distribution.
pub(crate) fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Mid-ranks (1-based, ties averaged) of `values` in their original order.
///
/// Also returns the tie term `sum(t^3 - t)` over every run of `t` tied values,
/// which is zero when all values are distinct.
pub fn rank_with_ties<T>(values: &[T]) -> (Vec<f64>, f64)
where
    T: FloatOps,
{
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < order.len() {
        let val = values[order[i]];
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == val {
            j += 1;
        }

        // positions i..j hold ranks i+1..=j
        let rank = (i + j + 1) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }

        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }

    (ranks, tie_term)
}

/// Number of arrangements producing each value of U for groups of size `nx` and `ny`.
///
/// Index `u` of the returned vector holds the count for `U = u`; the counts sum to
/// `C(nx + ny, nx)`. The counts are the coefficients of the Gaussian binomial
/// `[nx + ny, m]_q`, built one factor `(1 - q^(n+k)) / (1 - q^k)` at a time.
/// Returns `None` when the total number of arrangements does not fit in 128 bits.
pub fn exact_u_counts(nx: usize, ny: usize) -> Option<Vec<u128>> {
    let (m, n) = if nx <= ny { (nx, ny) } else { (ny, nx) };

    let mut total: u128 = 1;
    for i in 1..=m {
        total = total.checked_mul((n + i) as u128)? / i as u128;
    }

    let max_u = m.checked_mul(n)?;
    let mut coeffs = vec![0u128; max_u + m + 1];
    coeffs[0] = 1;

    // Intermediate products may go negative; wrapping arithmetic is exact modulo
    // 2^128 and every final coefficient is below `total`.
    for k in 1..=m {
        let step = n + k;
        let top = (k - 1) * n + step;
        for j in (step..=top).rev() {
            coeffs[j] = coeffs[j].wrapping_sub(coeffs[j - step]);
        }
        for j in k..=top {
            coeffs[j] = coeffs[j].wrapping_add(coeffs[j - k]);
        }
    }

    coeffs.truncate(max_u + 1);
    Some(coeffs)
}

fn exact_p_value(u1: f64, nx: usize, ny: usize, alternative: Alternative) -> Option<f64> {
    let counts = exact_u_counts(nx, ny)?;
    let total: u128 = counts.iter().sum();

    let u1 = u1.round() as usize;
    let u2 = nx * ny - u1;
    let u = match alternative {
        Alternative::Greater => u1,
        Alternative::Less => u2,
        Alternative::TwoSided => u1.max(u2),
    };

    let tail: u128 = counts[u..].iter().sum();
    let p = tail as f64 / total as f64;

    Some(match alternative {
        Alternative::TwoSided => (2.0 * p).min(1.0),
        _ => p,
    })
}

/// Mann-Whitney U test of `x` against `y`.
///
/// The reported statistic is U of `x` (`R_x - nx(nx+1)/2`) for every alternative.
/// `Alternative::Greater` tests whether `x` is stochastically greater than `y`.
/// The asymptotic p-value uses the continuity-corrected normal approximation with
/// the tie-corrected variance; when that variance is zero (all values identical)
/// the p-value is 1.
pub fn mann_whitney<T>(
    x: &[T],
    y: &[T],
    alternative: Alternative,
    method: RankSumMethod,
) -> TestResult<T>
where
    T: FloatOps,
{
    let nx = x.len();
    let ny = y.len();

    if nx == 0 || ny == 0 {
        return TestResult::new(<T as Float>::nan(), T::one()); // Insufficient data
    }

    let combined: Vec<T> = x.iter().chain(y.iter()).copied().collect();
    let (ranks, tie_term) = rank_with_ties(&combined);

    let n1 = nx as f64;
    let n2 = ny as f64;
    let n = n1 + n2;

    let rank_sum_x: f64 = ranks[..nx].iter().sum();
    let u_x = rank_sum_x - n1 * (n1 + 1.0) / 2.0;
    let u_y = n1 * n2 - u_x;

    let mean_u = n1 * n2 / 2.0;
    let var_u = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    let (u, factor) = match alternative {
        Alternative::Greater => (u_x, 1.0),
        Alternative::Less => (u_y, 1.0),
        Alternative::TwoSided => (u_x.max(u_y), 2.0),
    };

    let (z, asymptotic_p) = if var_u > 0.0 {
        let z = (u - mean_u - CONTINUITY) / var_u.sqrt();
        (z, (factor * normal_sf(z)).clamp(0.0, 1.0))
    } else {
        log::debug!(
            "degenerate score distribution (nx={}, ny={}): zero rank variance, p set to 1",
            nx,
            ny
        );
        (0.0, 1.0)
    };

    let has_ties = tie_term > 0.0;
    let use_exact = match method {
        RankSumMethod::Asymptotic => false,
        RankSumMethod::Exact => {
            if has_ties {
                log::debug!("ties present, exact U distribution unavailable; using normal approximation");
            }
            !has_ties
        }
        RankSumMethod::Auto => !has_ties && nx.min(ny) <= EXACT_MAX_GROUP_SIZE,
    };

    let exact_p = if use_exact {
        let p = exact_p_value(u_x, nx, ny, alternative);
        if p.is_none() {
            log::debug!("exact U distribution too large for nx={}, ny={}; using normal approximation", nx, ny);
        }
        p
    } else {
        None
    };
    let p_value = exact_p.unwrap_or(asymptotic_p);

    let effect_size = z / n.sqrt();
    let standard_error = var_u.max(0.0).sqrt();

    TestResult::with_effect_size(cast(u_x), cast(p_value), cast(effect_size))
        .with_standard_error(cast(standard_error))
        .with_metadata("z_score", cast(z))
        .with_metadata("mean_u", cast(mean_u))
        .with_metadata("var_u", cast(var_u))
        .with_metadata("tie_term", cast(tie_term))
        .with_metadata("exact", if exact_p.is_some() { T::one() } else { T::zero() })
        .with_metadata("nx", cast(n1))
        .with_metadata("ny", cast(n2))
}

/// Mann-Whitney test of the values flagged in `in_group` against all other values.
pub fn mann_whitney_mask<T>(
    values: &[T],
    in_group: &[bool],
    alternative: Alternative,
    method: RankSumMethod,
) -> anyhow::Result<TestResult<T>>
where
    T: FloatOps,
{
    if values.len() != in_group.len() {
        return Err(anyhow::anyhow!(
            "Group mask length {} does not match number of values {}",
            in_group.len(),
            values.len()
        ));
    }

    let (group, rest) = split_by_mask(values, in_group);
    Ok(mann_whitney(&group, &rest, alternative, method))
}
