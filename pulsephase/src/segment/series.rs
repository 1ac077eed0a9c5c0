//! Chebyshev series arithmetic.
//!
//! Series are stored with the full-sum convention, `f(x) = Σ c_k T_k(x)`,
//! over the interval `[-1, 1]`. Two-dimensional grids are row-major with the
//! time order along rows: `c[i * nf + j]` multiplies `T_i(x) T_j(y)`.

use std::f64::consts::PI;

/// Evaluate `Σ c_k T_k(x)` with Clenshaw's recurrence.
pub fn evaluate(coefs: &[f64], x: f64) -> f64 {
    let Some((first, rest)) = coefs.split_first() else {
        return 0.0;
    };

    let mut b1 = 0.0;
    let mut b2 = 0.0;
    for &c in rest.iter().rev() {
        let b0 = 2.0 * x * b1 - b2 + c;
        b2 = b1;
        b1 = b0;
    }
    x * b1 - b2 + first
}

/// Coefficients of the derivative series, in the same convention.
pub fn derivative(coefs: &[f64]) -> Vec<f64> {
    let n = coefs.len();
    if n < 2 {
        return vec![0.0];
    }

    let mut d = vec![0.0; n];
    d[n - 2] = 2.0 * (n - 1) as f64 * coefs[n - 1];
    for k in (1..n - 1).rev() {
        let above = if k + 1 < n { d[k + 1] } else { 0.0 };
        d[k - 1] = above + 2.0 * k as f64 * coefs[k];
    }
    d[0] *= 0.5;
    d.truncate(n - 1);
    d
}

/// Collapse the frequency axis of a grid at `y`, leaving a series in time.
pub fn collapse(grid: &[f64], nt: usize, nf: usize, y: f64) -> Vec<f64> {
    (0..nt)
        .map(|i| evaluate(&grid[i * nf..(i + 1) * nf], y))
        .collect()
}

/// Evaluate a two-dimensional grid at `(x, y)`.
pub fn evaluate2(grid: &[f64], nt: usize, nf: usize, x: f64, y: f64) -> f64 {
    evaluate(&collapse(grid, nt, nf, y), x)
}

/// Chebyshev nodes of the first kind for an `n`-term fit.
pub fn nodes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|k| (PI * (k as f64 + 0.5) / n as f64).cos())
        .collect()
}

/// Fit an `nt × nf` grid to `f` sampled at the product of Chebyshev nodes.
///
/// The fit interpolates `f` exactly at the nodes.
pub fn fit2(nt: usize, nf: usize, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let xs = nodes(nt);
    let ys = nodes(nf);

    let samples: Vec<f64> = xs
        .iter()
        .flat_map(|&x| ys.iter().map(move |&y| (x, y)))
        .map(|(x, y)| f(x, y))
        .collect();

    let mut grid = vec![0.0; nt * nf];
    for i in 0..nt {
        for j in 0..nf {
            let mut sum = 0.0;
            for (k, _) in xs.iter().enumerate() {
                let tx = (PI * i as f64 * (k as f64 + 0.5) / nt as f64).cos();
                for (l, _) in ys.iter().enumerate() {
                    let ty = (PI * j as f64 * (l as f64 + 0.5) / nf as f64).cos();
                    sum += samples[k * nf + l] * tx * ty;
                }
            }
            let mut c = sum * (2.0 / nt as f64) * (2.0 / nf as f64);
            if i == 0 {
                c *= 0.5;
            }
            if j == 0 {
                c *= 0.5;
            }
            grid[i * nf + j] = c;
        }
    }
    grid
}
