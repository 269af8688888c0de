//! Exponential Moving Average, span convention.
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(span+1).
//! Seed: EMA[0] = x[0], so every position has a value (no warmup NaNs).

/// EMA of `values` with the given span. A span of 0 is treated as 1.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let next = match prev {
            None => x,
            Some(p) => alpha * x + (1.0 - alpha) * p,
        };
        result.push(next);
        prev = Some(next);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_with_first_value() {
        let out = ema(&[10.0, 20.0], 3);
        assert_eq!(out[0], 10.0);
        // alpha = 0.5
        assert!((out[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn constant_input_is_constant() {
        let out = ema(&[5.0; 50], 21);
        assert!(out.iter().all(|&v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn span_one_tracks_input() {
        let xs = [1.0, 4.0, 2.0];
        assert_eq!(ema(&xs, 1), xs.to_vec());
    }

    #[test]
    fn empty_input() {
        assert!(ema(&[], 9).is_empty());
    }
}
