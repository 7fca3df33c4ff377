//! Sample sequence validation

use crate::error::SignalError;

/// Check a sequence has the expected number of samples
pub fn validate_len(field: &'static str, actual: usize, expected: usize) -> Result<(), SignalError> {
    if actual != expected {
        return Err(SignalError::LengthMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Check every value is finite
pub fn validate_finite(field: &'static str, values: &[f64]) -> Result<(), SignalError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(SignalError::NonFinite { field, index }),
        None => Ok(()),
    }
}

/// Validate an `(xs, ys)` table for interpolation: non-empty, equal
/// lengths, finite, and `xs` non-decreasing
pub fn validate_samples(field: &'static str, xs: &[f64], ys: &[f64]) -> Result<(), SignalError> {
    if xs.is_empty() {
        return Err(SignalError::Empty(field));
    }
    validate_len(field, ys.len(), xs.len())?;
    validate_finite(field, xs)?;
    validate_finite(field, ys)?;
    if let Some(i) = xs.windows(2).position(|w| w[1] < w[0]) {
        return Err(SignalError::NonMonotonic { field, index: i + 1 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table() {
        assert!(validate_samples("lane", &[0.0, 1.0, 1.0, 2.0], &[0.0; 4]).is_ok());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(validate_samples("lane", &[], &[]), Err(SignalError::Empty("lane")));
        assert_eq!(
            validate_samples("lane", &[0.0, 2.0, 1.0], &[0.0; 3]),
            Err(SignalError::NonMonotonic { field: "lane", index: 2 })
        );
        assert_eq!(
            validate_samples("lane", &[0.0, 1.0], &[0.0, f64::INFINITY]),
            Err(SignalError::NonFinite { field: "lane", index: 1 })
        );
        assert!(matches!(
            validate_len("path", 10, 33),
            Err(SignalError::LengthMismatch { expected: 33, actual: 10, .. })
        ));
    }
}
