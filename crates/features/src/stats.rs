//! Small statistics helpers over partially-missing data.

use statrs::statistics::Statistics;

/// Arithmetic mean of the present values; `None` if every value is missing.
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let present: Vec<f64> = values.into_iter().flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().mean())
}

/// Population mean and standard deviation (denominator = count).
pub fn population_moments(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();
    Some((mean, std_dev))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_ignores_missing() {
        let mean = mean_present([Some(10.0), Some(12.0), None]).unwrap();
        assert_relative_eq!(mean, 11.0);
    }

    #[test]
    fn test_mean_all_missing() {
        assert_eq!(mean_present([None, None]), None);
        assert_eq!(mean_present(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn test_population_moments() {
        let (mean, std_dev) = population_moments(&[10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(mean, 20.0);
        assert_relative_eq!(std_dev, (200.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_population_moments_single_value() {
        let (mean, std_dev) = population_moments(&[4.0]).unwrap();
        assert_relative_eq!(mean, 4.0);
        assert_relative_eq!(std_dev, 0.0);
        assert_eq!(population_moments(&[]), None);
    }
}
