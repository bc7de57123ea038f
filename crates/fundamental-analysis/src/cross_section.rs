/// Cross-sectional statistics used to put heterogeneous key metrics on a
/// common scale before they are combined into a ranking score.

/// Mean of a slice; 0.0 when empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation; 0.0 for fewer than two values.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Z-score every value against the slice itself, clipped to `[-clip, clip]`.
/// A slice without variance maps to all zeros.
pub fn clipped_z_scores(data: &[f64], clip: f64) -> Vec<f64> {
    let sd = std_dev(data);
    if sd < f64::EPSILON {
        return vec![0.0; data.len()];
    }
    let m = mean(data);
    data.iter()
        .map(|x| ((x - m) / sd).clamp(-clip, clip))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_population_std_dev() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&data), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_z_scores_center_on_mean() {
        let z = clipped_z_scores(&[10.0, 20.0, 30.0], 3.0);
        assert_relative_eq!(z[1], 0.0, epsilon = 1e-12);
        assert!(z[0] < 0.0 && z[2] > 0.0);
        assert_relative_eq!(z[0], -z[2], epsilon = 1e-12);
    }

    #[test]
    fn test_z_scores_are_clipped() {
        let mut data = vec![0.0; 99];
        data.push(1000.0);
        let z = clipped_z_scores(&data, 3.0);
        assert_relative_eq!(z[99], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        assert_eq!(clipped_z_scores(&[5.0, 5.0, 5.0], 3.0), vec![0.0, 0.0, 0.0]);
        assert!(clipped_z_scores(&[], 3.0).is_empty());
    }
}
