//! Standardization of numeric feature vectors

use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, FEATURE_COUNT};
use crate::error::{Result, ScanError};

/// Per-feature mean and standard deviation learned once at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: [f32; FEATURE_COUNT],
    /// Population standard deviation; zero-variance features are stored as 1.0
    pub std: [f32; FEATURE_COUNT],
    pub samples: usize,
}

impl Scaler {
    /// Fit on the training set's raw feature vectors
    pub fn fit(vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(ScanError::Dataset(
                "cannot fit scaler on an empty dataset".to_string(),
            ));
        }

        let n = vectors.len() as f64;
        let mut mean = [0.0f64; FEATURE_COUNT];
        for v in vectors {
            for (m, &x) in mean.iter_mut().zip(v.iter()) {
                *m += x as f64;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = [0.0f64; FEATURE_COUNT];
        for v in vectors {
            for i in 0..FEATURE_COUNT {
                let d = v[i] as f64 - mean[i];
                variance[i] += d * d;
            }
        }

        let mut scaler = Scaler {
            mean: [0.0; FEATURE_COUNT],
            std: [1.0; FEATURE_COUNT],
            samples: vectors.len(),
        };
        for i in 0..FEATURE_COUNT {
            scaler.mean[i] = mean[i] as f32;
            scaler.std[i] = safe_divisor((variance[i] / n).sqrt() as f32);
        }

        Ok(scaler)
    }

    /// `(x - mean) / std`, elementwise
    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (vector[i] - self.mean[i]) / safe_divisor(self.std[i]);
        }
        out
    }

    pub fn transform_all(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        vectors.iter().map(|v| self.transform(v)).collect()
    }
}

fn safe_divisor(std: f32) -> f32 {
    if std.is_finite() && std > f32::EPSILON {
        std
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_stats(rows: &[FeatureVector], col: usize) -> (f64, f64) {
        let n = rows.len() as f64;
        let mean = rows.iter().map(|r| r[col] as f64).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r[col] as f64 - mean).powi(2)).sum::<f64>() / n;
        (mean, var)
    }

    #[test]
    fn test_fit_transform_standardizes() {
        let data: Vec<FeatureVector> = vec![
            [120.0, 4.0, 17.0, 1.0],
            [340.0, 0.0, 3.0, 0.0],
            [210.0, 12.0, 9.0, 2.0],
            [95.0, 1.0, 30.0, 1.0],
            [400.0, 7.0, 2.0, 0.0],
        ];
        let scaler = Scaler::fit(&data).unwrap();
        let scaled = scaler.transform_all(&data);

        for col in 0..FEATURE_COUNT {
            let (mean, var) = column_stats(&scaled, col);
            assert!(mean.abs() < 1e-5, "column {} mean {}", col, mean);
            assert!((var - 1.0).abs() < 1e-4, "column {} variance {}", col, var);
        }
    }

    #[test]
    fn test_zero_variance_stays_finite() {
        let data: Vec<FeatureVector> = vec![[10.0, 0.0, 1.0, 0.0], [20.0, 0.0, 3.0, 0.0]];
        let scaler = Scaler::fit(&data).unwrap();
        assert_eq!(scaler.std[1], 1.0);
        assert_eq!(scaler.std[3], 1.0);

        for row in scaler.transform_all(&data) {
            assert!(row.iter().all(|x| x.is_finite()));
            assert_eq!(row[1], 0.0);
        }

        let unseen = scaler.transform(&[15.0, 5.0, 2.0, 3.0]);
        assert!(unseen.iter().all(|x| x.is_finite()));
        assert_eq!(unseen[3], 3.0);
    }

    #[test]
    fn test_hand_built_zero_std_guarded() {
        let scaler = Scaler {
            mean: [0.0; FEATURE_COUNT],
            std: [0.0; FEATURE_COUNT],
            samples: 1,
        };
        assert_eq!(scaler.transform(&[1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_fit_rejected() {
        assert!(matches!(Scaler::fit(&[]), Err(ScanError::Dataset(_))));
    }
}
