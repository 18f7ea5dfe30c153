//! Column summary statistics for the profile metric tables.

use num_traits::Zero;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("no inputs given")]
    NoInputs,
}

/// Per-column summary over the stacked profile rows. The statistics
/// (and their exact semantics: sample standard deviation with an n-1
/// denominator, linearly interpolated quartiles) match what the
/// downstream notebooks already compare against.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// NaN for a single sample.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Value at quantile `q` of the sorted samples, interpolating
/// linearly between the two nearest order statistics.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    let fraction = position - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * fraction
}

impl Summary {
    /// (Needs to own `values` for sorting, internally.)
    pub fn from_values(mut values: Vec<f64>) -> Result<Self, StatsError> {
        let count = values.len();
        if count.is_zero() {
            return Err(StatsError::NoInputs);
        }

        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;

        let std = if count > 1 {
            let squared_deviations: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (squared_deviations / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        values.sort_by(f64::total_cmp);

        Ok(Summary {
            count,
            mean,
            std,
            min: values[0],
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values[count - 1],
        })
    }

    /// Statistic-wise difference `self - other`, for comparing two
    /// run sets (e.g. untuned minus tuned) aligned on a column.
    pub fn delta(&self, other: &Summary) -> SummaryDelta {
        let Summary {
            count,
            mean,
            std,
            min,
            q25,
            median,
            q75,
            max,
        } = self;
        SummaryDelta {
            count: *count as f64 - other.count as f64,
            mean: mean - other.mean,
            std: std - other.std,
            min: min - other.min,
            q25: q25 - other.q25,
            median: median - other.median,
            q75: q75 - other.q75,
            max: max - other.max,
        }
    }
}

/// Differences of two `Summary`s, field by field. `count` becomes a
/// float so the one struct serves all columns of the rendered table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDelta {
    pub count: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} vs. {b}");
    }

    #[test]
    fn t_describe_small() {
        let s = Summary::from_values(vec![4.0, 1.0, 3.0, 2.0]).expect("non-empty");
        assert_eq!(s.count, 4);
        close(s.mean, 2.5);
        close(s.std, (5.0_f64 / 3.0).sqrt());
        close(s.min, 1.0);
        close(s.q25, 1.75);
        close(s.median, 2.5);
        close(s.q75, 3.25);
        close(s.max, 4.0);
    }

    #[test]
    fn t_single_sample() {
        let s = Summary::from_values(vec![7.5]).expect("non-empty");
        assert_eq!(s.count, 1);
        close(s.mean, 7.5);
        assert!(s.std.is_nan());
        close(s.median, 7.5);
        close(s.q25, 7.5);
    }

    #[test]
    fn t_no_inputs() {
        assert_eq!(Summary::from_values(vec![]), Err(StatsError::NoInputs));
    }

    #[test]
    fn t_delta() {
        let a = Summary::from_values(vec![2.0, 4.0]).expect("non-empty");
        let b = Summary::from_values(vec![1.0, 2.0]).expect("non-empty");
        let d = a.delta(&b);
        close(d.count, 0.0);
        close(d.mean, 1.5);
        close(d.median, 1.5);
        close(d.max, 2.0);
    }
}
