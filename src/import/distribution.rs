// src/import/distribution.rs
use serde::{Deserialize, Serialize};

/// Percentage of stored users per age group, formatted with two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeDistribution {
    #[serde(rename = "<20")]
    pub under_20: String,
    #[serde(rename = "20-40")]
    pub from_20_to_40: String,
    #[serde(rename = "40-60")]
    pub from_40_to_60: String,
    #[serde(rename = ">60")]
    pub over_60: String,
}

impl AgeDistribution {
    /// Bucket every age and express the counts as percentages.
    ///
    /// The denominator is the number of stored rows, rows without a usable age
    /// included, so the four buckets only sum to 100 when every age is known.
    /// An empty input gives `"0.00"` everywhere.
    pub fn compute(ages: &[Option<f64>]) -> Self {
        let mut counts = [0usize; 4];
        for age in ages.iter().flatten().filter(|a| !a.is_nan()) {
            let bucket = if *age < 20.0 {
                0
            } else if *age <= 40.0 {
                1
            } else if *age <= 60.0 {
                2
            } else {
                3
            };
            counts[bucket] += 1;
        }

        let total = ages.len().max(1) as f64;
        // round half away from zero; `{:.2}` alone sends 3.125 to 3.12
        let pct = |n: usize| {
            let p = n as f64 / total * 100.0;
            format!("{:.2}", (p * 100.0).round() / 100.0)
        };

        AgeDistribution {
            under_20: pct(counts[0]),
            from_20_to_40: pct(counts[1]),
            from_40_to_60: pct(counts[2]),
            over_60: pct(counts[3]),
        }
    }

    /// `(label, percentage)` pairs in bucket order.
    pub fn buckets(&self) -> [(&'static str, &str); 4] {
        [
            ("<20", self.under_20.as_str()),
            ("20-40", self.from_20_to_40.as_str()),
            ("40-60", self.from_40_to_60.as_str()),
            (">60", self.over_60.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ages(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_even_spread() {
        let dist = AgeDistribution::compute(&ages(&[10.0, 25.0, 45.0, 70.0]));
        assert_eq!(
            serde_json::to_value(&dist).unwrap(),
            serde_json::json!({"<20": "25.00", "20-40": "25.00", "40-60": "25.00", ">60": "25.00"})
        );
    }

    #[test]
    fn test_bucket_edges() {
        let dist = AgeDistribution::compute(&ages(&[19.9, 20.0, 40.0, 40.5, 60.0, 60.1]));
        assert_eq!(dist.under_20, "16.67");
        assert_eq!(dist.from_20_to_40, "33.33");
        assert_eq!(dist.from_40_to_60, "33.33");
        assert_eq!(dist.over_60, "16.67");
    }

    #[test]
    fn test_missing_ages_count_toward_total() {
        let dist = AgeDistribution::compute(&[Some(30.0), None, Some(f64::NAN), Some(65.0)]);
        assert_eq!(dist.under_20, "0.00");
        assert_eq!(dist.from_20_to_40, "25.00");
        assert_eq!(dist.from_40_to_60, "0.00");
        assert_eq!(dist.over_60, "25.00");
    }

    #[test]
    fn test_ties_round_up() {
        // one age in 32 rows is exactly 3.125%
        let mut input = vec![Some(10.0)];
        input.extend(std::iter::repeat(None).take(31));
        let dist = AgeDistribution::compute(&input);
        assert_eq!(dist.under_20, "3.13");
        assert_eq!(dist.from_20_to_40, "0.00");
    }

    #[test]
    fn test_empty_store() {
        let dist = AgeDistribution::compute(&[]);
        for (_, pct) in dist.buckets() {
            assert_eq!(pct, "0.00");
        }
    }

    #[test]
    fn test_compute_is_repeatable() {
        let input = ages(&[3.0, 33.0, 33.0, 81.0, 52.0, 7.0, 19.0]);
        assert_eq!(AgeDistribution::compute(&input), AgeDistribution::compute(&input));
    }

    #[test]
    fn test_json_key_order() {
        let dist = AgeDistribution::compute(&ages(&[1.0]));
        let json = serde_json::to_string(&dist).unwrap();
        assert_eq!(
            json,
            r#"{"<20":"100.00","20-40":"0.00","40-60":"0.00",">60":"0.00"}"#
        );
    }
}
