use std::collections::HashMap;

/// Value counts of one column, compared as exact text.
#[derive(Debug, Clone, Default)]
pub struct ValueDistribution<'a> {
    total: usize,
    counts: HashMap<&'a str, usize>,
}

impl<'a> ValueDistribution<'a> {
    pub fn from_values(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut distribution = ValueDistribution::default();
        for value in values {
            distribution.ingest(value);
        }
        distribution
    }

    pub fn ingest(&mut self, value: &'a str) {
        self.total += 1;
        *self.counts.entry(value).or_insert(0) += 1;
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Most frequent value and its count; ties go to the lowest text.
    pub fn dominant(&self) -> Option<(&'a str, usize)> {
        self.counts
            .iter()
            .map(|(value, count)| (*value, *count))
            .min_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
    }

    /// Share of all rows, in percent.
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }
}
