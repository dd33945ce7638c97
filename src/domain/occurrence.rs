/// Cumulative occurrence table: maps a uniform draw in [0, 1) to a sound.
///
/// Entry `i` is the summed occurrence of sounds `0..=i`. If the raw sum
/// exceeds 1 every entry is divided by it, so the last entry is always ≤ 1.
/// A draw `r` selects the leftmost entry strictly greater than `r`; draws at
/// or beyond the last entry select nothing.

#[derive(Clone, PartialEq, Debug, Default)]
pub struct OccurrenceTable {
    cumulative: Vec<f64>,
}

impl OccurrenceTable {
    pub fn empty() -> Self {
        OccurrenceTable { cumulative: Vec::new() }
    }

    /// Build from per-sound occurrences (each expected in [0, 1]).
    pub fn from_occurrences(occurrences: impl IntoIterator<Item = f64>) -> Self {
        let mut total = 0.0;
        let mut cumulative: Vec<f64> = occurrences
            .into_iter()
            .map(|o| {
                total += o.max(0.0);
                total
            })
            .collect();

        if total > 1.0 {
            for v in &mut cumulative {
                *v /= total;
            }
        }
        OccurrenceTable { cumulative }
    }

    /// Wrap an already cumulative, non-decreasing sequence.
    #[cfg(test)]
    pub fn from_cumulative(values: &[f64]) -> Self {
        debug_assert!(values.windows(2).all(|w| w[0] <= w[1]));
        OccurrenceTable { cumulative: values.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    /// Total probability mass that some sound fires on a draw.
    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f64] {
        &self.cumulative
    }

    /// Index of the leftmost entry `> r`, or `None` if `r` is past the table.
    pub fn select(&self, r: f64) -> Option<usize> {
        if r >= self.total() {
            return None;
        }
        let pos = self.cumulative.partition_point(|&v| v <= r);
        (pos < self.cumulative.len()).then_some(pos)
    }
}
