//! Core data model shared across the comparison pipeline.

use std::collections::BTreeMap;
use std::fmt;

/// The score reported when a similarity could not be computed.
///
/// Overloaded with a genuine zero-similarity result; the exported table does
/// not distinguish the two.
pub const SENTINEL_SCORE: f64 = 0.0;

/// One unit of input work: a website plus its two reference image locators.
///
/// The index is assigned once at input-read time and carried through every
/// downstream structure; it defines the ordering of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// Stable ordinal position of the row in the input sheet.
    pub index: usize,
    /// Locator for the mobile reference image (may be a sharing link).
    pub mobile_reference: String,
    /// Locator for the desktop reference image (may be a sharing link).
    pub desktop_reference: String,
    /// Live website URL, possibly missing a scheme.
    pub website_url: String,
}

/// An opaque, immutable raster image payload.
///
/// Produced by the fetcher or renderer, consumed exactly once by the scorer
/// or persisted to disk. Never mutated after creation.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    /// Wraps raw image bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes in the payload.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for ImageBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBytes").field("len", &self.len()).finish()
    }
}

/// Named rendering configuration used when capturing a live page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportProfile {
    /// Full desktop window, 1920x1080.
    Desktop,
    /// Phone-sized window with a mobile user agent.
    Mobile,
}

impl ViewportProfile {
    /// Browser window size for this profile.
    pub fn window_size(self) -> (u32, u32) {
        match self {
            Self::Desktop => (1920, 1080),
            Self::Mobile => (390, 844),
        }
    }

    /// Stable lowercase label used in file names and logs.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for ViewportProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Per-row similarity outcome, written exactly once by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowResult {
    /// Index of the originating input row.
    pub index: usize,
    /// Mobile similarity in [0,100], or the sentinel.
    pub mobile_similarity: f64,
    /// Desktop similarity in [0,100], or the sentinel.
    pub desktop_similarity: f64,
}

impl RowResult {
    /// Builds a result from two computed scores.
    pub fn new(index: usize, mobile_similarity: f64, desktop_similarity: f64) -> Self {
        Self {
            index,
            mobile_similarity,
            desktop_similarity,
        }
    }

    /// The fully degraded result for a row whose processing failed outright.
    pub fn failed(index: usize) -> Self {
        Self::new(index, SENTINEL_SCORE, SENTINEL_SCORE)
    }
}

/// Completed run output: a total mapping from every input index to one result.
///
/// Results merge in arbitrary completion order; iteration is always ordered
/// by the original row index.
#[derive(Debug, Default)]
pub struct OutputTable {
    results: BTreeMap<usize, RowResult>,
}

impl OutputTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one row result, keyed by its index.
    ///
    /// The coordinator is the only writer; a repeated index indicates a
    /// dispatch bug and keeps the first value.
    pub fn merge(&mut self, result: RowResult) {
        if let Some(existing) = self.results.get(&result.index) {
            log::warn!(
                "duplicate result for row {} (kept first: {existing:?})",
                result.index
            );
            return;
        }
        self.results.insert(result.index, result);
    }

    /// Looks up the result for an input index.
    pub fn get(&self, index: usize) -> Option<&RowResult> {
        self.results.get(&index)
    }

    /// Number of merged results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the table holds no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterates results in input-index order.
    pub fn iter(&self) -> impl Iterator<Item = &RowResult> {
        self.results.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keys_by_index_not_arrival_order() {
        let mut table = OutputTable::new();
        table.merge(RowResult::new(2, 50.0, 60.0));
        table.merge(RowResult::new(0, 10.0, 20.0));
        table.merge(RowResult::new(1, 30.0, 40.0));

        let indexes: Vec<usize> = table.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_merge_keeps_first_result() {
        let mut table = OutputTable::new();
        table.merge(RowResult::new(0, 42.0, 42.0));
        table.merge(RowResult::new(0, 99.0, 99.0));

        assert_eq!(table.len(), 1);
        let kept = table.get(0).expect("result present");
        assert_eq!(kept.mobile_similarity, 42.0);
    }

    #[test]
    fn failed_result_carries_sentinels() {
        let result = RowResult::failed(7);
        assert_eq!(result.index, 7);
        assert_eq!(result.mobile_similarity, SENTINEL_SCORE);
        assert_eq!(result.desktop_similarity, SENTINEL_SCORE);
    }

    #[test]
    fn image_bytes_debug_hides_payload() {
        let bytes = ImageBytes::new(vec![1, 2, 3]);
        assert_eq!(format!("{bytes:?}"), "ImageBytes { len: 3 }");
    }
}
