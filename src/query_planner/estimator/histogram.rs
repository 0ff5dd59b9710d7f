use indexmap::IndexMap;

use crate::query_planner::match_graph::HistogramBucket;

/// Decodes the sampling probe's sink blob: eight little-endian bytes per
/// id. `None` when the blob is not a whole number of ids.
pub fn decode_sink_blob(blob: &[u8]) -> Option<Vec<i64>> {
    if blob.len() % 8 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(8)
            .map(|chunk| i64::from_le_bytes(chunk.try_into().expect("chunk is eight bytes")))
            .collect(),
    )
}

/// Folds sampled sink ids into the histogram as equality buckets.
pub fn update_edge_histogram(histogram: &mut IndexMap<i64, HistogramBucket>, sink_ids: &[i64]) {
    for &sink_id in sink_ids {
        histogram
            .entry(sink_id)
            .and_modify(|bucket| bucket.height += 1.0)
            .or_insert(HistogramBucket {
                height: 1.0,
                is_range: false,
            });
    }
}

/// Unions another histogram in, summing bucket heights. Used when an
/// edge view combines its member edges.
pub fn merge_histograms(
    into: &mut IndexMap<i64, HistogramBucket>,
    other: &IndexMap<i64, HistogramBucket>,
) {
    for (&sink_id, bucket) in other {
        into.entry(sink_id)
            .and_modify(|existing| {
                existing.height += bucket.height;
                existing.is_range |= bucket.is_range;
            })
            .or_insert_with(|| bucket.clone());
    }
}

pub fn histogram_total(histogram: &IndexMap<i64, HistogramBucket>) -> f64 {
    histogram.values().map(|bucket| bucket.height).sum()
}

/// Caps histogram resolution: beyond `cap` distinct ids the buckets
/// collapse into equal-width ranges keyed by their lower bound.
pub fn collapse_to_ranges(
    histogram: IndexMap<i64, HistogramBucket>,
    cap: usize,
) -> IndexMap<i64, HistogramBucket> {
    if histogram.len() <= cap {
        return histogram;
    }
    let min = histogram.keys().copied().min().unwrap_or(0);
    let max = histogram.keys().copied().max().unwrap_or(0);
    let span = (max - min + 1) as u64;
    let width = span.div_ceil(cap as u64).max(1) as i64;

    let mut collapsed: IndexMap<i64, HistogramBucket> = IndexMap::new();
    for (sink_id, bucket) in histogram {
        let range_start = min + ((sink_id - min) / width) * width;
        collapsed
            .entry(range_start)
            .and_modify(|existing| existing.height += bucket.height)
            .or_insert(HistogramBucket {
                height: bucket.height,
                is_range: true,
            });
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sink_blob_roundtrip() {
        let mut blob = Vec::new();
        for id in [1i64, 5, 5, 9] {
            blob.extend_from_slice(&id.to_le_bytes());
        }
        assert_eq!(decode_sink_blob(&blob), Some(vec![1, 5, 5, 9]));
    }

    #[test]
    fn test_decode_sink_blob_rejects_misaligned() {
        assert_eq!(decode_sink_blob(&[1, 2, 3]), None);
    }

    #[test]
    fn test_update_edge_histogram_counts_frequencies() {
        let mut histogram = IndexMap::new();
        update_edge_histogram(&mut histogram, &[7, 7, 8]);
        assert_eq!(histogram[&7].height, 2.0);
        assert_eq!(histogram[&8].height, 1.0);
        assert!(!histogram[&7].is_range);
    }

    #[test]
    fn test_merge_histograms_sums_heights() {
        let mut left = IndexMap::new();
        update_edge_histogram(&mut left, &[1, 2]);
        let mut right = IndexMap::new();
        update_edge_histogram(&mut right, &[2, 3]);
        merge_histograms(&mut left, &right);
        assert_eq!(left[&2].height, 2.0);
        assert_eq!(histogram_total(&left), 4.0);
    }

    #[test]
    fn test_collapse_to_ranges_keeps_total() {
        let mut histogram = IndexMap::new();
        update_edge_histogram(&mut histogram, &(0..100).collect::<Vec<i64>>());
        let collapsed = collapse_to_ranges(histogram, 10);
        assert!(collapsed.len() <= 10);
        assert_eq!(histogram_total(&collapsed), 100.0);
        assert!(collapsed.values().all(|bucket| bucket.is_range));
    }

    #[test]
    fn test_collapse_under_cap_is_identity() {
        let mut histogram = IndexMap::new();
        update_edge_histogram(&mut histogram, &[1, 2, 3]);
        let collapsed = collapse_to_ranges(histogram.clone(), 10);
        assert_eq!(collapsed, histogram);
    }
}
