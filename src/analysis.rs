use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{attribute_name, DecisionNode};
use crate::error::{Result, VisError};
use crate::verify::validate_nodes;

/// Distances closer than this are treated as ties
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// Per (attribute, time point) count of decision nodes whose interval covers it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCounts {
    rows: Vec<Vec<u32>>,
}

impl AttributeCounts {
    /// Fold the node stream into a table of `num_attributes` x `series_length`
    pub fn from_nodes(
        nodes: &[DecisionNode],
        num_attributes: usize,
        series_length: usize,
    ) -> Result<Self> {
        if num_attributes == 0 || series_length == 0 {
            return Err(VisError::Config(format!(
                "count table needs at least one attribute and one time point (got {} x {})",
                num_attributes, series_length
            )));
        }
        validate_nodes(nodes, num_attributes, series_length)?;

        let rows = nodes.iter().fold(
            vec![vec![0u32; series_length]; num_attributes],
            |mut rows, node| {
                for count in &mut rows[node.attribute][node.interval_start..=node.interval_end] {
                    *count += 1;
                }
                rows
            },
        );

        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self> {
        let width = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(VisError::Config(
                    "count table has no attribute rows".to_string(),
                ))
            }
        };
        if width == 0 {
            return Err(VisError::Config("count table has no time points".to_string()));
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(VisError::Validation(format!(
                "count row {} has {} time points, expected {}",
                idx,
                row.len(),
                width
            )));
        }
        Ok(Self { rows })
    }

    pub fn num_attributes(&self) -> usize {
        self.rows.len()
    }

    pub fn series_length(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn row(&self, attribute: usize) -> &[u32] {
        &self.rows[attribute]
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }
}

/// Target window: mean start and mean end of the intervals covering the peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetWindow {
    pub start: f64,
    pub end: f64,
}

/// One explained attribute and the interval chosen to represent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub attribute: usize,
    pub name: String,
    pub peak_time: usize,
    pub peak_count: u32,
    pub target: TargetWindow,
    pub node: DecisionNode,
}

/// Rows ordered by their maximum, descending; equal maxima keep row order.
///
/// Returns at most `n` `(row, peak)` pairs. Empty rows are skipped.
pub fn rank_by_peak<T>(rows: &[Vec<T>], n: usize) -> Vec<(usize, T)>
where
    T: Copy + PartialOrd,
{
    let mut peaks: Vec<(usize, T)> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row_peak(row).map(|peak| (idx, peak)))
        .collect();

    // stable sort keeps ascending index among ties
    peaks.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    peaks.truncate(n);
    peaks
}

fn row_peak<T: Copy + PartialOrd>(row: &[T]) -> Option<T> {
    row.iter()
        .copied()
        .fold(None, |best, value| match best {
            Some(b) if b >= value => Some(b),
            _ => Some(value),
        })
}

/// Pick one of the time points where `row` reaches `peak`, uniformly at random
pub fn peak_time_point<R: Rng + ?Sized>(row: &[u32], peak: u32, rng: &mut R) -> Option<usize> {
    let candidates: Vec<usize> = row
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == peak)
        .map(|(t, _)| t)
        .collect();
    candidates.choose(rng).copied()
}

/// Mean bounds of the `attribute` intervals that contain `time_point`
pub fn target_window(
    nodes: &[DecisionNode],
    attribute: usize,
    time_point: usize,
) -> Option<TargetWindow> {
    let (count, start_sum, end_sum) = nodes
        .iter()
        .filter(|n| n.attribute == attribute && n.contains(time_point))
        .fold((0usize, 0.0f64, 0.0f64), |(c, s, e), n| {
            (c + 1, s + n.interval_start as f64, e + n.interval_end as f64)
        });

    if count == 0 {
        return None;
    }
    Some(TargetWindow {
        start: start_sum / count as f64,
        end: end_sum / count as f64,
    })
}

/// L1 distance of a node's bounds to the target window
pub fn window_distance(node: &DecisionNode, window: &TargetWindow) -> f64 {
    (node.interval_start as f64 - window.start).abs() + (node.interval_end as f64 - window.end).abs()
}

/// Node of `attribute` closest to `window`; narrower intervals win ties
pub fn representative_node(
    nodes: &[DecisionNode],
    attribute: usize,
    window: &TargetWindow,
) -> Option<DecisionNode> {
    let mut best: Option<&DecisionNode> = None;
    let mut best_distance = f64::INFINITY;

    for node in nodes.iter().filter(|n| n.attribute == attribute) {
        let distance = window_distance(node, window);
        let closer = distance < best_distance - DISTANCE_TOLERANCE;
        let tied_narrower = (distance - best_distance).abs() <= DISTANCE_TOLERANCE
            && best.map_or(true, |b| node.width() < b.width());

        if closer || tied_narrower {
            best = Some(node);
            best_distance = distance;
        }
    }

    best.copied()
}

/// Rank attributes by peak count and pick a representative interval for each.
///
/// `nodes` must already be restricted to trees that agree with the ensemble
/// prediction. The random source only breaks ties between equal peak time
/// points, so a seeded `rng` makes the result reproducible.
pub fn select<R: Rng + ?Sized>(
    counts: &AttributeCounts,
    nodes: &[DecisionNode],
    top_n: usize,
    rng: &mut R,
) -> Result<Vec<Selection>> {
    let num_attributes = counts.num_attributes();
    if num_attributes == 0 {
        return Err(VisError::Config("no attributes to rank".to_string()));
    }
    if top_n == 0 || top_n > num_attributes {
        return Err(VisError::Config(format!(
            "cannot select top {} of {} attributes",
            top_n, num_attributes
        )));
    }
    validate_nodes(nodes, num_attributes, counts.series_length())?;

    let ranked = rank_by_peak(counts.rows(), top_n);
    let mut selections = Vec::with_capacity(ranked.len());

    for (attribute, peak_count) in ranked {
        let peak_time = peak_time_point(counts.row(attribute), peak_count, rng)
            .ok_or(VisError::NoRepresentativeInterval { attribute })?;
        let target = target_window(nodes, attribute, peak_time)
            .ok_or(VisError::NoRepresentativeInterval { attribute })?;
        let node = representative_node(nodes, attribute, &target)
            .ok_or(VisError::NoRepresentativeInterval { attribute })?;

        debug!(
            attribute,
            peak_count,
            peak_time,
            target_start = target.start,
            target_end = target.end,
            interval_start = node.interval_start,
            interval_end = node.interval_end,
            "selected representative interval"
        );

        selections.push(Selection {
            attribute,
            name: attribute_name(attribute),
            peak_time,
            peak_count,
            target,
            node,
        });
    }

    Ok(selections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Comparison;
    use rand::SeedableRng;

    fn node(attribute: usize, start: usize, end: usize) -> DecisionNode {
        DecisionNode::new(attribute, start, end, 0.5, Comparison::LessOrEqual)
    }

    fn rng(seed: u64) -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(seed)
    }

    #[test]
    fn counts_fold_is_inclusive() {
        let nodes = vec![node(0, 1, 3), node(0, 3, 4), node(1, 0, 0)];
        let counts = AttributeCounts::from_nodes(&nodes, 2, 5).unwrap();

        assert_eq!(counts.row(0), &[0, 1, 1, 2, 1]);
        assert_eq!(counts.row(1), &[1, 0, 0, 0, 0]);
    }

    #[test]
    fn counts_reject_out_of_range_nodes() {
        let err = AttributeCounts::from_nodes(&[node(2, 0, 1)], 2, 5).unwrap_err();
        assert!(matches!(err, VisError::Validation(_)));
    }

    #[test]
    fn from_rows_rejects_ragged_and_empty_tables() {
        let err = AttributeCounts::from_rows(vec![vec![1, 2], vec![1]]).unwrap_err();
        assert!(matches!(err, VisError::Validation(_)));

        let err = AttributeCounts::from_rows(Vec::new()).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));
    }

    #[test]
    fn rank_by_peak_is_stable_with_ties() {
        let rows = vec![vec![1, 2], vec![5, 0], vec![2, 2], vec![0, 5]];
        let ranked = rank_by_peak(&rows, 3);
        assert_eq!(ranked, vec![(1, 5), (3, 5), (0, 2)]);
    }

    #[test]
    fn rank_by_peak_works_on_curves() {
        let curves = vec![vec![0.1, 0.3], vec![0.9, 0.0], vec![0.2, 0.2]];
        let ranked: Vec<usize> = rank_by_peak(&curves, 2).into_iter().map(|(i, _)| i).collect();
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn peak_time_point_stays_in_peak_set() {
        let row = [1, 3, 0, 3, 2];
        for seed in 0..20 {
            let t = peak_time_point(&row, 3, &mut rng(seed)).unwrap();
            assert!(t == 1 || t == 3);
        }
    }

    #[test]
    fn target_window_averages_covering_nodes() {
        let nodes = vec![node(0, 0, 4), node(0, 2, 6), node(0, 5, 8), node(1, 0, 8)];
        let window = target_window(&nodes, 0, 3).unwrap();
        assert_eq!(window, TargetWindow { start: 1.0, end: 5.0 });
        assert!(target_window(&nodes, 2, 3).is_none());
    }

    #[test]
    fn representative_prefers_narrower_on_ties() {
        let nodes = vec![node(0, 0, 2), node(0, 1, 2)];
        let window = TargetWindow { start: 0.5, end: 2.0 };
        let chosen = representative_node(&nodes, 0, &window).unwrap();
        assert_eq!((chosen.interval_start, chosen.interval_end), (1, 2));
    }

    #[test]
    fn representative_keeps_earliest_on_full_tie() {
        let nodes = vec![
            node(1, 0, 0),
            DecisionNode::new(0, 2, 4, 0.7, Comparison::Greater),
            DecisionNode::new(0, 2, 4, -0.3, Comparison::LessOrEqual),
        ];
        let window = TargetWindow { start: 2.0, end: 4.0 };
        let chosen = representative_node(&nodes, 0, &window).unwrap();
        assert_eq!(chosen, nodes[1]);

        let reversed = vec![nodes[2], nodes[1]];
        let chosen = representative_node(&reversed, 0, &window).unwrap();
        assert_eq!(chosen.threshold, -0.3);
    }

    #[test]
    fn representative_scans_nodes_outside_the_peak() {
        // the closest node need not contain the peak itself
        let nodes = vec![node(0, 0, 9), node(0, 3, 5)];
        let window = TargetWindow { start: 3.2, end: 5.1 };
        let chosen = representative_node(&nodes, 0, &window).unwrap();
        assert_eq!(chosen.interval_start, 3);
    }

    #[test]
    fn select_worked_example() {
        // attribute 0 peaks at 3 over t=1..2; both nodes cover t=1 and t=2
        let counts = AttributeCounts::from_rows(vec![vec![1, 3, 3], vec![2, 2, 2]]).unwrap();
        let nodes = vec![
            DecisionNode::new(0, 0, 2, 0.5, Comparison::Greater),
            DecisionNode::new(0, 1, 2, 0.3, Comparison::LessOrEqual),
        ];

        for seed in 0..10 {
            let selections = select(&counts, &nodes, 1, &mut rng(seed)).unwrap();
            assert_eq!(selections.len(), 1);

            let s = &selections[0];
            assert_eq!(s.attribute, 0);
            assert_eq!(s.peak_count, 3);
            assert!(s.peak_time == 1 || s.peak_time == 2);
            assert_eq!(s.target, TargetWindow { start: 0.5, end: 2.0 });
            assert_eq!(s.node, nodes[1]);
            assert_eq!(s.name, "DN_HistogramMode_5");
        }
    }

    #[test]
    fn select_is_reproducible_with_same_seed() {
        let nodes = vec![node(0, 0, 3), node(0, 4, 7), node(1, 2, 5), node(2, 0, 7)];
        let counts = AttributeCounts::from_nodes(&nodes, 3, 8).unwrap();

        let first = select(&counts, &nodes, 3, &mut rng(9)).unwrap();
        let second = select(&counts, &nodes, 3, &mut rng(9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn select_rejects_bad_top_n() {
        let counts = AttributeCounts::from_rows(vec![vec![1, 2]]).unwrap();
        let nodes = vec![node(0, 0, 1)];

        let err = select(&counts, &nodes, 0, &mut rng(0)).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));
        let err = select(&counts, &nodes, 2, &mut rng(0)).unwrap_err();
        assert!(matches!(err, VisError::Config(_)));
    }

    #[test]
    fn select_reports_missing_interval() {
        // counts claim a peak the node list cannot explain
        let counts = AttributeCounts::from_rows(vec![vec![0, 4, 0], vec![1, 1, 1]]).unwrap();
        let nodes = vec![node(0, 2, 2), node(1, 0, 2)];

        let err = select(&counts, &nodes, 1, &mut rng(0)).unwrap_err();
        assert!(matches!(err, VisError::NoRepresentativeInterval { attribute: 0 }));
    }

    #[test]
    fn select_reports_empty_node_list() {
        let counts = AttributeCounts::from_rows(vec![vec![0, 0]]).unwrap();
        let err = select(&counts, &[], 1, &mut rng(0)).unwrap_err();
        assert!(matches!(err, VisError::NoRepresentativeInterval { attribute: 0 }));
    }
}
