use proptest::prelude::*;
use rand::SeedableRng;
use tsvis::analysis::{rank_by_peak, select, target_window, window_distance, AttributeCounts};
use tsvis::data::{Comparison, DecisionNode};

const NUM_ATTRIBUTES: usize = 4;
const SERIES_LENGTH: usize = 12;

fn node_strategy() -> impl Strategy<Value = DecisionNode> {
    (0..NUM_ATTRIBUTES, 0..SERIES_LENGTH, 0..SERIES_LENGTH, -5.0f64..5.0, any::<bool>()).prop_map(
        |(attribute, a, b, threshold, greater)| {
            let comparison = if greater {
                Comparison::Greater
            } else {
                Comparison::LessOrEqual
            };
            DecisionNode::new(attribute, a.min(b), a.max(b), threshold, comparison)
        },
    )
}

/// Nodes that touch every attribute, so any top-n selection can be explained
fn covering_nodes() -> impl Strategy<Value = Vec<DecisionNode>> {
    prop::collection::vec(node_strategy(), 0..40).prop_map(|mut nodes| {
        for attribute in 0..NUM_ATTRIBUTES {
            nodes.push(DecisionNode::new(
                attribute,
                0,
                SERIES_LENGTH - 1,
                0.0,
                Comparison::LessOrEqual,
            ));
        }
        nodes
    })
}

fn row_max(row: &[u32]) -> u32 {
    row.iter().copied().max().unwrap_or(0)
}

proptest! {
    #[test]
    fn ranking_takes_highest_maxima_in_index_order(
        rows in prop::collection::vec(prop::collection::vec(0u32..6, 1..8), 1..10),
        n in 1usize..10,
    ) {
        let width = rows[0].len();
        let rows: Vec<Vec<u32>> = rows
            .into_iter()
            .map(|mut r| { r.resize(width, 0); r })
            .collect();

        let ranked = rank_by_peak(&rows, n);
        prop_assert_eq!(ranked.len(), n.min(rows.len()));

        let mut expected: Vec<(usize, u32)> =
            rows.iter().enumerate().map(|(i, r)| (i, row_max(r))).collect();
        expected.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        expected.truncate(n);
        prop_assert_eq!(ranked, expected);
    }

    #[test]
    fn selections_satisfy_peak_and_distance_invariants(
        nodes in covering_nodes(),
        top_n in 1usize..=NUM_ATTRIBUTES,
        seed in any::<u64>(),
    ) {
        let counts = AttributeCounts::from_nodes(&nodes, NUM_ATTRIBUTES, SERIES_LENGTH).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let selections = select(&counts, &nodes, top_n, &mut rng).unwrap();
        prop_assert_eq!(selections.len(), top_n);

        for selection in &selections {
            let row = counts.row(selection.attribute);
            prop_assert_eq!(row[selection.peak_time], row_max(row));
            prop_assert_eq!(selection.peak_count, row_max(row));

            let window = target_window(&nodes, selection.attribute, selection.peak_time).unwrap();
            prop_assert_eq!(window, selection.target);

            let chosen = window_distance(&selection.node, &window);
            for other in nodes.iter().filter(|n| n.attribute == selection.attribute) {
                let distance = window_distance(other, &window);
                prop_assert!(chosen <= distance + 1e-9);
                if (distance - chosen).abs() <= 1e-9 {
                    prop_assert!(selection.node.width() <= other.width());
                }
            }
        }
    }

    #[test]
    fn selection_is_reproducible_for_a_seed(
        nodes in covering_nodes(),
        seed in any::<u64>(),
    ) {
        let counts = AttributeCounts::from_nodes(&nodes, NUM_ATTRIBUTES, SERIES_LENGTH).unwrap();
        let first = select(&counts, &nodes, 2, &mut rand::rngs::StdRng::seed_from_u64(seed)).unwrap();
        let second = select(&counts, &nodes, 2, &mut rand::rngs::StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn zero_rows_is_a_configuration_error() {
    let err = AttributeCounts::from_rows(Vec::new()).unwrap_err();
    assert!(matches!(err, tsvis::VisError::Config(_)));
}
