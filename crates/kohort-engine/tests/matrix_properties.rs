use kohort_engine::{
    bucket::{ActorSet, BucketKey, TimeBucket},
    matrix::compute_retention,
    query::{QueryId, QuerySpec},
};
use proptest::prelude::*;

const DAY_MS: i64 = 86_400_000;

fn actor_sets() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..16, 0..12), 0..10)
}

fn to_set(ids: &[u8]) -> ActorSet {
    ids.iter().map(|id| format!("u{id}")).collect()
}

fn single_query_buckets(query: &QuerySpec, sets: &[Vec<u8>]) -> Vec<TimeBucket> {
    sets.iter()
        .zip(0..)
        .map(|(ids, day)| {
            TimeBucket::new(BucketKey::from_millis(day * DAY_MS)).with_actors(query.id, to_set(ids))
        })
        .collect()
}

proptest! {
    #[test]
    fn matrix_is_upper_triangular(sets in actor_sets()) {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = single_query_buckets(&query, &sets);
        let matrix = compute_retention(&buckets, &query, None).unwrap();

        let n = sets.len();
        prop_assert_eq!(matrix.len(), n * (n + 1) / 2);
        for cell in matrix.cells() {
            prop_assert!(cell.target_index >= cell.origin_index);
            prop_assert!(cell.target_index < n);
        }
    }

    #[test]
    fn cells_are_row_major(sets in actor_sets()) {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = single_query_buckets(&query, &sets);
        let matrix = compute_retention(&buckets, &query, None).unwrap();

        let order = matrix
            .cells()
            .iter()
            .map(|cell| (cell.origin_index, cell.target_index))
            .collect::<Vec<_>>();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        prop_assert_eq!(order, sorted);
    }

    #[test]
    fn diagonal_is_self_identity(sets in actor_sets()) {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = single_query_buckets(&query, &sets);
        let matrix = compute_retention(&buckets, &query, None).unwrap();

        for i in 0..sets.len() {
            let cell = matrix.cell(i, i).unwrap();
            prop_assert_eq!(cell.intersection_count, cell.origin_count);
            if cell.origin_count == 0 {
                prop_assert!(cell.retention_percent.is_undefined());
            } else {
                prop_assert_eq!(cell.retention_percent.value(), Some(100.0));
            }
        }
    }

    #[test]
    fn intersection_is_bounded(sets in actor_sets(), targets in actor_sets()) {
        let a = QuerySpec::new(QueryId::new(0), "a");
        let b = QuerySpec::new(QueryId::new(1), "b");
        let buckets = sets
            .iter()
            .zip(targets.iter().chain(std::iter::repeat(&Vec::new())))
            .zip(0..)
            .map(|((origin, target), day)| {
                TimeBucket::new(BucketKey::from_millis(day * DAY_MS))
                    .with_actors(a.id, to_set(origin))
                    .with_actors(b.id, to_set(target))
            })
            .collect::<Vec<_>>();
        let matrix = compute_retention(&buckets, &a, Some(&b)).unwrap();

        for cell in matrix.cells() {
            prop_assert!(cell.intersection_count <= cell.origin_count.min(cell.target_count));
            match cell.retention_percent.value() {
                Some(percent) => {
                    prop_assert!(cell.origin_count > 0);
                    prop_assert!((0.0..=100.0).contains(&percent));
                }
                None => prop_assert_eq!(cell.origin_count, 0),
            }
        }
        prop_assert_eq!(
            matrix.max_intersection(),
            matrix.cells().iter().map(|c| c.intersection_count).max().unwrap_or(0)
        );
    }

    #[test]
    fn counts_match_actor_sets(sets in actor_sets()) {
        let query = QuerySpec::new(QueryId::new(0), "*");
        let buckets = single_query_buckets(&query, &sets);
        let matrix = compute_retention(&buckets, &query, None).unwrap();

        for cell in matrix.cells() {
            let origin = buckets[cell.origin_index].actors(query.id).unwrap();
            let target = buckets[cell.target_index].actors(query.id).unwrap();
            let expected = origin.iter().filter(|actor| target.contains(actor)).count();
            prop_assert_eq!(cell.origin_count, origin.len());
            prop_assert_eq!(cell.target_count, target.len());
            prop_assert_eq!(cell.intersection_count, expected);
        }
    }
}
