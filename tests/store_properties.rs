use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use herakles_proc_mem_graph::error::InvalidSampleError;
use herakles_proc_mem_graph::metric::MetricKind;
use herakles_proc_mem_graph::store::{ProcessExtrema, PutOutcome, Sample, TimeSeriesStore};

const MB: i64 = 1024 * 1024;

fn moments(store: &TimeSeriesStore, pid: u32, kind: MetricKind) -> Vec<i64> {
    store
        .get_series(pid)
        .into_iter()
        .find(|s| s.kind == kind)
        .map(|s| s.points.iter().map(|p| p.moment).collect())
        .unwrap_or_default()
}

#[test]
fn two_samples_end_to_end() {
    let mut store = TimeSeriesStore::new();
    store.put(100, MetricKind::Rss, 0, MB).unwrap();
    store.put(100, MetricKind::Rss, 10, 2 * MB).unwrap();

    assert_eq!(
        store.get_extrema(100),
        Some(ProcessExtrema {
            min_moment: 0,
            max_moment: 10,
            max_kb: 2048
        })
    );
    let series = store.get_series(100);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].kind, MetricKind::Rss);
    assert_eq!(series[0].points, vec![Sample::new(0, 1024), Sample::new(10, 2048)]);
}

#[test]
fn shuffled_insertion_yields_sorted_unique_series() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let mut order: Vec<i64> = (0..200).map(|i| i * 10).collect();
        // every moment twice, in random order
        order.extend_from_within(..);
        order.shuffle(&mut rng);

        let mut store = TimeSeriesStore::new();
        let mut duplicates = 0;
        for &moment in &order {
            if store.put(1, MetricKind::Pss, moment, moment * 1024).unwrap() == PutOutcome::Duplicate {
                duplicates += 1;
            }
        }

        assert_eq!(duplicates, 200);
        let stored = moments(&store, 1, MetricKind::Pss);
        assert_eq!(stored, (0..200).map(|i| i * 10).collect::<Vec<_>>());
        let extrema = store.get_extrema(1).unwrap();
        assert_eq!((extrema.min_moment, extrema.max_moment), (0, 1990));
        assert_eq!(extrema.max_kb, 1990);
    }
}

#[test]
fn duplicate_moment_keeps_first_amount() {
    let mut store = TimeSeriesStore::new();
    store.put(1, MetricKind::Rss, 5, MB).unwrap();
    assert_eq!(store.put(1, MetricKind::Rss, 5, 9 * MB), Ok(PutOutcome::Duplicate));
    assert_eq!(store.get_series(1)[0].points, vec![Sample::new(5, 1024)]);
    assert_eq!(store.get_extrema(1).unwrap().max_kb, 1024);
}

#[test]
fn overflow_drops_oldest_and_repairs_extrema() {
    let capacity = 5;
    let mut store = TimeSeriesStore::with_capacity(capacity);
    // the largest amount arrives first and must disappear with it
    let amounts = [90, 10, 20, 30, 40, 50, 60, 70];
    let mut evicted = 0;
    for (i, &mb) in amounts.iter().enumerate() {
        if let PutOutcome::Inserted { evicted: n } =
            store.put(7, MetricKind::Rss, i as i64 * 10, mb * MB).unwrap()
        {
            evicted += n;
        }
    }

    assert_eq!(evicted, 3);
    assert_eq!(store.series_len(7, MetricKind::Rss), capacity);
    assert_eq!(moments(&store, 7, MetricKind::Rss), vec![30, 40, 50, 60, 70]);
    let extrema = store.get_extrema(7).unwrap();
    assert_eq!(extrema.min_moment, 30);
    assert_eq!(extrema.max_moment, 70);
    assert_eq!(extrema.max_kb, 70 * 1024);
}

#[test]
fn eviction_clips_sibling_series() {
    let mut store = TimeSeriesStore::with_capacity(3);
    store.put(9, MetricKind::Pss, 0, 5 * MB).unwrap();
    store.put(9, MetricKind::Pss, 20, MB).unwrap();
    for moment in [0, 10, 20, 30] {
        store.put(9, MetricKind::Rss, moment, 2 * MB).unwrap();
    }

    assert_eq!(moments(&store, 9, MetricKind::Rss), vec![10, 20, 30]);
    assert_eq!(moments(&store, 9, MetricKind::Pss), vec![20]);
    let extrema = store.get_extrema(9).unwrap();
    assert_eq!(extrema.min_moment, 10);
    assert_eq!(extrema.max_kb, 2048);
}

#[test]
fn negative_amount_leaves_store_untouched() {
    let mut store = TimeSeriesStore::new();
    store.put(3, MetricKind::Rss, 0, MB).unwrap();
    let before = store.get_series(3);

    let err = store.put(3, MetricKind::Rss, 10, -1).unwrap_err();
    assert!(matches!(err, InvalidSampleError::NegativeAmount { pid: 3, bytes: -1 }));
    assert_eq!(store.get_series(3), before);
    assert!(store.put(4, MetricKind::Rss, 0, -5).is_err());
    assert!(!store.has_process(4));
}

#[test]
fn deletion_is_idempotent_and_isolated() {
    let mut store = TimeSeriesStore::new();
    store.put(1, MetricKind::Rss, 0, MB).unwrap();
    store.put(2, MetricKind::Rss, 0, MB).unwrap();

    assert!(store.delete_process(1));
    assert!(!store.delete_process(1));
    assert!(store.get_series(1).is_empty());
    assert_eq!(store.get_extrema(1), None);
    assert!(store.has_data(2));
    assert_eq!(store.process_ids(), vec![2]);
}

#[test]
fn registered_process_has_sentinel_extrema() {
    let mut store = TimeSeriesStore::new();
    assert!(store.register_process(11));
    assert!(!store.register_process(11));

    let extrema = store.get_extrema(11).unwrap();
    assert_eq!(extrema, ProcessExtrema::EMPTY);
    assert!(!extrema.has_data());
    assert!(store.is_empty());

    store.put(11, MetricKind::Uss, 4, 512).unwrap();
    assert_eq!(store.get_extrema(11).unwrap().max_kb, 1);
}
