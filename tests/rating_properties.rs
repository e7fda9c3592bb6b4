use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use recipe_hub::rating::{
    apply_new_rating, apply_rating_update, display_rating, weighted_rating, RatingPrior,
    RatingStats, RatingStore, RatingValue,
};
use std::collections::HashMap;
use std::sync::Arc;

fn rating(value: i64) -> RatingValue {
    RatingValue::new(value).unwrap()
}

#[test]
fn test_sum_invariant_independent_of_order() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let users = rng.gen_range(1..30);
        let mut ops: Vec<(usize, i64)> = (0..users)
            .map(|user| (user, rng.gen_range(1..=5)))
            .collect();
        for _ in 0..rng.gen_range(0..users * 2) {
            ops.push((rng.gen_range(0..users), rng.gen_range(1..=5)));
        }
        ops.shuffle(&mut rng);

        let mut stats = RatingStats::default();
        let mut current: HashMap<usize, RatingValue> = HashMap::new();
        for (user, value) in ops {
            let value = rating(value);
            stats = match current.get(&user) {
                Some(old) => apply_rating_update(stats, *old, value).unwrap(),
                None => apply_new_rating(stats, value).unwrap(),
            };
            current.insert(user, value);
        }

        let expected_sum: u64 = current.values().map(|v| v.get() as u64).sum();
        assert_eq!(stats.rating_count, current.len() as u64);
        assert_eq!(stats.rating_sum, expected_sum);
    }
}

#[test]
fn test_weighted_rating_is_convex_blend() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let count: u64 = rng.gen_range(0..200);
        let sum: u64 = (0..count).map(|_| rng.gen_range(1..=5u64)).sum();
        let prior = RatingPrior::new(rng.gen_range(0..20), rng.gen_range(1.0..=5.0));

        let weighted = weighted_rating(count, sum, &prior);
        let average = if count == 0 {
            prior.prior_mean
        } else {
            sum as f64 / count as f64
        };
        let low = average.min(prior.prior_mean) - 1e-9;
        let high = average.max(prior.prior_mean) + 1e-9;
        assert!(
            (low..=high).contains(&weighted),
            "{} outside [{}, {}] for count={} sum={} prior={:?}",
            weighted,
            low,
            high,
            count,
            sum,
            prior
        );
    }
}

#[test]
fn test_weighted_rating_converges_to_average() {
    let prior = RatingPrior::new(5, 3.0);
    let mut previous_gap = f64::MAX;
    for count in [10u64, 100, 1_000, 10_000, 1_000_000] {
        let weighted = weighted_rating(count, count * 5, &prior);
        let gap = (5.0 - weighted).abs();
        assert!(gap < previous_gap);
        previous_gap = gap;
    }
    assert!(previous_gap < 1e-4);
}

#[test]
fn test_zero_data() {
    let prior = RatingPrior::new(5, 3.7);
    assert_eq!(weighted_rating(0, 0, &prior), 3.7);
    assert!(!display_rating(weighted_rating(0, 0, &prior), 0).has_ratings);
}

#[tokio::test]
async fn test_two_ratings_example() {
    let store = RatingStore::new();
    store.create_recipe("recipe-1").await;
    store.submit_rating("recipe-1", "u1", 1).await.unwrap();
    store.submit_rating("recipe-1", "u2", 5).await.unwrap();

    let summary = store.summary("recipe-1", &RatingPrior::new(5, 3.0)).await.unwrap();
    assert_eq!(summary.stats, RatingStats::new(2, 6));
    assert_eq!(summary.simple_average, 3.0);
    assert!((summary.weighted_rating - 3.0).abs() < 1e-12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_lose_no_updates() {
    let store = Arc::new(RatingStore::new());
    store.create_recipe("popular").await;

    let mut handles = Vec::new();
    for user in 0..200 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let user_id = format!("user-{}", user);
            store.submit_rating("popular", &user_id, 2).await.unwrap();
            store
                .submit_rating("popular", &user_id, (user % 5 + 1) as i64)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let expected_sum: u64 = (0..200u64).map(|user| user % 5 + 1).sum();
    let stats = store.stats("popular").await.unwrap();
    assert_eq!(stats, RatingStats::new(200, expected_sum));

    let audit = store.audit("popular", &RatingPrior::default()).await.unwrap();
    assert!(!audit.has_drift);
}
