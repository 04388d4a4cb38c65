use climate_policy_core::{
    ProcessingError, Recommender, SharedRecommender, WeatherQuery, load_samples_csv,
};
use std::io::Write;

const CORPUS: &str = "\
location,month,temperature_c,humidity_pct,wind_kmh,condition
Pune,4,33.0,35,10,Sunny
Mumbai,7,27.5,92,28,Rainy
Delhi,1,9.0,85,4,Foggy
Chennai,11,26.0,88,35,Stormy
Pune,6,29.0,70,18,Cloudy
";

fn corpus_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn fitted() -> Recommender {
    let file = corpus_file(CORPUS);
    Recommender::fit(load_samples_csv(file.path()).unwrap()).unwrap()
}

#[test]
fn test_query_identical_to_third_row_finds_it() {
    let recommender = fitted();
    let query = WeatherQuery {
        location: "Delhi".to_string(),
        month: 1,
        temperature_c: 9.0,
        humidity_pct: 85.0,
        wind_kmh: 4.0,
    };

    let result = recommender.recommend(&query, 1);
    assert_eq!(result.neighbors.len(), 1);
    assert_eq!(result.neighbors[0].sample, recommender.samples()[2]);
    assert!((result.neighbors[0].similarity - 1.0).abs() < 1e-9);
    assert_eq!(result.predicted_condition.as_deref(), Some("Foggy"));
    assert!((result.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn test_unknown_location_still_recommends() {
    let recommender = fitted();
    let query = WeatherQuery {
        location: "Reykjavik".to_string(),
        month: 1,
        temperature_c: 2.0,
        humidity_pct: 80.0,
        wind_kmh: 30.0,
    };

    let vector = recommender.encoder().encode(&query);
    let location_block = recommender.encoder().locations().len();
    assert!(vector[..location_block].iter().all(|v| *v == 0.0));

    let result = recommender.recommend(&query, 3);
    assert_eq!(result.neighbors.len(), 3);
    assert!(result.predicted_condition.is_some());
    for pair in result.neighbors.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_top_n_larger_than_corpus_returns_everything() {
    let recommender = fitted();
    let query = recommender.samples()[0].as_query();

    let result = recommender.recommend(&query, 50);
    assert_eq!(result.neighbors.len(), 5);
    assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
}

#[test]
fn test_zero_top_n_has_zero_confidence() {
    let recommender = fitted();
    let result = recommender.recommend(&recommender.samples()[1].as_query(), 0);

    assert!(result.neighbors.is_empty());
    assert_eq!(result.predicted_condition, None);
    assert_eq!(result.confidence, 0.0);
}

#[test]
fn test_non_finite_query_keeps_confidence_in_range() {
    let recommender = fitted();

    for temperature_c in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let query = WeatherQuery {
            location: "Mumbai".to_string(),
            month: 7,
            temperature_c,
            humidity_pct: 92.0,
            wind_kmh: 28.0,
        };

        let result = recommender.recommend(&query, 2);
        assert_eq!(result.neighbors.len(), 2);
        assert!(result.neighbors.iter().all(|n| n.similarity.is_finite()));
        assert!((0.0..=1.0).contains(&result.confidence), "confidence {}", result.confidence);
        assert_eq!(result.predicted_condition.as_deref(), Some("Rainy"));
    }
}

#[test]
fn test_missing_column_fails_before_fit() {
    let file = corpus_file("location,month,temperature_c,condition\nPune,4,33.0,Sunny\n");
    let err = load_samples_csv(file.path()).unwrap_err();

    match err {
        ProcessingError::Schema { missing, .. } => {
            assert_eq!(missing, vec!["humidity_pct".to_string(), "wind_kmh".to_string()]);
        }
        other => panic!("expected schema error, got {other}"),
    }
}

#[test]
fn test_negative_wind_is_invalid_sample() {
    let file = corpus_file(
        "location,month,temperature_c,humidity_pct,wind_kmh,condition\nPune,4,33.0,35,-1,Sunny\n",
    );
    let err = load_samples_csv(file.path()).unwrap_err();
    assert!(matches!(err, ProcessingError::InvalidSample { row: 1, .. }));
}

#[test]
fn test_shared_recommender_refit_swaps_state() {
    let shared = SharedRecommender::new(fitted());
    let before = shared.snapshot();
    assert_eq!(before.samples().len(), 5);

    let smaller = corpus_file(
        "location,month,temperature_c,humidity_pct,wind_kmh,condition\nOslo,2,-3.0,70,15,Snowy\nOslo,8,18.0,60,12,Sunny\n",
    );
    shared.refit(load_samples_csv(smaller.path()).unwrap()).unwrap();

    let after = shared.snapshot();
    assert_eq!(after.samples().len(), 2);
    // Earlier snapshot is untouched by the swap
    assert_eq!(before.samples().len(), 5);

    let result = shared.recommend(&after.samples()[0].as_query(), 1);
    assert_eq!(result.predicted_condition.as_deref(), Some("Snowy"));
}

#[test]
fn test_concurrent_queries_share_one_fit() {
    let shared = std::sync::Arc::new(SharedRecommender::new(fitted()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                let query = shared.snapshot().samples()[i].as_query();
                shared.recommend(&query, 1).predicted_condition
            })
        })
        .collect();

    let labels: Vec<Option<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        labels,
        vec![
            Some("Sunny".to_string()),
            Some("Rainy".to_string()),
            Some("Foggy".to_string()),
            Some("Stormy".to_string()),
        ]
    );
}
