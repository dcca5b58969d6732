/// Integration tests for the churn prediction pipeline
///
/// Run with: cargo test --test integration_tests -- --nocapture

use churn_predictor::model::forest::DecisionTree;
use churn_predictor::{
    encode, ChurnError, ChurnLabel, ChurnPipeline, ChurnPredictor, FeatureSchema, RandomForest,
    RawInput, ServiceConfig,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

const TENURE: usize = 3;
const CONTRACT: usize = 16;

/// Two stumps: short tenure and month-to-month contracts lean towards churn.
fn telco_forest() -> RandomForest {
    let names = FeatureSchema::telco()
        .field_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    RandomForest::new(
        19,
        vec![
            DecisionTree::stump(TENURE, 12.5, [30.0, 70.0], [80.0, 20.0]),
            DecisionTree::stump(CONTRACT, 0.5, [40.0, 60.0], [90.0, 10.0]),
        ],
    )
    .unwrap()
    .with_feature_names(names)
    .unwrap()
}

fn telco_pipeline() -> ChurnPipeline {
    ChurnPipeline::new(
        FeatureSchema::telco(),
        None,
        ChurnPredictor::new(Arc::new(telco_forest())),
    )
    .unwrap()
}

fn raw(pairs: &[(&str, &str)]) -> RawInput {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Every field set explicitly, categoricals at their first option.
fn reference_customer() -> RawInput {
    let schema = FeatureSchema::telco();
    let mut input = raw(&[
        ("MonthlyCharges", "70.35"),
        ("TotalCharges", "1397.475"),
        ("SeniorCitizen", "0"),
        ("tenure", "1"),
    ]);
    for field in schema.categoricals() {
        if let churn_predictor::FieldSpec::Categorical { name, options } = field {
            input.insert(name.clone(), options[0].clone());
        }
    }
    input
}

fn forest_json() -> String {
    let names: Vec<String> = FeatureSchema::telco()
        .field_names()
        .iter()
        .map(|s| format!("{:?}", s))
        .collect();
    format!(
        r#"{{
            "n_features": 19,
            "feature_names": [{}],
            "trees": [
                {{
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [{}, -2, -2],
                    "threshold": [12.5, -2.0, -2.0],
                    "value": [[110.0, 90.0], [30.0, 70.0], [80.0, 20.0]]
                }},
                {{
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [{}, -2, -2],
                    "threshold": [0.5, -2.0, -2.0],
                    "value": [[130.0, 70.0], [40.0, 60.0], [90.0, 10.0]]
                }}
            ]
        }}"#,
        names.join(", "),
        TENURE,
        CONTRACT
    )
}

fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn config(model: &NamedTempFile, scaler: Option<&NamedTempFile>) -> ServiceConfig {
    ServiceConfig {
        model_path: model.path().to_path_buf(),
        scaler_path: scaler.map(|s| s.path().to_path_buf()),
        schema_path: None,
        log_predictions: false,
    }
}

#[test]
fn test_reference_customer_end_to_end() {
    println!("\n=== Test: Reference Customer End To End ===");
    let pipeline = telco_pipeline();

    let result = pipeline.predict(&reference_customer()).unwrap();
    println!("✓ {} -> {:?}", result.headline(), result.probability);

    assert_eq!(result.predicted_label, ChurnLabel::Churn);
    assert!((0.0..=100.0).contains(&result.churn_percent));
    assert!((0.0..=100.0).contains(&result.no_churn_percent));
    assert!((result.churn_percent + result.no_churn_percent - 100.0).abs() < 1e-6);
    assert!((result.probability[1] - 0.65).abs() < 1e-9);
    assert_eq!(
        result.headline(),
        "Percentage of this customer leaving is: 65%"
    );
}

#[test]
fn test_predictions_are_deterministic() {
    println!("\n=== Test: Determinism ===");
    let pipeline = telco_pipeline();
    let input = reference_customer();

    let first = pipeline.predict(&input).unwrap();
    for _ in 0..10 {
        let again = pipeline.predict(&input).unwrap();
        assert_eq!(again.predicted_label, first.predicted_label);
        assert_eq!(again.probability[0].to_bits(), first.probability[0].to_bits());
        assert_eq!(again.probability[1].to_bits(), first.probability[1].to_bits());
        assert_eq!(again, first);
    }
    println!("✓ 10 repeated predictions identical");
}

#[test]
fn test_vector_layout_is_fixed() {
    println!("\n=== Test: Vector Layout ===");
    let schema = FeatureSchema::telco();
    let expected_len =
        schema.floats().count() + schema.ints().count() + schema.categoricals().count();

    let inputs = [
        RawInput::new(),
        reference_customer(),
        raw(&[("Contract", "Two year"), ("PaymentMethod", "Credit card (automatic)")]),
    ];
    for input in &inputs {
        let validated = schema.validate_and_default(input).unwrap();
        let v = encode(&validated, &schema).unwrap();
        assert_eq!(v.len(), expected_len);
    }

    let v = encode(
        &schema
            .validate_and_default(&raw(&[
                ("Contract", "Two year"),
                ("PaymentMethod", "Credit card (automatic)"),
            ]))
            .unwrap(),
        &schema,
    )
    .unwrap();
    assert_eq!(v.as_slice()[CONTRACT], 2.0);
    assert_eq!(v.as_slice()[18], 3.0);
    assert_eq!(v.as_slice()[TENURE], 2.0, "tenure falls back to its default");
    println!("✓ Vector length {} for every input", expected_len);
}

#[test]
fn test_request_errors_are_distinguished() {
    println!("\n=== Test: Request Errors ===");
    let pipeline = telco_pipeline();

    let err = pipeline.predict(&raw(&[("tenure", "one")])).unwrap_err();
    assert!(matches!(err, ChurnError::Parse { .. }), "{}", err);

    let err = pipeline.predict(&raw(&[("tenure", "101")])).unwrap_err();
    assert!(matches!(err, ChurnError::Validation { .. }), "{}", err);

    let err = pipeline
        .predict(&raw(&[("MonthlyCharges", "-0.01")]))
        .unwrap_err();
    assert!(matches!(err, ChurnError::Validation { .. }), "{}", err);
    assert_eq!(err.field(), Some("MonthlyCharges"));

    let err = pipeline
        .predict(&raw(&[("Contract", "Three year")]))
        .unwrap_err();
    assert!(matches!(err, ChurnError::Validation { .. }), "{}", err);

    for (field, v) in [
        ("MonthlyCharges", "0"),
        ("MonthlyCharges", "1000"),
        ("SeniorCitizen", "1"),
        ("tenure", "0"),
    ] {
        assert!(pipeline.predict(&raw(&[(field, v)])).is_ok(), "{}={}", field, v);
    }
    println!("✓ Parse and validation errors kept apart");
}

#[test]
fn test_pipeline_from_artifact_files() {
    println!("\n=== Test: Pipeline From Files ===");
    let model = write_temp(".json", &forest_json());
    let pipeline = ChurnPipeline::from_config(&config(&model, None)).unwrap();
    assert!(!pipeline.has_scaler());

    let from_file = pipeline.predict(&reference_customer()).unwrap();
    let in_memory = telco_pipeline().predict(&reference_customer()).unwrap();
    assert_eq!(from_file, in_memory);

    let scaler = write_temp(
        ".json",
        &format!(
            r#"{{"mean": {:?}, "scale": {:?}}}"#,
            vec![0.0; 19],
            vec![1.0; 19]
        ),
    );
    let pipeline = ChurnPipeline::from_config(&config(&model, Some(&scaler))).unwrap();
    assert!(pipeline.has_scaler());
    assert_eq!(pipeline.predict(&reference_customer()).unwrap(), in_memory);
    println!("✓ Loaded forest and identity scaler reproduce in-memory results");
}

#[test]
fn test_missing_model_refuses_to_start() {
    println!("\n=== Test: Missing Model ===");
    let cfg = ServiceConfig {
        model_path: PathBuf::from("/nonexistent/churn_random_forest.json"),
        scaler_path: None,
        schema_path: None,
        log_predictions: false,
    };
    let err = ChurnPipeline::from_config(&cfg).unwrap_err();
    assert!(matches!(err, ChurnError::ModelUnavailable { .. }), "{}", err);

    let model = write_temp(".json", &forest_json());
    let mut cfg = config(&model, None);
    cfg.scaler_path = Some(PathBuf::from("/nonexistent/scaler.json"));
    let err = ChurnPipeline::from_config(&cfg).unwrap_err();
    assert!(matches!(err, ChurnError::ModelUnavailable { .. }), "{}", err);
    println!("✓ Startup fails instead of serving without a model");
}

#[test]
fn test_model_schema_mismatch_is_caught_at_startup() {
    println!("\n=== Test: Schema Self-Check ===");
    let narrow = RandomForest::new(
        4,
        vec![DecisionTree::stump(TENURE, 12.5, [30.0, 70.0], [80.0, 20.0])],
    )
    .unwrap();
    let err = ChurnPipeline::new(
        FeatureSchema::telco(),
        None,
        ChurnPredictor::new(Arc::new(narrow)),
    )
    .unwrap_err();
    assert!(matches!(err, ChurnError::Encoding { .. }), "{}", err);

    let mut names: Vec<String> = FeatureSchema::telco()
        .field_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    names.swap(TENURE, 2);
    let reordered = RandomForest::new(
        19,
        vec![DecisionTree::stump(TENURE, 12.5, [30.0, 70.0], [80.0, 20.0])],
    )
    .unwrap()
    .with_feature_names(names)
    .unwrap();
    let err = ChurnPipeline::new(
        FeatureSchema::telco(),
        None,
        ChurnPredictor::new(Arc::new(reordered)),
    )
    .unwrap_err();
    assert!(matches!(err, ChurnError::Encoding { .. }), "{}", err);
    println!("✓ Width and order mismatches rejected: {}", err);
}

#[test]
fn test_shared_pipeline_across_threads() {
    println!("\n=== Test: Shared Across Threads ===");
    let pipeline = telco_pipeline();
    let expected = pipeline.predict(&reference_customer()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let p = pipeline.clone();
            std::thread::spawn(move || p.predict(&reference_customer()).unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
    println!("✓ 4 workers agree");
}
