//! End-to-end runs over generated customer tables.

use churn::model::{BoostedParams, EnsembleParams, LinearParams};
use churn::{ModelKind, ModelVariant, PipelineConfig, PipelineError, run};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Writes a telco-style table. Churners have short tenure, high monthly
/// charges and month-to-month contracts. Rows listed in `blank_charges`
/// get a blank TotalCharges cell.
fn create_test_csv(n: usize, blank_charges: &[usize]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "customerID,gender,SeniorCitizen,tenure,Contract,PaymentMethod,MonthlyCharges,TotalCharges,Churn"
    )
    .unwrap();
    for i in 0..n {
        let churn = i % 4 == 0;
        let jitter = (i % 9) as f64;
        let gender = if i % 2 == 0 { "Female" } else { "Male" };
        let senior = i % 5 == 0;
        let (tenure, contract, monthly) = if churn {
            (1.0 + jitter, "Month-to-month", 85.0 + jitter)
        } else if i % 3 == 0 {
            (30.0 + jitter, "One year", 40.0 + jitter)
        } else {
            (50.0 + jitter, "Two year", 25.0 + jitter)
        };
        let payment = if i % 3 == 1 { "Electronic check" } else { "Mailed check" };
        let total = if blank_charges.contains(&i) {
            " ".to_string()
        } else {
            format!("{:.2}", tenure * monthly)
        };
        writeln!(
            file,
            "{:04}-ABCD,{},{},{},{},{},{:.2},{},{}",
            i,
            gender,
            u8::from(senior),
            tenure,
            contract,
            payment,
            monthly,
            total,
            if churn { "Yes" } else { "No" }
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn small_registry() -> Vec<ModelVariant> {
    vec![
        ModelVariant::new(
            "Logistic Regression",
            42,
            ModelKind::Linear(LinearParams::default()),
        ),
        ModelVariant::new(
            "Random Forest",
            42,
            ModelKind::Ensemble(EnsembleParams {
                n_estimators: 15,
                ..Default::default()
            }),
        ),
        ModelVariant::new(
            "Gradient Boosting",
            42,
            ModelKind::Boosted(BoostedParams {
                n_estimators: 15,
                ..Default::default()
            }),
        ),
    ]
}

fn config_for(path: PathBuf) -> PipelineConfig {
    PipelineConfig {
        input: path,
        models: small_registry(),
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let file = create_test_csv(200, &[7, 19]);
    let config = config_for(file.path().to_path_buf());
    let mut sink: Vec<String> = Vec::new();

    let summary = run(&config, &mut sink).unwrap();

    assert_eq!(summary.clean.rows_loaded, 200);
    assert_eq!(summary.clean.rows_kept, 198);
    assert_eq!(summary.train_rows + summary.test_rows, 198);
    assert_eq!(summary.failures(), 0);

    let names: Vec<&str> = summary.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Logistic Regression", "Random Forest", "Gradient Boosting"]
    );

    for outcome in &summary.outcomes {
        let report = outcome.result.as_ref().unwrap();
        // the training fold is balanced, the evaluation fold is not
        assert_eq!(report.balance.after[0], report.balance.after[1]);
        assert_eq!(report.balance.before.iter().sum::<usize>(), summary.train_rows);
        assert_eq!(report.evaluation.total(), summary.test_rows);
        assert!(report.evaluation.accuracy > 0.9, "{}", outcome.name);
    }

    assert_eq!(sink.len(), 3);
    assert!(sink[0].contains("--- Training and evaluating: Logistic Regression ---"));
    assert!(sink[2].contains("weighted avg"));
}

#[test]
fn test_runs_are_reproducible() {
    let file = create_test_csv(120, &[]);
    let config = config_for(file.path().to_path_buf());
    let mut first: Vec<String> = Vec::new();
    let mut second: Vec<String> = Vec::new();
    run(&config, &mut first).unwrap();
    run(&config, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_input_is_a_load_error() {
    let config = config_for(PathBuf::from("/nonexistent/churn.csv"));
    let mut sink: Vec<String> = Vec::new();
    assert!(matches!(
        run(&config, &mut sink),
        Err(PipelineError::DataLoad { .. })
    ));
    assert!(sink.is_empty());
}

#[test]
fn test_strict_labels_abort_the_run() {
    let mut file = create_test_csv(40, &[]);
    writeln!(file, "9999-ZZZZ,Male,0,3,Month-to-month,Mailed check,70.00,210.00,Maybe").unwrap();
    file.flush().unwrap();

    let mut config = config_for(file.path().to_path_buf());
    let mut sink: Vec<String> = Vec::new();
    let summary = run(&config, &mut sink).unwrap();
    assert_eq!(summary.clean.unrecognised_labels, 1);

    config.strict_labels = true;
    let mut sink: Vec<String> = Vec::new();
    match run(&config, &mut sink) {
        Err(PipelineError::Schema { row, .. }) => assert_eq!(row, Some(40)),
        other => panic!("expected SchemaError, got {:?}", other),
    }
}
