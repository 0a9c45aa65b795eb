//! Integration tests for fedtask.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::uninlined_format_args
)]

use std::{fs, path::Path, sync::Arc};

use fedtask::{
    summary::{record_files, TaskSummary},
    task::{DATA_FILE, RECORD_DIR},
    DataSource, Dataset, DatasetRegistry, Distribution, Error, GenerationOutcome, SharedDataset,
    SourceData, StoreMode, TaskData, TaskGenConfig, TaskGenerator, TaskReader, TupleDataset,
    XyDataset,
};

/// Labeled data with `classes` balanced labels; feature 0 is the item index.
fn labeled(rows: usize, classes: usize) -> SharedDataset {
    let x = (0..rows).map(|i| vec![i as f32, (i % 7) as f32]).collect();
    let y = (0..rows).map(|i| (i % classes) as i64).collect();
    Arc::new(
        XyDataset::new(x, y)
            .ok()
            .unwrap_or_else(|| panic!("Should create dataset")),
    )
}

fn synthetic_source(train: usize, test: usize) -> DataSource {
    DataSource::builtin("Synthetic")
        .with_train_arg("num_samples", train.to_string())
        .with_train_arg("num_classes", "5")
        .with_test_arg("num_samples", test.to_string())
        .with_test_arg("num_classes", "5")
        .with_test_arg("seed", "1")
}

fn generate(config: TaskGenConfig, source: &SourceData) -> GenerationOutcome {
    TaskGenerator::new(config)
        .ok()
        .unwrap_or_else(|| panic!("Should accept config"))
        .run(source)
        .unwrap_or_else(|e| panic!("Should generate task: {e}"))
}

fn read(path: &Path) -> TaskData {
    TaskReader::new(&DatasetRegistry::with_builtins())
        .read(path)
        .unwrap_or_else(|e| panic!("Should read task: {e}"))
}

fn assert_matches_holdout(task: &TaskData, outcome: &GenerationOutcome) {
    let GenerationOutcome::Generated(generated) = outcome else {
        panic!("Expected a generated task");
    };
    assert_eq!(task.num_clients(), generated.holdout.num_clients());
    for (i, (train, valid)) in generated.holdout.iter().enumerate() {
        assert_eq!(task.train[i].len(), train.len());
        assert_eq!(task.valid[i].len(), valid.len());
    }
}

#[test]
fn test_xy_task_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let source = SourceData::new(labeled(200, 4), labeled(40, 4));
    let config = TaskGenConfig::new("toy")
        .with_distribution(Distribution::LabelShard, 0.5)
        .with_num_clients(5)
        .with_task_root(root.path());

    let outcome = generate(config, &source);
    assert!(outcome.is_generated());
    assert_eq!(
        outcome.path().file_name().and_then(|n| n.to_str()),
        Some("toy_cnum5_dist3_skew0.5_seed0")
    );
    assert!(outcome.path().join(DATA_FILE).is_file());
    assert!(outcome.path().join(RECORD_DIR).is_dir());

    let task = read(outcome.path());
    assert_eq!(task.store, StoreMode::Xy);
    assert_eq!(task.client_names[0], "Client0");
    assert_eq!(task.test.len(), 40);
    assert_matches_holdout(&task, &outcome);

    // Inline features of client items still match the source rows.
    let GenerationOutcome::Generated(generated) = &outcome else {
        unreachable!()
    };
    let first = generated.holdout.train[0][0];
    assert_eq!(task.train[0].get(0), source.train.get(first));
}

#[test]
fn test_idx_task_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let registry = DatasetRegistry::with_builtins();
    let source = SourceData::from_registry(&registry, synthetic_source(300, 50)).unwrap();
    let config = TaskGenConfig::new("synthetic")
        .with_distribution(Distribution::LabelDirichlet, 0.3)
        .with_num_clients(6)
        .with_seed(11)
        .with_store(StoreMode::Idx)
        .with_task_root(root.path());

    let outcome = generate(config, &source);
    let task = read(outcome.path());
    assert_eq!(task.store, StoreMode::Idx);
    assert_matches_holdout(&task, &outcome);
    assert_eq!(task.test.len(), 50);

    // Rebuilt backing data equals the data the task was generated from.
    let GenerationOutcome::Generated(generated) = &outcome else {
        unreachable!()
    };
    for (c, train) in generated.holdout.train.iter().enumerate() {
        for (i, &idx) in train.iter().enumerate().take(5) {
            assert_eq!(task.train[c].get(i), source.train.get(idx));
        }
    }
}

#[test]
fn test_identity_task_uses_one_client_per_identity() {
    let root = tempfile::tempdir().unwrap();
    let x = vec![vec![0.0]; 60];
    let ids = (0..60).map(|i| (i % 3) as u64).collect();
    let y = (0..60).map(|i| (i % 2) as i64).collect();
    let train: SharedDataset = Arc::new(TupleDataset::new(x, ids, y).unwrap());
    let source = SourceData::new(train, labeled(10, 2));
    let config = TaskGenConfig::new("writers")
        .with_distribution(Distribution::FeatureIdentity, 0.0)
        .with_num_clients(100)
        .with_task_root(root.path());

    let outcome = generate(config, &source);
    assert!(outcome
        .path()
        .ends_with("writers_cnum100_dist5_skew0.0_seed0"));
    let task = read(outcome.path());
    assert_eq!(task.client_names, vec!["Client0", "Client1", "Client2"]);
    let sizes: Vec<usize> = task
        .clients()
        .map(|(_, train, valid)| train.len() + valid.len())
        .collect();
    assert_eq!(sizes, vec![20, 20, 20]);
}

#[test]
fn test_rerun_is_noop() {
    let root = tempfile::tempdir().unwrap();
    let source = SourceData::new(labeled(100, 4), labeled(20, 4));
    let config = TaskGenConfig::new("toy")
        .with_num_clients(4)
        .with_task_root(root.path());

    let first = generate(config.clone(), &source);
    let log = first.path().join(RECORD_DIR).join("run.json");
    fs::write(&log, "{}").unwrap();
    let before = fs::read(first.path().join(DATA_FILE)).unwrap();

    // Different data, same key: the existing task wins.
    let other = SourceData::new(labeled(400, 2), labeled(20, 2));
    let second = generate(config, &other);
    assert!(matches!(second, GenerationOutcome::AlreadyExists { .. }));
    assert_eq!(second.path(), first.path());
    assert_eq!(fs::read(first.path().join(DATA_FILE)).unwrap(), before);
    assert_eq!(record_files(first.path()).unwrap(), vec![log]);
}

#[test]
fn test_same_seed_same_bytes() {
    let source = SourceData::new(labeled(150, 5), labeled(30, 5));
    let bytes = |seed: u64| {
        let root = tempfile::tempdir().unwrap();
        let config = TaskGenConfig::new("toy")
            .with_distribution(Distribution::LabelQuantity, 0.6)
            .with_num_clients(6)
            .with_seed(seed)
            .with_task_root(root.path());
        let outcome = generate(config, &source);
        fs::read(outcome.path().join(DATA_FILE)).unwrap()
    };
    assert_eq!(bytes(5), bytes(5));
    assert_ne!(bytes(5), bytes(6));
}

#[test]
fn test_failed_save_leaves_nothing() {
    let root = tempfile::tempdir().unwrap();
    let train: SharedDataset = labeled(50, 2);
    let unlabeled_test: SharedDataset = Arc::new(fedtask::XDataset::new(vec![vec![0.0]; 5]));
    let source = SourceData::new(train, unlabeled_test);
    let config = TaskGenConfig::new("toy")
        .with_num_clients(2)
        .with_task_root(root.path());
    let generator = TaskGenerator::new(config).unwrap();

    let result = generator.run(&source);
    assert!(matches!(result, Err(Error::Persistence { .. })));
    assert!(!generator.task_dir().exists());
}

#[test]
fn test_nan_feature_leaves_task_regenerable() {
    let root = tempfile::tempdir().unwrap();
    let mut x: Vec<Vec<f32>> = (0..40).map(|i| vec![i as f32]).collect();
    x[7][0] = f32::NAN;
    let y = (0..40).map(|i| (i % 2) as i64).collect();
    let dirty: SharedDataset = Arc::new(XyDataset::new(x, y).unwrap());
    let config = TaskGenConfig::new("toy")
        .with_num_clients(4)
        .with_task_root(root.path());

    let generator = TaskGenerator::new(config.clone()).unwrap();
    let result = generator.run(&SourceData::new(dirty, labeled(10, 2)));
    assert!(matches!(result, Err(Error::Persistence { .. })));
    assert!(!generator.task_dir().exists());

    // Same key with clean data is generated and reads back.
    let outcome = generate(config, &SourceData::new(labeled(40, 2), labeled(10, 2)));
    assert!(outcome.is_generated());
    assert_eq!(read(outcome.path()).num_clients(), 4);
}

#[test]
fn test_malformed_record() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("broken");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join(DATA_FILE), r#"{"store": "XY", "client_names": ["Client0"]}"#).unwrap();
    let result = TaskReader::new(&DatasetRegistry::new()).read(&dir);
    assert!(matches!(result, Err(Error::MalformedRecord { .. })));

    fs::write(dir.join(DATA_FILE), "not json").unwrap();
    let result = TaskReader::new(&DatasetRegistry::new()).read(&dir);
    assert!(matches!(result, Err(Error::MalformedRecord { .. })));
}

#[test]
fn test_unresolvable_backing_dataset() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("idx");
    fs::create_dir(&dir).unwrap();
    let record = r#"{
        "store": "IDX",
        "client_names": ["Client0"],
        "dtest": [0],
        "datasrc": {"class_path": "torchvision.datasets", "class_name": "MNIST",
                    "train_args": {"root": "./data", "train": "True"},
                    "test_args": {"root": "./data", "train": "False"}},
        "Client0": {"dtrain": [0, 1], "dvalid": [2]}
    }"#;
    fs::write(dir.join(DATA_FILE), record).unwrap();
    let result = TaskReader::new(&DatasetRegistry::with_builtins()).read(&dir);
    assert!(matches!(result, Err(Error::DatasetResolution { .. })));
}

#[test]
fn test_summary_of_quantity_skew() {
    let root = tempfile::tempdir().unwrap();
    let source = SourceData::new(labeled(400, 10), labeled(50, 10));
    let config = TaskGenConfig::new("toy")
        .with_distribution(Distribution::LabelQuantity, 0.8)
        .with_num_clients(10)
        .with_task_root(root.path());
    let outcome = generate(config, &source);
    let summary = TaskSummary::from_task(&read(outcome.path()));

    assert_eq!(summary.clients.len(), 10);
    assert_eq!(summary.total_client_items(), 400);
    // round(0.2 * 10) = 2 labels per client
    assert!(summary.clients.iter().all(|c| c.num_labels() <= 3));
    assert_eq!(summary.test_size, 50);
}
