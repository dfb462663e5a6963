mod common;

use anyhow::Result;
use common::*;
use edge_bench_rs::config::ModelCatalog;
use edge_bench_rs::matrix::{matrix_signature, parse_quant_list, CellStatus, MatrixBuilder};
use edge_bench_rs::runner::MatrixRunner;
use edge_bench_rs::utils::ModelStore;
use edge_bench_rs::Config;
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "models": [
        {
            "name": "qwen2.5-7b-instruct",
            "repo": "Qwen/Qwen2.5-7B-Instruct-GGUF",
            "files": {
                "Q4_K_M": "qwen2.5-7b-instruct-q4_k_m.gguf",
                "Q8_0": "qwen2.5-7b-instruct-q8_0.gguf"
            }
        },
        {
            "name": "tinyllama",
            "size": "1.1B",
            "files": {
                "Q4_K_M": "tinyllama-q4_k_m.gguf",
                "Q8_0": "tinyllama-q8_0.gguf"
            },
            "file_sizes": { "Q8_0": 1170000000 }
        }
    ],
    "quick_mode_quants": ["Q4_K_M"]
}"#;

#[test]
fn test_config_defaults_without_file() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config::load(dir.path().join("missing.json"))?;
    assert_eq!(config.limits.max_memory_gb, 14.0);
    assert_eq!(config.limits.safety_margin, 1.2);
    assert_eq!(config.backend.port_start, 8080);
    assert_eq!(config.matrix.floor_baseline.name(), "Q4_K_M");
    Ok(())
}

#[test]
fn test_partial_config_file_keeps_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("edge_bench.json");
    fs::write(
        &path,
        r#"{ "limits": { "max_memory_gb": 24 }, "matrix": { "enabled_workloads": ["interactive"] } }"#,
    )?;

    let config = Config::load(&path)?;
    assert_eq!(config.limits.max_memory_gb, 24.0);
    assert_eq!(config.limits.max_load_time_secs, 300);
    assert_eq!(config.matrix.enabled_workloads, vec!["interactive"]);
    assert!(config.thresholds.for_workload("interactive").is_some());
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("edge_bench.json");
    fs::write(&path, r#"{ "limits": { "safety_margin": 0.5 } }"#)?;

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("safety_margin"));
    Ok(())
}

#[test]
fn test_catalog_to_matrix() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("models.json");
    fs::write(&path, CATALOG)?;

    let catalog = ModelCatalog::load(&path)?;
    catalog.validate()?;
    assert_eq!(catalog.quick_mode_quants, Some(parse_quant_list("Q4_K_M")));

    let config = Config::default();
    let builder = MatrixBuilder::new(config.matrix.quant_priority.clone());
    let cells = builder.build(&catalog, &parse_quant_list("Q8_0,Q4_K_M"))?;

    let order: Vec<String> = cells.iter().map(|c| c.key().to_string()).collect();
    assert_eq!(
        order,
        vec![
            "tinyllama Q4_K_M",
            "qwen2.5-7b-instruct Q4_K_M",
            "tinyllama Q8_0",
            "qwen2.5-7b-instruct Q8_0",
        ]
    );
    // Size detected from the name
    assert_eq!(cells[1].size_class.to_string(), "7B");
    assert_eq!(cells[2].estimated_file_bytes, 1_170_000_000);

    let quants = builder.order_quants(&parse_quant_list("Q8_0,Q4_K_M"));
    let a = matrix_signature(&catalog, &quants, &config.thresholds)?;
    let b = matrix_signature(&catalog, &quants, &config.thresholds)?;
    assert_eq!(a, b);
    let fewer = matrix_signature(&catalog, &parse_quant_list("Q4_K_M"), &config.thresholds)?;
    assert_ne!(a, fewer);
    Ok(())
}

#[test]
fn test_run_against_model_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let model_dir = dir.path().join("models");
    fs::create_dir_all(model_dir.join("1B"))?;
    fs::write(model_dir.join("1B").join(file_name("small", "Q4_K_M")), vec![0u8; 4096])?;

    let config = test_config(&["interactive"]);
    let catalog = ModelCatalog::new(vec![
        model("small", "1B", &["Q4_K_M"]),
        model("absent", "3B", &["Q4_K_M"]),
    ]);
    let mut cells = build_cells(&config, &catalog, &["Q4_K_M"]);

    let store = ModelStore::new(&model_dir);
    store.annotate_file_sizes(&mut cells, &catalog);
    assert_eq!(cells[0].estimated_file_bytes, 4096);

    let backend = ScriptedBackend::new();
    let log = backend.log.clone();
    let mut runner = MatrixRunner::new(
        &config,
        cells,
        "sig",
        Box::new(backend),
        Box::new(ScriptedWorkloads::new()),
        Box::new(FixedMemory(32.0)),
        Box::new(store),
    );
    let outcome = runner.run()?;

    assert_eq!(runner.cells()[0].status(), CellStatus::Passed);
    assert_eq!(runner.cells()[1].status(), CellStatus::Error);
    assert_eq!(outcome.summary.total, 2);
    assert_eq!(log.borrow().started, vec![file_name("small", "Q4_K_M")]);
    Ok(())
}
