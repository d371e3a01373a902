mod common;

use common::{TestWorkspace, write_item_master};
use mapping_miner::align::align;
use mapping_miner::classify::{RuleKind, infer_rules};
use mapping_miner::config::AnalysisConfig;
use mapping_miner::error::MinerError;
use mapping_miner::ingest::{LoadOptions, load_legacy, load_target};
use mapping_miner::join::{KeyStrategy, resolve_join_keys};

fn analyze_files(
    legacy: &std::path::Path,
    target: &std::path::Path,
    config: &AnalysisConfig,
) -> Vec<mapping_miner::classify::FieldAnalysis> {
    let options = LoadOptions::default();
    let legacy = load_legacy(legacy, None, &options).expect("legacy");
    let target = load_target(target, None, &[], &options).expect("target");
    let keys = resolve_join_keys(&legacy, &target, &config.join_keys).expect("keys");
    let aligned = align(&legacy, &target, &keys).expect("align");
    infer_rules(&aligned, config)
}

#[test]
fn item_master_yields_const_direct_and_logic_rules() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let results = analyze_files(&legacy, &target, &AnalysisConfig::default());

    let kinds = results
        .iter()
        .map(|r| (r.target(), r.kind()))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ("NAME", RuleKind::Direct),
            ("LOCATION", RuleKind::Const),
            ("STAT", RuleKind::Logic),
        ]
    );

    assert_eq!(results[0].source_column(), Some("FUDS"));
    assert_eq!(results[1].explanation(), "Value is 'EU'");
    assert_eq!(results[1].confidence(), 100.0);

    let stat = &results[2];
    assert_eq!(stat.confidence(), 92.0);
    assert_eq!(
        stat.explanation(),
        "Mostly '20'; exceptions correlate with ITTY == 'SRV'"
    );
}

#[test]
fn prefixed_legacy_headers_join_on_bare_target_names() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.csv", "MMITNO,MMWHLO\nA1,10\nA2,20\n");
    let target = workspace.write("target.csv", "ITNO,LOCATION\nA1,EU\nA2,EU\n");
    let options = LoadOptions::default();
    let legacy = load_legacy(&legacy, None, &options).expect("legacy");
    let target = load_target(&target, None, &[], &options).expect("target");
    assert_eq!(legacy.columns(), ["ITNO", "WHLO"]);
    assert_eq!(legacy.names().original("WHLO"), "MMWHLO");

    let keys = resolve_join_keys(&legacy, &target, &[]).expect("keys");
    assert_eq!(keys.columns(), ["ITNO"]);
    assert_eq!(keys.strategy(), KeyStrategy::Priority);

    let aligned = align(&legacy, &target, &keys).expect("align");
    assert_eq!(aligned.row_count(), 2);
    let results = infer_rules(&aligned, &AnalysisConfig::default());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].target(), "LOCATION");
    assert_eq!(results[0].kind(), RuleKind::Const);
}

#[test]
fn datasets_without_common_columns_fail_to_align() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.csv", "MMAAAA,MMBBBB\n1,2\n");
    let target = workspace.write("target.csv", "CCCC,DDDD\n1,2\n");
    let options = LoadOptions::default();
    let legacy = load_legacy(&legacy, None, &options).expect("legacy");
    let target = load_target(&target, None, &[], &options).expect("target");
    let err = resolve_join_keys(&legacy, &target, &[]).expect_err("no common key");
    assert!(matches!(err, MinerError::NoCommonKey { .. }));
}

#[test]
fn fallback_key_is_the_lowest_sorting_common_column() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.csv", "MMZONE,MMAREA,MMTEXT\nZ1,A1,x\nZ2,A2,y\n");
    let target = workspace.write("target.csv", "AREA,ZONE,FLAG\nA1,Z1,1\nA2,Z2,1\n");
    let options = LoadOptions::default();
    let legacy = load_legacy(&legacy, None, &options).expect("legacy");
    let target = load_target(&target, None, &[], &options).expect("target");
    let keys = resolve_join_keys(&legacy, &target, &[]).expect("keys");
    assert_eq!(keys.columns(), ["AREA"]);
    assert_eq!(keys.strategy(), KeyStrategy::Fallback);
}

#[test]
fn raising_the_threshold_turns_logic_into_unknown() {
    let workspace = TestWorkspace::new();
    let (legacy, target) = write_item_master(&workspace);
    let config = AnalysisConfig {
        high_confidence_threshold: 95.0,
        ..AnalysisConfig::default()
    };
    let results = analyze_files(&legacy, &target, &config);
    let stat = results.iter().find(|r| r.target() == "STAT").expect("STAT");
    assert_eq!(stat.kind(), RuleKind::Unknown);
    assert_eq!(stat.confidence(), 92.0);
}

#[test]
fn semicolon_files_load_with_explicit_delimiter() {
    let workspace = TestWorkspace::new();
    let legacy = workspace.write("legacy.txt", "MMITNO;MMSTAT\nA1;20\nA2;20\n");
    let options = LoadOptions {
        delimiter: Some(b';'),
        ..LoadOptions::default()
    };
    let legacy = load_legacy(&legacy, None, &options).expect("legacy");
    assert_eq!(legacy.columns(), ["ITNO", "STAT"]);
    assert_eq!(legacy.row_count(), 2);
}
