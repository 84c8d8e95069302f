mod common;

use std::fs;

use common::{translator, translator_with, LineMap};
use lt_translator::pipeline::{PipelineConfig, BATCH_REPORT_FILENAME, SIGNATURE};
use lt_translator::LtError;

fn dictionary() -> LineMap {
    LineMap::new(&[("Title", "标题"), ("Hello world.", "你好世界。"), ("Body.", "正文。")])
}

#[test]
fn translate_file_writes_output_and_stats() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("guide.md");
    fs::write(&input, "# Title\n\nHello world.\n").expect("write input");

    let stats = translator(dictionary())
        .translate_file(&input, None)
        .expect("translate");

    let output = dir.path().join("guide_translated.md");
    assert_eq!(
        fs::read_to_string(&output).expect("read output"),
        format!("# 标题\n\n你好世界。\n\n{SIGNATURE}")
    );
    assert_eq!(stats.output_file, output.display().to_string());

    let json = fs::read_to_string(dir.path().join("guide_translated.stats.json")).expect("stats");
    let v: serde_json::Value = serde_json::from_str(&json).expect("parse stats");
    assert_eq!(v["completeness_score"], 10);
    assert_eq!(v["file_format"], ".md");
    assert_eq!(v["chunk_count"], 1);
    assert!(v.get("refine_mode").is_none());
}

#[test]
fn stats_file_can_be_disabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("a.rst");
    fs::write(&input, "Body.\n").expect("write input");
    let output = dir.path().join("out").join("b.rst");

    let cfg = PipelineConfig {
        save_stats: false,
        ..PipelineConfig::default()
    };
    translator_with(cfg, dictionary())
        .translate_file(&input, Some(&output))
        .expect("translate");
    assert!(output.exists());
    assert!(!dir.path().join("out").join("b.stats.json").exists());
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = translator(dictionary())
        .translate_file(&dir.path().join("nope.md"), None)
        .expect_err("missing");
    assert!(matches!(
        err.downcast_ref::<LtError>(),
        Some(LtError::InputNotFound(_))
    ));
}

#[test]
fn batch_isolates_failures_and_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.md"), "# Title\n").expect("write");
    fs::write(dir.path().join("b.rst"), "Body.\n").expect("write");
    fs::write(dir.path().join("c.md"), [0xff_u8, 0xfe, 0x00]).expect("write");
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

    let entries = translator(dictionary())
        .batch_translate(dir.path(), None, "*.*")
        .expect("batch");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.iter().filter(|e| e.is_success()).count(), 2);

    let out_dir = dir.path().join("translated");
    assert!(out_dir.join("a_translated.md").exists());
    assert!(out_dir.join("b_translated.rst").exists());

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out_dir.join(BATCH_REPORT_FILENAME)).expect("report"),
    )
    .expect("parse report");
    let failed: Vec<&serde_json::Value> = report
        .as_array()
        .expect("array")
        .iter()
        .filter(|e| e.get("error").is_some())
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["input_file"]
        .as_str()
        .expect("input_file")
        .ends_with("c.md"));
    assert_eq!(failed[0]["completeness_score"], 0);
}

#[test]
fn batch_with_custom_pattern() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.md"), "Body.\n").expect("write");
    fs::write(dir.path().join("b.rst"), "Body.\n").expect("write");
    let out = dir.path().join("zh");

    let entries = translator(dictionary())
        .batch_translate(dir.path(), Some(&out), "*.rst")
        .expect("batch");
    assert_eq!(entries.len(), 1);
    assert!(out.join("b_translated.rst").exists());
    assert!(!out.join("a_translated.md").exists());
}

#[test]
fn validate_compares_stripped_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = dir.path().join("doc.md");
    let translated = dir.path().join("doc_translated.md");
    fs::write(&original, "---\ntitle: X\n---\nLine one.\nLine two.").expect("write");
    fs::write(&translated, "第一行。\n第二行。").expect("write");

    let cap = dictionary().with_verdict(7, "第二段");
    let report = translator(cap)
        .validate_translation(&original, &translated)
        .expect("validate");
    assert_eq!(report.validation_score, 7);
    assert_eq!(report.original_summary, "original summary: 2 lines");
    assert_eq!(report.translated_summary, "translated summary: 2 lines");
    assert_eq!(report.comparison_result.missing_content, "第二段");
}
