//! Full runs through the harness

use crate::common::{Corpus, SHORT_TIMEOUT};
use conformance_harness::report::ReportDestination;
use conformance_harness::{CancelToken, ConformanceHarness, HarnessConfig, HarnessError};
use std::fs;

fn config(corpus: &Corpus) -> HarnessConfig {
    HarnessConfig::new()
        .with_corpus_root(corpus.root())
        .with_timeout(SHORT_TIMEOUT)
        .with_echo(false)
}

fn mixed_corpus() -> Corpus {
    let corpus = Corpus::new();
    corpus.script("a.js", "echo 'a.js: OK'\n");
    corpus.script("b.js", "echo 'b.js: failed: M'\n");
    corpus.script("c.js", "sleep 10\n");
    corpus
}

#[test]
fn test_mixed_results_report() {
    let corpus = mixed_corpus();
    let harness = ConformanceHarness::new(config(&corpus));
    let outcome = harness
        .run(&["sh".to_string(), corpus.root_arg()])
        .unwrap();

    assert_eq!(
        outcome.report.lines(),
        vec!["a.js: OK", "b.js: M;", "c.js: timeout"]
    );
    assert_eq!(
        outcome.report.summary().banner(),
        "1/3 (33%) passed, 2 test(s) failed"
    );
    assert_eq!(outcome.destination, ReportDestination::Console);
    assert!(outcome.scores.is_empty());
}

#[test]
fn test_worker_count_does_not_change_report() {
    let corpus = Corpus::new();
    for i in 0..7 {
        corpus.script(&format!("es5/t{i}.js"), &format!("echo 't{i}.js: OK'\n"));
    }
    corpus.script("es1/bad.js", "echo 'Error: nope'\n");
    corpus.script("kangax-es6/segv.js", "kill -SEGV $$\n");
    corpus.script("kangax-es6/t10.js", "echo 't10.js: OK'\n");

    let run = |workers| {
        ConformanceHarness::new(config(&corpus).with_workers(workers))
            .run(&["sh".to_string()])
            .unwrap()
            .report
            .render()
    };

    let serial = run(1);
    assert_eq!(serial, run(3));
    assert_eq!(serial, run(16));

    let lines: Vec<_> = serial.lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "es1/bad.js: Error: nope");
    assert_eq!(lines[1], "es5/t0.js: OK");
    assert_eq!(lines[7], "es5/t6.js: OK");
    assert_eq!(lines[8], "kangax-es6/segv.js: crashed (signal 11)");
    assert_eq!(lines[9], "kangax-es6/t10.js: OK");
}

#[test]
fn test_scores_follow_categories() {
    let corpus = Corpus::new();
    corpus.script("es5/a.js", "echo 'a.js: OK'\n");
    corpus.script("es5/b.js", "exit 1\n");
    corpus.script("kangax-es6/c.js", "echo 'c.js: OK'\n");

    let outcome = ConformanceHarness::new(config(&corpus))
        .run(&["sh".to_string()])
        .unwrap();
    assert_eq!(outcome.scores.to_string(), "es5: 50%\nkangax-es6: 100%\nes1-es5: 50%\n");
}

#[test]
fn test_report_file_with_metadata() {
    let corpus = mixed_corpus();
    let meta = corpus.script("meta.json", "{\"engine\": \"sh\", \"variant\": \"full\"}");
    let output = corpus.root().join("out").join("report.txt");
    fs::create_dir_all(output.parent().unwrap()).unwrap();

    let harness = ConformanceHarness::new(
        config(&corpus)
            .with_workers(2)
            .with_output(&output)
            .with_metadata(&meta),
    );
    let outcome = harness
        .run(&[
            "sh".to_string(),
            corpus.root().join("a.js").to_string_lossy().into_owned(),
            corpus.root().join("b.js").to_string_lossy().into_owned(),
        ])
        .unwrap();

    assert_eq!(outcome.destination, ReportDestination::File(output.clone()));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "Metadata: {\"engine\":\"sh\",\"variant\":\"full\"}\na.js: OK\nb.js: M;\n"
    );
}

#[test]
fn test_output_without_metadata_stays_on_console() {
    let corpus = mixed_corpus();
    let output = corpus.root().join("report.txt");
    let outcome = ConformanceHarness::new(config(&corpus).with_output(&output))
        .run(&[
            "sh".to_string(),
            corpus.root().join("a.js").to_string_lossy().into_owned(),
        ])
        .unwrap();

    assert_eq!(outcome.destination, ReportDestination::Console);
    assert!(!output.exists());
    assert!(outcome.report.summary().is_success());
}

#[test]
fn test_missing_engine_aborts_before_running() {
    let corpus = Corpus::new();
    let marker = corpus.root().join("ran");
    corpus.script("a.js", &format!("touch {}\n", marker.display()));
    let output = corpus.root().join("report.txt");

    let err = ConformanceHarness::new(config(&corpus).with_output(&output))
        .run(&["no-such-engine-for-conformance".to_string(), corpus.root_arg()])
        .unwrap_err();

    assert!(matches!(err, HarnessError::EngineNotFound { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(!marker.exists());
    assert!(!output.exists());
}

#[test]
fn test_interrupted_run_writes_no_report() {
    let corpus = mixed_corpus();
    let meta = corpus.script("meta.json", "{}");
    let output = corpus.root().join("report.txt");
    let cancel = CancelToken::new();
    cancel.cancel(2);

    let err = ConformanceHarness::new(config(&corpus).with_output(&output).with_metadata(&meta))
        .with_cancel_token(cancel)
        .run(&["sh".to_string(), corpus.root_arg()])
        .unwrap_err();

    assert!(err.is_interrupted());
    assert!(!output.exists());
}

#[test]
fn test_empty_selection_reports_nothing() {
    let corpus = Corpus::new();
    let outcome = ConformanceHarness::new(config(&corpus))
        .run(&["sh".to_string()])
        .unwrap();
    assert_eq!(outcome.report.total_count(), 0);
    assert!(outcome.report.summary().is_success());
}

#[test]
fn test_relative_root_paths_are_canonical() {
    let corpus = tempfile::Builder::new()
        .prefix("corpus-")
        .tempdir_in(".")
        .unwrap();
    let name = corpus.path().file_name().unwrap().to_string_lossy().into_owned();
    let script = corpus.path().join("es5").join("a.js");
    fs::create_dir_all(script.parent().unwrap()).unwrap();
    fs::write(
        &script,
        format!("echo \"TypeError at $(pwd -P)/{name}/es5/a.js:3\"\n"),
    )
    .unwrap();

    let config = HarnessConfig::new()
        .with_corpus_root(corpus.path())
        .with_timeout(SHORT_TIMEOUT)
        .with_echo(false);
    let outcome = ConformanceHarness::new(config)
        .run(&["sh".to_string()])
        .unwrap();

    assert_eq!(outcome.report.lines(), vec!["es5/a.js: TypeError at a.js:3"]);
}
