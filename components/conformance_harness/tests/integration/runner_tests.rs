//! Process runner behavior against real child processes

use crate::common::{sh_runner, Corpus, SHORT_TIMEOUT};
use conformance_harness::runner::resolve_engine;
use conformance_harness::{
    classify, CancelToken, EngineProfile, HarnessError, OutputAdapter, ProcessRunner, Verdict,
};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_clean_exit_is_recorded() {
    let corpus = Corpus::new();
    corpus.script("es5/a.js", "echo 'a.js: OK'\n");

    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/a.js")).unwrap();
    assert!(result.exit_recorded);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.signal, None);
    assert!(!result.timed_out);
    assert_eq!(result.test_name, "a.js");
    assert_eq!(result.output_text(), "a.js: OK\n");
    assert_eq!(classify(&result), Verdict::Ok);
}

#[test]
fn test_stdout_and_stderr_share_one_stream() {
    let corpus = Corpus::new();
    corpus.script("es5/mix.js", "echo one\necho two >&2\necho three\nexit 3\n");

    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/mix.js")).unwrap();
    assert_eq!(result.output_text(), "one\ntwo\nthree\n");
    assert_eq!(result.exit_code, Some(3));
}

#[test]
fn test_nonzero_exit_does_not_decide_verdict() {
    let corpus = Corpus::new();
    corpus.script("es5/odd.js", "echo 'odd.js: OK'\nexit 1\n");

    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/odd.js")).unwrap();
    assert_eq!(classify(&result), Verdict::Ok);
}

#[test]
fn test_signal_death_is_a_crash() {
    let corpus = Corpus::new();
    corpus.script("es5/segv.js", "echo 'segv.js: OK'\nkill -SEGV $$\n");

    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/segv.js")).unwrap();
    assert_eq!(result.signal, Some(11));
    assert!(result.exit_recorded);
    assert!(classify(&result).is_crash());
}

#[test]
fn test_hanging_engine_times_out() {
    let corpus = Corpus::new();
    corpus.script("es5/hang.js", "sleep 10\n");

    let started = Instant::now();
    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/hang.js")).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.timed_out);
    assert!(!result.exit_recorded);
    assert!(result.elapsed >= SHORT_TIMEOUT);
    assert_eq!(classify(&result), Verdict::Timeout);
}

#[test]
fn test_output_before_timeout_is_kept() {
    let corpus = Corpus::new();
    corpus.script("es5/slow.js", "echo 'TypeError: stuck'\nsleep 10\n");

    let result = sh_runner(CancelToken::new()).run(&corpus.case("es5/slow.js")).unwrap();
    assert!(result.timed_out);
    assert_eq!(
        classify(&result),
        Verdict::Failed("TypeError: stuck".to_string())
    );
}

#[test]
fn test_rewritten_copy_paths_are_canonical() {
    let corpus = Corpus::new();
    corpus.script("es5/where.js", "echo \"error at $0\"\n");

    let profile = EngineProfile::new("sh", OutputAdapter::RewriteSource { print_fn: "echo" });
    let runner = ProcessRunner::new(vec!["sh".to_string()], profile, CancelToken::new())
        .with_timeout(SHORT_TIMEOUT)
        .with_echo(false);
    let result = runner.run(&corpus.case("es5/where.js")).unwrap();

    assert_eq!(result.scratch_paths.len(), 1);
    assert!(!result.scratch_paths[0].exists());
    assert!(result.output_text().contains(&*result.scratch_paths[0].to_string_lossy()));
    assert_eq!(classify(&result), Verdict::Failed("error at where.js".to_string()));
}

#[test]
fn test_cancelled_token_refuses_to_start() {
    let corpus = Corpus::new();
    corpus.script("es5/a.js", "echo 'a.js: OK'\n");

    let cancel = CancelToken::new();
    cancel.cancel(2);
    let err = sh_runner(cancel).run(&corpus.case("es5/a.js")).unwrap_err();
    assert!(matches!(err, HarnessError::Interrupted { signal: 2 }));
    assert_eq!(err.exit_code(), 130);
}

#[test]
fn test_cancel_kills_running_engine() {
    let corpus = Corpus::new();
    corpus.script("es5/hang.js", "sleep 10\n");

    let cancel = CancelToken::new();
    let runner = sh_runner(cancel.clone()).with_timeout(Duration::from_secs(30));
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel(15);
    });

    let started = Instant::now();
    let err = runner.run(&corpus.case("es5/hang.js")).unwrap_err();
    canceller.join().unwrap();
    assert!(err.is_interrupted());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_unlaunchable_engine_is_an_error() {
    let corpus = Corpus::new();
    corpus.script("es5/a.js", "");

    let runner = ProcessRunner::new(
        vec!["/nonexistent/engine".to_string()],
        EngineProfile::new("engine", OutputAdapter::NoOp),
        CancelToken::new(),
    );
    let err = runner.run(&corpus.case("es5/a.js")).unwrap_err();
    assert!(matches!(err, HarnessError::EngineLaunch { .. }));
}

#[test]
fn test_resolve_engine() {
    assert!(resolve_engine("sh").is_ok());
    assert!(matches!(
        resolve_engine("definitely-not-an-engine"),
        Err(HarnessError::EngineNotFound { .. })
    ));
}
