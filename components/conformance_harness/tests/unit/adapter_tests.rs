//! Unit tests for the engine adapter registry

use conformance_harness::adapter::{normalize_engine_name, CONSOLE_SHIM, SHIM_FILE_NAME};
use conformance_harness::{EngineProfile, OutputAdapter};
use std::fs;
use tempfile::TempDir;

fn engine(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_normalize_strips_directory() {
    assert_eq!(normalize_engine_name("/opt/engines/bin/d8"), "d8");
    assert_eq!(normalize_engine_name("./build/qjs"), "qjs");
}

#[test]
fn test_normalize_strips_variant_suffix() {
    assert_eq!(normalize_engine_name("v8_jitless"), "v8");
    assert_eq!(normalize_engine_name("/usr/bin/duk_full"), "duk");
    assert_eq!(normalize_engine_name("mujs_intl_debug"), "mujs");
}

#[test]
fn test_normalize_keeps_multi_segment_families() {
    assert_eq!(normalize_engine_name("quickjs_ng"), "quickjs_ng");
    assert_eq!(normalize_engine_name("quickjs_ng_full"), "quickjs_ng");
    assert_eq!(normalize_engine_name("tiny_js"), "tiny_js");
}

#[test]
fn test_normalize_drops_exe_extension() {
    assert_eq!(normalize_engine_name("cscript.exe"), "cscript");
}

#[test]
fn test_unknown_engine_gets_noop() {
    let profile = EngineProfile::for_command("/usr/local/bin/node");
    assert_eq!(profile.identifier(), "node");
    assert_eq!(profile.adapter(), OutputAdapter::NoOp);
}

#[test]
fn test_variant_resolves_to_family_adapter() {
    let profile = EngineProfile::for_command("duk_full");
    assert_eq!(profile.identifier(), "duk");
    assert_eq!(profile.adapter(), OutputAdapter::InjectShimScript);
}

#[test]
fn test_registry_lookup_by_kind() {
    assert_eq!(
        EngineProfile::for_command("qjs").adapter(),
        OutputAdapter::PrependFlag("--std")
    );
    assert_eq!(
        EngineProfile::for_command("tiny_js").adapter(),
        OutputAdapter::RewriteSource { print_fn: "print" }
    );
}

#[test]
fn test_prepare_noop_appends_test() {
    let scratch = TempDir::new().unwrap();
    let profile = EngineProfile::new("node", OutputAdapter::NoOp);
    let invocation = profile
        .prepare(&engine(&["node", "--stack-size=2000"]), "es5/a.js".as_ref(), scratch.path())
        .unwrap();
    assert_eq!(invocation.program, "node");
    assert_eq!(invocation.args, vec!["--stack-size=2000", "es5/a.js"]);
    assert!(invocation.scratch_paths.is_empty());
}

#[test]
fn test_prepare_flag_goes_before_test() {
    let scratch = TempDir::new().unwrap();
    let profile = EngineProfile::new("xst", OutputAdapter::PrependFlag("-s"));
    let invocation = profile
        .prepare(&engine(&["xst"]), "a.js".as_ref(), scratch.path())
        .unwrap();
    assert_eq!(invocation.args, vec!["-s", "a.js"]);
}

#[test]
fn test_prepare_shim_is_materialized() {
    let scratch = TempDir::new().unwrap();
    let profile = EngineProfile::new("duk", OutputAdapter::InjectShimScript);
    let invocation = profile
        .prepare(&engine(&["duk"]), "a.js".as_ref(), scratch.path())
        .unwrap();

    let shim = scratch.path().join(SHIM_FILE_NAME);
    assert_eq!(
        invocation.args,
        vec![shim.to_string_lossy().into_owned(), "a.js".to_string()]
    );
    assert_eq!(fs::read_to_string(&shim).unwrap(), CONSOLE_SHIM);
}

#[test]
fn test_prepare_rewrite_uses_scratch_copy() {
    let corpus = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let test = corpus.path().join("b.js");
    fs::write(&test, "console.log('b.js: OK');\n").unwrap();

    let profile = EngineProfile::new("cscript", OutputAdapter::RewriteSource { print_fn: "WScript.Echo" });
    let invocation = profile
        .prepare(&engine(&["cscript", "//nologo"]), &test, scratch.path())
        .unwrap();

    let rewritten = scratch.path().join("b.js");
    assert_eq!(
        invocation.args,
        vec!["//nologo".to_string(), rewritten.to_string_lossy().into_owned()]
    );
    assert_eq!(invocation.scratch_paths, vec![rewritten.clone()]);
    assert_eq!(
        fs::read_to_string(&rewritten).unwrap(),
        "WScript.Echo('b.js: OK');\n"
    );
    // The original test is untouched
    assert_eq!(fs::read_to_string(&test).unwrap(), "console.log('b.js: OK');\n");
}

#[test]
fn test_prepare_rejects_empty_engine() {
    let scratch = TempDir::new().unwrap();
    let profile = EngineProfile::new("none", OutputAdapter::NoOp);
    assert!(profile.prepare(&[], "a.js".as_ref(), scratch.path()).is_err());
}
