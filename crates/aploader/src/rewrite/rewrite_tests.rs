#![allow(non_snake_case)]

use super::*;
use crate::LoaderError;
use test_case::test_case;

const LIBRARY: &str = "/cache/ap-loader-3.0/libasyncProfiler.so";

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

fn extracted(kind: ArtifactKind) -> LoaderResult<PathBuf> {
    assert_eq!(kind, ArtifactKind::NativeLibrary);
    Ok(PathBuf::from(LIBRARY))
}

#[test]
fn ArgumentRewriter___placeholder___substitutes_path_and_forces_absolute() {
    let args = strings(&["1234", "load", "libasyncProfiler.so", "false"]);

    let rewritten = ArgumentRewriter::new().rewrite_attach(&args, extracted).unwrap();

    assert_eq!(rewritten, strings(&["1234", "load", LIBRARY, "true"]));
}

#[test_case("libasyncProfiler.so")]
#[test_case("libasyncProfiler.dylib")]
#[test_case("asyncProfiler")]
fn ArgumentRewriter___every_placeholder___is_recognized(placeholder: &str) {
    let args = strings(&["1234", "load", placeholder, "false", "start,event=cpu"]);

    let rewritten = ArgumentRewriter::new().rewrite_attach(&args, extracted).unwrap();

    assert_eq!(
        rewritten,
        strings(&["1234", "load", LIBRARY, "true", "start,event=cpu"])
    );
}

#[test]
fn ArgumentRewriter___missing_absolute_flag___is_appended() {
    let args = strings(&["1234", "load", "libasyncProfiler.so"]);

    let rewritten = ArgumentRewriter::new().rewrite_attach(&args, extracted).unwrap();

    assert_eq!(rewritten, strings(&["1234", "load", LIBRARY, "true"]));
}

#[test_case(&["1234", "load", "/opt/lib/libasyncProfiler.so", "true"] ; "real path sharing the suffix")]
#[test_case(&["1234", "load", "instrument", "false", "agent.jar"] ; "other library")]
#[test_case(&["1234", "jcmd", "libasyncProfiler.so"] ; "other verb")]
#[test_case(&["1234", "threaddump"] ; "short command")]
#[test_case(&[] ; "no arguments")]
fn ArgumentRewriter___non_placeholder___is_left_alone(args: &[&str]) {
    let args = strings(args);

    let rewritten = ArgumentRewriter::new()
        .rewrite_attach(&args, |_| panic!("must not resolve"))
        .unwrap();

    assert_eq!(rewritten, args);
}

#[test]
fn ArgumentRewriter___with_placeholder___extends_table() {
    let rewriter = ArgumentRewriter::new().with_placeholder("libasyncProfiler", ArtifactKind::NativeLibrary);

    assert_eq!(
        rewriter.placeholder_kind("libasyncProfiler"),
        Some(ArtifactKind::NativeLibrary)
    );
    assert_eq!(rewriter.placeholder_kind("libasyncProfiler.so.1"), None);
}

#[test]
fn ArgumentRewriter___resolve_failure___propagates() {
    let args = strings(&["1234", "load", "libasyncProfiler.so", "false"]);

    let err = ArgumentRewriter::new()
        .rewrite_attach(&args, |_| Err(LoaderError::Config("no bundle".into())))
        .unwrap_err();

    assert!(matches!(err, LoaderError::Config(_)));
}

#[test]
fn launcher_environment___names_both_tools() {
    let env = launcher_environment(Path::new("/cache/jattach"), Path::new(LIBRARY));

    assert_eq!(
        env,
        vec![
            ("JATTACH".to_string(), OsString::from("/cache/jattach")),
            ("PROFILER".to_string(), OsString::from(LIBRARY)),
        ]
    );
}

#[test]
fn OutputRewriter___rewrite___hides_cached_launcher_path() {
    let rewriter = OutputRewriter::new(Path::new("/cache/ap-loader-3.0/profiler.sh"), "ap-loader");
    let usage = "Usage: /cache/ap-loader-3.0/profiler.sh [action] [options] <pid>\n\
                 Example: /cache/ap-loader-3.0/profiler.sh -d 30 -f profile.html 3456\n";

    let rewritten = rewriter.rewrite(usage);

    assert_eq!(
        rewritten,
        "Usage: ap-loader profiler [action] [options] <pid>\n\
         Example: ap-loader profiler -d 30 -f profile.html 3456\n"
    );
}

#[test]
fn OutputRewriter___rewrite___unrelated_text___is_unchanged() {
    let rewriter = OutputRewriter::new(Path::new("/cache/profiler.sh"), "ap-loader");

    assert_eq!(rewriter.rewrite("Profiling started\n"), "Profiling started\n");
}
