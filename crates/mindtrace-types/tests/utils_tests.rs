use mindtrace_types::*;
use std::path::Path;

#[test]
fn test_truncate() {
    let short = "short";
    assert_eq!(truncate(short, 10), "short");

    let long = "this is a very long string";
    let truncated = truncate(long, 10);
    assert_eq!(truncated, "this is a ...");
}

#[test]
fn test_truncate_counts_chars_not_bytes() {
    assert_eq!(truncate("日本語テキスト", 3), "日本語...");
}

#[test]
fn test_single_line() {
    assert_eq!(single_line("  fix\n the   bug \t"), "fix the bug");
}

#[test]
fn test_paths_equal_through_symlink_free_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a");
    std::fs::create_dir(&nested).unwrap();

    assert!(paths_equal(&nested, &dir.path().join("a/../a")));
    assert!(!paths_equal(&nested, dir.path()));
}

#[test]
fn test_file_label() {
    assert_eq!(file_label("/src/lib.rs"), "lib.rs");
    assert_eq!(file_label("README.md"), "README.md");
    assert_eq!(file_label(Path::new("/").to_str().unwrap()), "/");
}
