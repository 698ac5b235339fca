//! Integration test suite for the `xsniff` CLI
use assert_cmd::Command;
use std::io::Write;

/// Helper function to run the `main` binary with the given arguments and return a
/// [`assert_cmd::assert::Assert`].
fn run_main(args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("xsniff").expect("Failed to find main binary");
    cmd.arg("--no-color").args(args);
    cmd.assert()
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("Invalid UTF-8 output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn attribute_values_from_file() {
        let assert =
            run_main(&["/catalog/book/@id", "-f", "tests/data/catalog.xml"]).success().code(0);
        assert_eq!(stdout_of(&assert), "b1\nb2\nb3\n");
    }

    #[test]
    fn no_matches_prints_nothing() {
        let assert = run_main(&["/catalog/magazine", "-f", "tests/data/catalog.xml"]).success();
        assert!(stdout_of(&assert).trim().is_empty());
    }

    #[test]
    fn several_queries_get_headers() {
        let assert =
            run_main(&["--count", "/catalog/book", "//title", "-f", "tests/data/catalog.xml"])
                .success();
        assert_eq!(stdout_of(&assert), "/catalog/book: 3\n//title: 3\n");
    }

    #[test]
    fn reads_stdin() {
        let mut cmd = Command::cargo_bin("xsniff").expect("Failed to find main binary");
        let assert = cmd
            .args(["--no-color", "/a/b[c='x']"])
            .write_stdin("<a><b><c>x</c></b><b><c>y</c></b></a>")
            .assert()
            .success();
        assert_eq!(stdout_of(&assert), "/a[1]/b[1]\n");
    }

    #[test]
    fn json_output() {
        let mut cmd = Command::cargo_bin("xsniff").expect("Failed to find main binary");
        let assert = cmd
            .args(["--json", "/a/b", "count(/a/b)"])
            .write_stdin("<a><b/><b/></a>")
            .assert()
            .success();
        let output: Value = serde_json::from_str(&stdout_of(&assert)).expect("valid JSON");
        assert_eq!(
            output,
            serde_json::json!({ "/a/b": ["/a[1]/b[1]", "/a[1]/b[2]"], "count(/a/b)": ["2"] })
        );
    }

    #[test]
    fn limit_stops_early() {
        let assert =
            run_main(&["--limit", "1", "//title/text()", "-f", "tests/data/catalog.xml"]).success();
        assert_eq!(stdout_of(&assert), "Dune\n");
    }

    #[test]
    fn limit_help_mentions_functions() {
        let assert = run_main(&["--help"]).success();
        assert!(stdout_of(&assert).contains("such as count()"));
    }

    #[test]
    fn namespace_bindings() {
        let assert = run_main(&[
            "-n",
            "b=urn:books",
            "//b:isbn/text()",
            "-f",
            "tests/data/catalog.xml",
        ])
        .success();
        assert_eq!(stdout_of(&assert), "978-0441013593\n");
    }

    #[test]
    fn temporary_document() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "<r><x n='1'/><x n='2'/><x n='3'/></r>").expect("write temp file");
        let path = file.path().to_str().expect("UTF-8 path");
        let assert = run_main(&["/r/x[@n>=2]", "-f", path]).success();
        assert_eq!(stdout_of(&assert), "/r[1]/x[2]\n/r[1]/x[3]\n");
    }

    #[test]
    fn invalid_query() {
        let assert = run_main(&["/a[", "-f", "tests/data/catalog.xml"]).failure().code(1);
        let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
        assert!(stderr.contains("/a["), "{stderr}");
    }

    #[test]
    fn malformed_document() {
        run_main(&["//book", "-f", "tests/data/broken.xml"]).failure().code(1);
    }

    #[test]
    fn nonexistent_file() {
        run_main(&["/a", "-f", "tests/data/missing.xml"]).failure().code(1);
    }

    #[test]
    fn explain_shows_the_shared_forest() {
        let assert = run_main(&["--explain", "/a/b", "/a/b[c='x']"]).success();
        let outline = stdout_of(&assert);
        assert_eq!(outline.matches("child::b").count(), 1, "{outline}");
        assert!(outline.contains("user-given"), "{outline}");
        assert!(outline.contains("[.='x']"), "{outline}");
    }

    #[test]
    fn man_pages() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = dir.path().to_str().expect("UTF-8 path");
        Command::cargo_bin("xsniff")
            .expect("Failed to find main binary")
            .args(["generate", "man", "-o", out])
            .assert()
            .success();
        assert!(dir.path().join("xsniff.1").exists());
        assert!(dir.path().join("xsniff-generate.1").exists());
    }
}
