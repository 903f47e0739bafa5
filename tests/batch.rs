use jsfix::config::Config;
use jsfix::driver::{self, BatchOptions};
use jsfix::report::FileStatus;
use jsfix::rules::RuleKind;
use jsfix::scanner;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Copies a fixture project into a scratch directory so runs can write.
fn scratch(name: &str) -> TempDir {
    let source = fixture(name);
    let dir = TempDir::new().unwrap();
    for entry in WalkDir::new(&source) {
        let entry = entry.unwrap();
        let target = dir.path().join(entry.path().strip_prefix(&source).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    dir
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap()
        .to_string_lossy()
        .replace('\\', "/")
}

fn read(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join(file)).unwrap()
}

#[test]
fn scan_skips_ignored_and_vendored_directories() {
    let root = fixture("legacy");
    let config = Config {
        paths: vec![root.clone()],
        ignore_dirs: vec!["vendor".into()],
        ..Config::default()
    };
    let files = scanner::collect_js_files(&config.roots(), &config.ignore_patterns().unwrap()).unwrap();
    let names: Vec<_> = files.iter().map(|f| relative(&root, f)).collect();
    assert_eq!(
        names,
        vec!["src/counter.js", "src/loops.js", "src/state.js", "src/uses.js"]
    );
}

#[test]
fn leaking_globals_across_a_project() {
    let dir = scratch("legacy");
    let config = Config::load(&dir.path().join("jsfix.json")).unwrap();
    let options = BatchOptions {
        roots: config.roots(),
        ignore: config.ignore_patterns().unwrap(),
        write: true,
    };
    let report = driver::run(
        RuleKind::LeakingGlobalVars,
        &options,
        &config.settings().unwrap(),
        |_, _, _| true,
    )
    .unwrap();

    assert_eq!(report.summary.files_scanned, 4);
    assert_eq!(report.summary.files_written, 1);
    assert_eq!(report.summary.files_failed, 0);

    insta::assert_snapshot!(read(dir.path(), "src/counter.js"), @r"
    function test() {
      var i;
      i = 0;
    }
    ");
    // `count` is assigned at the top of a file, so other files may rely on it.
    assert_eq!(
        read(dir.path(), "src/state.js"),
        "count = 0;\nfunction bump() { count++; }\n"
    );
    assert_eq!(
        read(dir.path(), "vendor/lib.js"),
        "function vendored() { leaked = 1; }\n"
    );

    let again = driver::run(
        RuleKind::LeakingGlobalVars,
        &options,
        &config.settings().unwrap(),
        |_, _, _| true,
    )
    .unwrap();
    assert_eq!(again.summary.files_changed, 0);
}

#[test]
fn block_scoped_vars_dry_run_reports_output() {
    let root = fixture("legacy");
    let options = BatchOptions::new(vec![root.join("src")]);
    let report = driver::run(
        RuleKind::BlockScopedVars,
        &options,
        &Config::default().settings().unwrap(),
        |_, _, _| false,
    )
    .unwrap();

    let changed: Vec<_> = report.changed().collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].status, FileStatus::Changed);
    assert_eq!(relative(&root, &changed[0].path), "src/loops.js");
    insta::assert_snapshot!(changed[0].output.as_deref().unwrap(), @r"
    function sum(list) {
      var total = 0, i, n;
      for (i = 0, n = list.length; i < n; i++) {
        total += list[i];
      }
      return total;
    }
    ");
}

#[test]
fn report_serializes_for_tooling() {
    let dir = scratch("legacy");
    let options = BatchOptions {
        write: true,
        ..BatchOptions::new(vec![dir.path().join("src")])
    };
    let report = driver::run(
        RuleKind::BlockScopedVars,
        &options,
        &Config::default().settings().unwrap(),
        |_, _, _| true,
    )
    .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rule"], "block-scoped-vars");
    assert_eq!(json["summary"]["files_written"], 1);
    let statuses: Vec<_> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["unchanged", "written", "unchanged", "unchanged"]);
}
