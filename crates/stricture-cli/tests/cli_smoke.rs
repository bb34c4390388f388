use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "stricture-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.path.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir should be created");
        }
        fs::write(path, contents).expect("fixture should be written");
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_stricture<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_stricture");
    Command::new(bin)
        .args(args)
        .output()
        .expect("stricture command should execute")
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout should be json ({err}):\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        )
    })
}

const MANIFEST: &str = r#"
contracts:
  - id: shop
    endpoints:
      - path: /orders/{id}
        method: GET
        status_codes: [200, 404]
        response:
          name: Order
          fields:
            - { name: id, type: string }
            - { name: shipping, type: object, nullable: true }
"#;

const GUARDED: &str = r#"{
  "functions": [{
    "name": "shippingCity",
    "location": { "line": 1 },
    "body": [
      {
        "node": "conditional",
        "guard": { "kind": "null-check", "subject": "order.shipping" },
        "then_branch": [
          {
            "node": "property_access",
            "base": "order.shipping",
            "property": "city",
            "owner_type": "Order",
            "location": { "line": 3 }
          }
        ],
        "location": { "line": 2 }
      }
    ]
  }]
}"#;

const UNGUARDED: &str = r#"{
  "functions": [{
    "name": "shippingCity",
    "location": { "line": 1 },
    "body": [
      {
        "node": "property_access",
        "base": "order.shipping",
        "property": "city",
        "owner_type": "Order",
        "location": { "line": 2 }
      }
    ]
  }]
}"#;

#[test]
fn rules_json_lists_every_builtin_rule_sorted() {
    let output = run_stricture(["rules", "--json"]);
    assert!(output.status.success());
    let rules = parse_json_stdout(&output);
    let ids: Vec<&str> = rules
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|rule| rule.get("id").and_then(Value::as_str))
        .collect();
    assert_eq!(ids.len(), 12);
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert!(ids.contains(&"CTR-null-safety"));
    assert!(ids.contains(&"ARCH-no-circular-deps"));
}

#[test]
fn check_exits_nonzero_on_error_violations() {
    let dir = TempDirGuard::new("check-dirty");
    dir.write("stricture.yml", MANIFEST);
    dir.write("src/orders.ts.ir.json", UNGUARDED);
    let manifest = dir.path().join("stricture.yml");

    let output = run_stricture([
        OsStr::new("check"),
        OsStr::new("--format"),
        OsStr::new("json"),
        OsStr::new("--manifest"),
        manifest.as_os_str(),
        dir.path().as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let report = parse_json_stdout(&output);
    let violations = report["violations"].as_array().expect("violations");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["ruleId"], "CTR-null-safety");
    assert_eq!(violations[0]["file"], "src/orders.ts");
    assert_eq!(report["summary"]["complete"], true);
}

#[test]
fn check_passes_on_guarded_source() {
    let dir = TempDirGuard::new("check-clean");
    dir.write("stricture.yml", MANIFEST);
    dir.write("src/orders.ts.ir.json", GUARDED);
    let manifest = dir.path().join("stricture.yml");

    let output = run_stricture([
        OsStr::new("check"),
        OsStr::new("-m"),
        manifest.as_os_str(),
        dir.path().as_os_str(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout:\n{stdout}");
    assert!(stdout.contains("0 error(s)"));
}

#[test]
fn invalid_manifest_is_fatal() {
    let dir = TempDirGuard::new("bad-manifest");
    dir.write(
        "stricture.yml",
        "rules:\n  ARCH-max-file-lines:\n    max: -5\n",
    );
    let manifest = dir.path().join("stricture.yml");

    let output = run_stricture([OsStr::new("validate-manifest"), manifest.as_os_str()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line maximum must be positive"), "stderr:\n{stderr}");
}

#[test]
fn options_for_unknown_rules_are_reported_as_warnings() {
    let dir = TempDirGuard::new("unknown-options");
    dir.write("stricture.yml", "rules:\n  CTR-made-up:\n    severity: warn\n");
    let manifest = dir.path().join("stricture.yml");

    let output = run_stricture([
        OsStr::new("validate-manifest"),
        manifest.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert!(output.status.success());
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["valid"], true);
    assert_eq!(
        payload["warnings"][0],
        "options for unknown rule CTR-made-up are ignored"
    );
}
