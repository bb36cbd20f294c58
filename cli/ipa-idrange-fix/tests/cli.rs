//! End-to-end runs of the binary against dump files.

use std::fs;
use std::path::{Path, PathBuf};
use std::io::Write;
use std::process::{Command, Output, Stdio};

const RANGES: &str = "\
dn: cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com
cn: EXAMPLE.COM_id_range
ipaBaseID: 1000
ipaIDRangeSize: 200000
ipaBaseRID: 1000
ipaSecondaryBaseRID: 100000000
ipaRangeType: ipa-local

dn: cn=legacy,cn=ranges,cn=etc,dc=example,dc=com
cn: legacy
ipaBaseID: 300000
ipaIDRangeSize: 100000
ipaRangeType: ipa-local
";

const OUTOFRANGE: &str = "\
dn: uid=alice,cn=users,cn=accounts,dc=example,dc=com
uidNumber: 500000

dn: cn=staff,cn=groups,cn=accounts,dc=example,dc=com
gidNumber: 500010
";

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        Self { dir }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().unwrap()
    }

    fn run_with_input(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    }

    fn command(&self, args: &[&str]) -> Command {
        let config = self.path("config.json");
        let mut command = Command::new(env!("CARGO_BIN_EXE_ipa-idrange-fix"));
        command
            .arg("--config")
            .arg(&config)
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("IDRANGE_LDAP_URI")
            .env_remove("IDRANGE_RID_OFFSET")
            .env_remove("IDRANGE_RANGE_GAP")
            .env_remove("IDRANGE_MIN_RANGE")
            .env_remove("IDRANGE_ALLOW_UNDER_1000")
            .env_remove("IDRANGE_NO_ROUNDING");
        command
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn fix_writes_ldif_for_rid_bases_and_new_range() {
    let ws = Workspace::new();
    let ranges = ws.file("ranges.ldif", RANGES);
    let outofrange = ws.file("outofranges.ldif", OUTOFRANGE);
    let ldif = ws.path("changes.ldif");

    let output = ws.run(&[
        "fix",
        "--ranges",
        arg(&ranges),
        "--outofrange",
        arg(&outofrange),
        "--ldif",
        arg(&ldif),
        "--unattended",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let written = fs::read_to_string(&ldif).unwrap();
    assert!(written.contains(
        "dn: cn=legacy,cn=ranges,cn=etc,dc=example,dc=com\nchangetype: modify\n"
    ));
    assert!(written.contains("ipaBaseRID: 301000\n"));
    assert!(written.contains("ipaSecondaryBaseRID: 100300000\n"));
    assert!(written.contains(
        "dn: cn=EXAMPLE.COM_id_range_001,cn=ranges,cn=etc,dc=example,dc=com\nchangetype: add\n"
    ));
    assert!(written.contains("ipaBaseRID: 501000\n"));

    let legacy = written.find("cn=legacy,").unwrap();
    let fresh = written.find("cn=EXAMPLE.COM_id_range_001,").unwrap();
    assert!(legacy < fresh);
}

#[test]
fn declining_the_prompt_changes_nothing() {
    let ws = Workspace::new();
    let ranges = ws.file("ranges.ldif", RANGES);
    let outofrange = ws.file("outofranges.ldif", OUTOFRANGE);
    let ldif = ws.path("changes.ldif");

    let output = ws.run_with_input(
        &[
            "fix",
            "--ranges",
            arg(&ranges),
            "--outofrange",
            arg(&outofrange),
            "--ldif",
            arg(&ldif),
        ],
        "no\n",
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Type 'yes' to continue"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Not proceeding."));
    assert!(!ldif.exists());
}

#[test]
fn analyze_json_reports_plan() {
    let ws = Workspace::new();
    let ranges = ws.file("ranges.ldif", RANGES);
    let outofrange = ws.file("outofranges.ldif", OUTOFRANGE);

    let output = ws.run(&[
        "--format",
        "json",
        "analyze",
        "--ranges",
        arg(&ranges),
        "--outofrange",
        arg(&outofrange),
    ]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["schemaVersion"], "ipa-idrange-fix.v1");
    assert_eq!(report["data"]["changes"].as_array().unwrap().len(), 2);
    assert_eq!(report["data"]["plan"]["new_ranges"][0]["name"], "EXAMPLE.COM_id_range_001");
}

#[test]
fn overlapping_ranges_fail_without_changes() {
    let ws = Workspace::new();
    let overlapping = format!(
        "{RANGES}\ndn: cn=clash,cn=ranges,cn=etc,dc=example,dc=com\ncn: clash\n\
         ipaBaseID: 350000\nipaIDRangeSize: 1000\nipaRangeType: ipa-local\n"
    );
    let ranges = ws.file("ranges.ldif", &overlapping);
    let ldif = ws.path("changes.ldif");

    let output = ws.run(&[
        "fix",
        "--ranges",
        arg(&ranges),
        "--ldif",
        arg(&ldif),
        "--unattended",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("overlap"));
    assert!(!ldif.exists());
}

#[test]
fn missing_range_file_is_an_error() {
    let ws = Workspace::new();
    let output = ws.run(&["analyze", "--ranges", arg(&ws.path("absent.txt"))]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}
