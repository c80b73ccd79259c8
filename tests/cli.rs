//! End-to-end tests driving the built binary.
//!
//! Each test runs inside its own temp directory with `HOME` and
//! `XDG_CONFIG_HOME` redirected. External tools are substituted with fake
//! executables that record their invocations; the stream editor is the
//! real one, so the substitution scripts are actually exercised.

use assert_cmd::Command;
use chrono::Datelike;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let sandbox = Sandbox { root };
        fs::create_dir_all(sandbox.config_dir()).unwrap();
        fs::create_dir_all(sandbox.cal_dir()).unwrap();
        fs::create_dir_all(sandbox.bin_dir()).unwrap();
        sandbox
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn cal_dir(&self) -> PathBuf {
        self.path().join("cal")
    }

    fn bin_dir(&self) -> PathBuf {
        self.path().join("bin")
    }

    fn config_dir(&self) -> PathBuf {
        self.path().join("config").join("calpage")
    }

    fn log_path(&self) -> PathBuf {
        self.path().join("calls.log")
    }

    fn write_config(&self, commands: &str) {
        let config = format!(
            "base_dir = {:?}\n\n[commands]\n{}\n",
            self.cal_dir(),
            commands
        );
        fs::write(self.config_dir().join("config.toml"), config).unwrap();
    }

    fn write_file(&self, name: &str, contents: &str) {
        fs::write(self.cal_dir().join(name), contents).unwrap();
    }

    /// Install a fake executable that appends its argv to the call log.
    fn fake_bin(&self, name: &str, extra: &str) -> PathBuf {
        let path = self.bin_dir().join(name);
        let body = format!(
            "#!/bin/sh\n{extra}\necho \"{name} $*\" >> \"{log}\"\n",
            extra = extra,
            name = name,
            log = self.log_path().display()
        );
        fs::write(&path, body).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn calls(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("calpage").unwrap();
        cmd.env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .current_dir(self.path());
        cmd
    }
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn current_tag() -> String {
    let now = today();
    format!("{:02}{:02}", now.month(), now.year() % 100)
}

/// A sandbox wired for the render path: fake renderer/opener/VCS, real
/// stream editor. The fake renderer wraps the normalized event text in a
/// minimal upper-case HTML skeleton, the way pcal lays out its output.
fn publish_sandbox() -> Sandbox {
    let sandbox = Sandbox::new();

    let pcal = sandbox.fake_bin(
        "pcal",
        concat!(
            "printf '<HTML><HEAD><TITLE>Calendar %s</TITLE></HEAD>\\n' \"$4\"\n",
            "printf '<BODY BGCOLOR=\"#FFFFFF\">\\n'\n",
            "cat \"$3\"\n",
            "printf '</BODY></HTML>\\n'"
        ),
    );
    let open = sandbox.fake_bin("open", "");
    let git = sandbox.fake_bin("git", "");

    sandbox.write_config(&format!(
        "pcal = {:?}\nsed = \"sed\"\nopen = {:?}\ngit = {:?}",
        pcal, open, git
    ));

    let tag = current_tag();
    sandbox.write_file(
        "calendar.txt",
        &format!("RAWTOKEN first entry\n<a name=\"{}\">this month</a>\n", tag),
    );
    sandbox.write_file("pcal.sed", "s|RAWTOKEN|normalized-token|\n");

    sandbox
}

#[test]
fn render_decorates_page_and_publishes() {
    let sandbox = publish_sandbox();
    let year = today().year();
    let page = sandbox.cal_dir().join("html").join(format!("{}.html", year));

    sandbox
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{}.html", year)));

    let html = fs::read_to_string(&page).unwrap();
    let tag = current_tag();

    // the normalize step fed the renderer, not the raw event file
    assert!(html.contains("normalized-token"));
    assert!(!html.contains("RAWTOKEN"));

    // onload jump to the current month anchor
    assert!(html.contains(&format!("location.href='#{}'", tag)));

    // charset meta tag precedes the document title
    let meta = html.find("charset=utf-8").unwrap();
    let title = html.find("<TITLE>").unwrap();
    assert!(meta < title);

    // attribution follows the current month anchor
    let anchor = html.find(&format!("<a name=\"{}\">", tag)).unwrap();
    let attribution = html.find("Rendered by").unwrap();
    assert!(anchor < attribution);

    // external steps ran in order with the documented arguments
    let calls = sandbox.calls();
    let order: Vec<&str> = calls
        .lines()
        .map(|line| line.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(order, ["pcal", "open", "git", "git", "git"]);
    assert!(calls.contains("pcal -H -f"));
    assert!(calls.contains(&format!("open {}", page.display())));
    assert!(calls.contains("git add -A"));
    assert!(calls.contains("git commit -m update calendar"));
    assert!(calls.contains("git push"));
}

#[test]
fn render_accepts_an_explicit_year() {
    let sandbox = publish_sandbox();

    sandbox.cmd().arg("2031").assert().success();

    let page = sandbox.cal_dir().join("html").join("2031.html");
    assert!(page.exists());
    let calls = sandbox.calls();
    assert!(calls.contains("2031"));
}

#[test]
fn rerender_overwrites_the_page() {
    let sandbox = publish_sandbox();
    sandbox.cmd().arg("2031").assert().success();
    sandbox.cmd().arg("2031").assert().success();

    let page = sandbox.cal_dir().join("html").join("2031.html");
    let html = fs::read_to_string(&page).unwrap();
    // fully regenerated, not patched twice
    assert_eq!(html.matches("charset=utf-8").count(), 1);
}

#[test]
fn help_requests_exit_one_without_side_effects() {
    for arg in ["-h", "-?", "help"] {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg(arg)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Usage: calpage"));
        assert_eq!(sandbox.calls(), "");
    }
}

#[test]
fn unrecognized_positional_prints_usage() {
    let sandbox = Sandbox::new();
    sandbox.write_config("");
    sandbox
        .cmd()
        .arg("20x5")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage: calpage"));
}

#[test]
fn search_prints_matching_lines_only() {
    let sandbox = Sandbox::new();
    sandbox.write_config("");
    sandbox.write_file("calendar.txt", "2025-01-01 dentist\n2025-02-02 picnic\n");

    sandbox
        .cmd()
        .args(["-l", "dent"])
        .assert()
        .success()
        .stdout("2025-01-01 dentist\n");

    sandbox
        .cmd()
        .args(["-l", "no-such-entry"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    // bare -l prints everything
    sandbox
        .cmd()
        .arg("-l")
        .assert()
        .success()
        .stdout("2025-01-01 dentist\n2025-02-02 picnic\n");
}

#[test]
fn open_flags_open_one_file_and_nothing_else() {
    let cases = [
        ("-b", "birthdays.txt"),
        ("-e", "calendar.txt"),
        ("-t", "genealogy.txt"),
    ];

    for (flag, file) in cases {
        let sandbox = Sandbox::new();
        let open = sandbox.fake_bin("open", "");
        sandbox.write_config(&format!("open = {:?}", open));

        sandbox.cmd().arg(flag).assert().success();

        let calls = sandbox.calls();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines.len(), 1, "{} should invoke the opener once", flag);
        assert!(lines[0].starts_with("open "));
        assert!(lines[0].ends_with(file));
        assert!(!calls.contains("git"));
        assert!(!sandbox.cal_dir().join("html").exists());
    }
}

#[test]
fn launcher_flag_is_a_placeholder() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("-m")
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
    assert_eq!(sandbox.calls(), "");
}

#[test]
fn enter_directory_succeeds() {
    let sandbox = Sandbox::new();
    sandbox.write_config("");
    sandbox.cmd().arg("-d").assert().success();
    assert_eq!(sandbox.calls(), "");
}

#[test]
fn export_honors_the_minimum_date() {
    let sandbox = Sandbox::new();
    sandbox.write_config("");
    sandbox.write_file(
        "calendar.txt",
        "2019-05-01 ancient history\n\
         2025-03-01 10:00 standup\n\
         2025-03-05 trip begin\n\
         2025-03-07 trip end\n",
    );

    sandbox
        .cmd()
        .args(["-i", "2020-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("calendar.ics"));

    let ics = fs::read_to_string(sandbox.cal_dir().join("calendar.ics")).unwrap();
    assert!(ics.contains("BEGIN:VCALENDAR"));
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
    assert!(ics.contains("SUMMARY:standup"));
    assert!(ics.contains("SUMMARY:trip"));
    assert!(!ics.contains("ancient history"));
}

#[test]
fn missing_renderer_is_reported() {
    let sandbox = publish_sandbox();
    let open = sandbox.fake_bin("open", "");
    let git = sandbox.fake_bin("git", "");
    sandbox.write_config(&format!(
        "pcal = \"calpage-test-no-such-renderer\"\nsed = \"sed\"\nopen = {:?}\ngit = {:?}",
        open, git
    ));

    sandbox
        .cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
