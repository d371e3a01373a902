#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a CSV file from a header line and data lines.
    pub fn write_csv(&self, name: &str, header: &str, rows: &[String]) -> PathBuf {
        let mut contents = String::from(header);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        self.write(name, &contents)
    }
}

/// Item master pair: 25 items where the legacy prefix is `MM`.
///
/// The target `STAT` is "20" except for the two items of type "SRV", which
/// carry "90"; `LOCATION` is always "EU"; `NAME` copies `MMFUDS`.
pub fn write_item_master(workspace: &TestWorkspace) -> (PathBuf, PathBuf) {
    let mut legacy = Vec::new();
    let mut target = Vec::new();
    for i in 0..25 {
        let item_type = if i == 3 || i == 17 {
            "SRV"
        } else if i % 2 == 0 {
            "FIN"
        } else {
            "RAW"
        };
        let stat = if item_type == "SRV" { "90" } else { "20" };
        legacy.push(format!("A{i:03},{item_type},WH{},Part {i}", i % 3));
        target.push(format!("A{i:03},Part {i},EU,{stat}"));
    }
    let legacy_path = workspace.write_csv("MITMAS.csv", "MMITNO,MMITTY,MMWHLO,MMFUDS", &legacy);
    let target_path = workspace.write_csv("ITEM.csv", "ITNO,NAME,LOCATION,STAT", &target);
    (legacy_path, target_path)
}
