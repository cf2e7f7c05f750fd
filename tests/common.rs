#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub fn psync() -> Command {
    let mut cmd = cargo_bin_cmd!("punchsync");
    // never pick up real credentials from the developer's shell
    for var in [
        "ZOHO_CLIENT_ID",
        "ZOHO_CLIENT_SECRET",
        "ZOHO_REFRESH_TOKEN",
        "ZOHO_DOMAIN",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_punchsync.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    fs::remove_file(&db_path).ok();
    db_path
}

/// Config path that does not exist: every setting falls back to defaults
pub fn missing_config(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_punchsync_missing.conf", name));
    let p = path.to_string_lossy().to_string();
    fs::remove_file(&p).ok();
    p
}

/// `psync --db <db> --config <missing> --test <args..>`
pub fn psync_with(db: &str, cfg: &str) -> Command {
    let mut cmd = psync();
    cmd.args(["--db", db, "--config", cfg, "--test"]);
    cmd
}

/// Initialize DB (creates tables)
pub fn init_db(db: &str, cfg: &str) {
    psync_with(db, cfg).arg("init").assert().success();
}

/// Write a terminal export: attlog.dat lines and an optional users.csv
pub fn write_export(dir: &Path, punches: &[(i64, &str)], users: &[(i64, &str)]) {
    fs::create_dir_all(dir).expect("create export dir");

    let attlog: String = punches
        .iter()
        .map(|(id, ts)| format!("{:>6}\t{}\t1\t0\t0\t0\n", id, ts))
        .collect();
    fs::write(dir.join("attlog.dat"), attlog).expect("write attlog");

    if !users.is_empty() {
        let mut csv = String::from("user_id,name\n");
        for (id, name) in users {
            csv.push_str(&format!("{},{}\n", id, name));
        }
        fs::write(dir.join("users.csv"), csv).expect("write users");
    }
}
