use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn file_renamer(state_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("file-renamer").expect("binary");
    cmd.env("FILE_RENAMER_STATE_DIR", state_dir)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn dry_run_lists_plan_without_renaming() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path().join("files");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("IMG_0001_edit.jpeg"), b"x").expect("write");

    file_renamer(&temp.path().join("state"))
        .args(["rename", "--dir"])
        .arg(&root)
        .args(["--ext", ".jpeg", "--new-ext", ".jpg", "--pattern", "_edit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IMG_0001.jpg"))
        .stderr(predicate::str::contains("dry-run"));

    assert!(root.join("IMG_0001_edit.jpeg").exists());
    assert!(!root.join("IMG_0001.jpg").exists());
}

#[test]
fn apply_then_restore_round_trips() {
    let temp = tempdir().expect("tempdir");
    let state = temp.path().join("state");
    let root = temp.path().join("files");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("notes.txt"), b"body").expect("write");

    file_renamer(&state)
        .args(["rename", "--apply", "--new-ext", ".md", "--dir"])
        .arg(&root)
        .assert()
        .success();
    assert!(root.join("notes.md").exists());
    assert!(root.join("notes.txt.bak").exists());

    file_renamer(&state)
        .args(["restore", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"restored\""));
    assert_eq!(fs::read(root.join("notes.txt")).expect("read"), b"body");
    assert!(!root.join("notes.md").exists());
    assert!(!root.join("notes.txt.bak").exists());
}

#[test]
fn restore_without_history_fails_gracefully() {
    let temp = tempdir().expect("tempdir");

    file_renamer(&temp.path().join("state"))
        .arg("restore")
        .assert()
        .failure()
        .stderr(predicate::str::contains("取り消し可能な履歴がありません"));
}

#[test]
fn invalid_pattern_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path().join("files");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("a.txt"), b"a").expect("write");

    file_renamer(&temp.path().join("state"))
        .args(["rename", "--apply", "--new-ext", ".md", "--pattern", "(", "--dir"])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("正規表現が不正です"));

    assert!(root.join("a.txt").exists());
    assert!(!root.join("a.txt.bak").exists());
}

#[test]
fn unlock_clears_a_leftover_lock_so_restore_can_run() {
    let temp = tempdir().expect("tempdir");
    let state = temp.path().join("state");
    let root = temp.path().join("files");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("notes.txt"), b"body").expect("write");

    file_renamer(&state)
        .args(["rename", "--apply", "--new-ext", ".md", "--dir"])
        .arg(&root)
        .assert()
        .success();
    // owner unknown, so only an explicit unlock releases it
    fs::write(state.join("rename.lock"), b"").expect("leave lock");

    file_renamer(&state)
        .arg("restore")
        .assert()
        .failure()
        .stderr(predicate::str::contains("別のリネーム処理が実行中です"));

    file_renamer(&state)
        .arg("unlock")
        .assert()
        .success()
        .stdout(predicate::str::contains("ロックを解除しました"));
    assert!(!state.join("rename.lock").exists());

    file_renamer(&state).arg("restore").assert().success();
    assert_eq!(fs::read(root.join("notes.txt")).expect("read"), b"body");
}
