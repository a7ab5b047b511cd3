use std::fs;

use hive_setup_lib::block::{BlockAction, BlockMarkers};
use hive_setup_lib::edit::FileEditSession;
use tempfile::TempDir;

fn body(lines: &[&str]) -> Vec<String> {
  lines.iter().map(|l| l.to_string()).collect()
}

#[test]
fn crlf_file_stays_crlf() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("config.txt");
  fs::write(&path, "a=1\r\nb=2\r\n").unwrap();
  let markers = BlockMarkers::hive();

  let edit = FileEditSession::open(&path)
    .unwrap()
    .apply_block(&markers, &body(&["c=3"]))
    .unwrap();

  assert_eq!(edit.action, BlockAction::Inserted);
  let content = fs::read_to_string(&path).unwrap();
  assert_eq!(
    content,
    format!("a=1\r\nb=2\r\n\r\n{}\r\nc=3\r\n{}\r\n", markers.start, markers.end)
  );
  assert!(!content.replace("\r\n", "").contains('\n'));
}

#[test]
fn edits_leave_no_temporary_files() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("fstab");
  fs::write(&path, "proc /proc proc defaults 0 0\n").unwrap();
  let markers = BlockMarkers::hive();

  for value in ["one", "two", "two"] {
    FileEditSession::open(&path)
      .unwrap()
      .apply_block(&markers, &body(&[value]))
      .unwrap();
  }

  let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
  assert_eq!(entries.len(), 1);
  let content = fs::read_to_string(&path).unwrap();
  assert!(content.contains("\ntwo\n"));
  assert!(!content.contains("one"));
}

#[test]
fn custom_markers_are_independent() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("config.txt");
  fs::write(&path, "").unwrap();
  let hive = BlockMarkers::hive();
  let other = BlockMarkers::new("# BEGIN other", "# END other");

  FileEditSession::open(&path).unwrap().apply_block(&hive, &body(&["x"])).unwrap();
  FileEditSession::open(&path).unwrap().apply_block(&other, &body(&["y"])).unwrap();
  FileEditSession::open(&path).unwrap().apply_block(&hive, &body(&["z"])).unwrap();

  let content = fs::read_to_string(&path).unwrap();
  assert_eq!(
    content,
    format!(
      "{}\nz\n{}\n\n# BEGIN other\ny\n# END other\n",
      hive.start, hive.end
    )
  );
}
