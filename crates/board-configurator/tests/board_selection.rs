mod common;

use std::fs;

use board_configurator::discovery::discover;
use board_configurator::process::RunStatus;
use board_configurator::records::{BoardIdentity, FileRecord, MemoryRecord, RecordStore, ThingName};
use board_configurator::session::Session;
use board_configurator::state;

use common::{FakeRunner, fake_merge, tool_config, workspace, write};

#[test]
fn discovery_lists_board_properties_before_nested_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();
    let board_dir = ws.board_dir("espressif", "esp32");

    write(&board_dir.join("Kconfig"), "BOARD=1\n");
    write(&board_dir.join("extra_Kconfig"), "EXTRA=1\n");
    write(&board_dir.join("README.md"), "not a definition\n");
    write(&board_dir.join("aws_demos/config_files/ota_Kconfig"), "OTA=1\n");
    write(
        &board_dir.join("aws_demos/config_files/FreeRTOSIP_Kconfig"),
        "IP=1\n",
    );
    write(&board_dir.join("aws_demos/config_files/iot_config.h"), "");
    write(&board_dir.join("aws_demos/config_files/deeper/x_Kconfig"), "");

    let files = discover(&ws, &cfg.discovery, "espressif", "esp32").expect("discover");
    assert_eq!(
        files,
        vec![
            board_dir.join("Kconfig"),
            board_dir.join("extra_Kconfig"),
            board_dir.join("aws_demos/config_files/FreeRTOSIP_Kconfig"),
            board_dir.join("aws_demos/config_files/ota_Kconfig"),
        ]
    );
}

#[test]
fn unsorted_discovery_still_keeps_groups_apart() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let mut cfg = tool_config();
    cfg.discovery.sort = false;
    let board_dir = ws.board_dir("nordic", "nrf52840-dk");

    write(&board_dir.join("b_Kconfig"), "");
    write(&board_dir.join("a_Kconfig"), "");
    write(&board_dir.join("aws_demos/config_files/z_Kconfig"), "");
    write(&board_dir.join("aws_demos/config_files/y_Kconfig"), "");

    let mut files = discover(&ws, &cfg.discovery, "nordic", "nrf52840-dk").expect("discover");
    assert_eq!(files.len(), 4);
    let mut nested = files.split_off(2);
    files.sort();
    nested.sort();
    assert_eq!(files, vec![board_dir.join("a_Kconfig"), board_dir.join("b_Kconfig")]);
    assert_eq!(
        nested,
        vec![
            board_dir.join("aws_demos/config_files/y_Kconfig"),
            board_dir.join("aws_demos/config_files/z_Kconfig"),
        ]
    );
}

#[cfg(unix)]
#[test]
fn discovery_follows_symlinked_definitions() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();
    let board_dir = ws.board_dir("st", "stm32l475_discovery");
    let shared = tmp.path().join("shared/common_Kconfig");
    write(&shared, "COMMON=1\n");
    write(&board_dir.join("Kconfig"), "BOARD=1\n");
    std::os::unix::fs::symlink(&shared, board_dir.join("linked_Kconfig")).expect("symlink");
    std::os::unix::fs::symlink(
        tmp.path().join("missing_Kconfig"),
        board_dir.join("broken_Kconfig"),
    )
    .expect("dangling symlink");

    let files = discover(&ws, &cfg.discovery, "st", "stm32l475_discovery").expect("discover");
    assert_eq!(
        files,
        vec![board_dir.join("Kconfig"), board_dir.join("linked_Kconfig")]
    );
}

#[test]
fn discovery_of_unknown_board_is_empty() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();
    write(&ws.board_dir("pc", "linux").join("notes.txt"), "");

    assert!(
        discover(&ws, &cfg.discovery, "nobody", "nothing")
            .expect("discover")
            .is_empty()
    );
    assert!(
        discover(&ws, &cfg.discovery, "pc", "linux")
            .expect("discover")
            .is_empty()
    );
    assert!(discover(&ws, &cfg.discovery, "", "linux").is_err());
}

#[test]
fn select_board_merges_with_board_overrides_winning() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();
    let board_dir = ws.board_dir("espressif", "esp32");

    write(&ws.base_definition, "OPT=1\nSHARED=base\n");
    write(&board_dir.join("Kconfig"), "OPT=2\n");
    write(&board_dir.join("aws_demos/config_files/ota_Kconfig"), "OTA_TIMEOUT=30\n");

    let runner = FakeRunner::new(fake_merge);
    let boards = MemoryRecord::<BoardIdentity>::default();
    let things = MemoryRecord::<ThingName>::default();
    let session = Session::new(&cfg, &ws, &runner, &boards, &things);

    let board = BoardIdentity::new("espressif", "esp32");
    let files = session.select_board(&board).expect("select board");
    assert_eq!(files.len(), 2);

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "fake-merge");
    assert_eq!(
        calls[0].args,
        vec![
            ws.base_definition.display().to_string(),
            ws.state_file.display().to_string(),
            board_dir.join("Kconfig").display().to_string(),
            board_dir
                .join("aws_demos/config_files/ota_Kconfig")
                .display()
                .to_string(),
        ]
    );

    let text = fs::read_to_string(&ws.state_file).expect("read state");
    assert_eq!(state::lookup(&text, "OPT").as_deref(), Some("2"));
    assert_eq!(state::lookup(&text, "SHARED").as_deref(), Some("base"));
    assert_eq!(state::lookup(&text, "OTA_TIMEOUT").as_deref(), Some("30"));
    assert_eq!(boards.load().expect("load"), Some(board));
}

#[test]
fn failed_merge_does_not_record_the_board() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();
    write(&ws.base_definition, "OPT=1\n");

    let runner = FakeRunner::new(|_| RunStatus::exited(1));
    let boards = MemoryRecord::<BoardIdentity>::default();
    let things = MemoryRecord::<ThingName>::default();
    let session = Session::new(&cfg, &ws, &runner, &boards, &things);

    let err = session
        .select_board(&BoardIdentity::new("espressif", "esp32"))
        .unwrap_err()
        .to_string();
    assert!(err.contains("step 'merge' failed"), "unexpected err: {err}");
    assert_eq!(boards.load().expect("load"), None);
}

#[test]
fn missing_base_definition_is_fatal_before_running_anything() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ws = workspace(tmp.path());
    let cfg = tool_config();

    let runner = FakeRunner::ok();
    let boards = MemoryRecord::<BoardIdentity>::default();
    let things = MemoryRecord::<ThingName>::default();
    let session = Session::new(&cfg, &ws, &runner, &boards, &things);

    assert!(session.select_board(&BoardIdentity::new("pc", "linux")).is_err());
    assert!(runner.calls.borrow().is_empty());
}

#[test]
fn board_record_survives_a_fresh_store() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("boardChoice.csv");

    let empty: Option<BoardIdentity> = FileRecord::new(&path).load().expect("load");
    assert_eq!(empty, None);

    FileRecord::new(&path)
        .save(&BoardIdentity::new("espressif", "esp32"))
        .expect("save");
    assert_eq!(fs::read_to_string(&path).expect("read"), "espressif,esp32");

    let reloaded: Option<BoardIdentity> = FileRecord::new(&path).load().expect("reload");
    assert_eq!(reloaded, Some(BoardIdentity::new("espressif", "esp32")));
}
