//! Video, audio, disk, input and runtime imports driven by small WAT cores.

mod common;

use std::fs;
use std::time::Duration;

use common::{Harness, Recorder, words};
use snowport_core::RunOutcome;
use snowport_core::host::AudioFormat;
use snowport_core::host::disk::DirectoryDisks;
use snowport_core::host::input::SharedInput;
use snowport_core::host::system::SystemRuntime;

#[test]
fn video_calls_reach_the_host() {
    let mut h = Harness::new();
    h.run(
        r#"
        (module
          (import "env" "js_did_open_video" (func $open (param i32 i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 16) "\01\02\03\04")
          (func (export "_start")
            (call $open (i32.const 1) (i32.const 1))
            (call $blit (i32.const 16) (i32.const 4))))
        "#,
    );

    assert_eq!(h.recorder.calls().video_opens, vec![(1, 1)]);
    assert_eq!(h.frames(), vec![vec![1, 2, 3, 4]]);
}

#[test]
fn out_of_bounds_blit_is_dropped() {
    let mut h = Harness::new();
    let outcome = h.run(
        r#"
        (module
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (func (export "_start") (call $blit (i32.const 65530) (i32.const 100))))
        "#,
    );

    assert_eq!(outcome, RunOutcome::Returned);
    assert!(h.frames().is_empty());
}

#[test]
fn audio_is_forwarded_with_its_format() {
    let mut h = Harness::build(Recorder::with_buffered(4096), |host| host);
    h.run(
        r#"
        (module
          (import "env" "js_did_open_audio" (func $open (param i32 i32 i32)))
          (import "env" "js_audio_buffer_size" (func $size (result i32)))
          (import "env" "js_enqueue_audio" (func $enqueue (param i32 i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 32) "\aa\bb\cc\dd")
          (func (export "_start")
            (call $open (i32.const 22050) (i32.const 32) (i32.const 2))
            (call $enqueue (i32.const 32) (i32.const 4))
            (i32.store (i32.const 0) (call $size))
            (call $blit (i32.const 0) (i32.const 4))))
        "#,
    );

    let calls = h.recorder.calls();
    assert_eq!(
        calls.audio_formats,
        vec![AudioFormat {
            sample_rate: 22_050,
            sample_size_bits: 32,
            channels: 2,
        }]
    );
    assert_eq!(calls.samples, vec![0xaa, 0xbb, 0xcc, 0xdd]);
    assert_eq!(words(&calls.frames[0]), vec![4096]);
}

#[test]
fn unknown_audio_backlog_reads_as_minus_one() {
    let mut h = Harness::new();
    h.run(
        r#"
        (module
          (import "env" "js_audio_buffer_size" (func $size (result i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (i32.store (i32.const 0) (call $size))
            (call $blit (i32.const 0) (i32.const 4))))
        "#,
    );

    assert_eq!(words(&h.frames()[0]), vec![-1]);
}

const DISK_CORE: &str = r#"
(module
  (import "env" "js_disk_open" (func $open (param i32) (result i32)))
  (import "env" "js_disk_size" (func $size (param i32) (result f64)))
  (import "env" "js_disk_read" (func $read (param i32 i32 f64 f64) (result f64)))
  (import "env" "js_disk_write" (func $write (param i32 i32 f64 f64) (result f64)))
  (import "env" "js_disk_close" (func $close (param i32)))
  (import "env" "js_blit" (func $blit (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 256) "hd.img\00")
  (data (i32.const 272) "missing.img\00")
  (data (i32.const 48) "ZZ")
  (func (export "_start")
    (local $id i32)
    (local.set $id (call $open (i32.const 256)))
    (i32.store (i32.const 200) (local.get $id))
    (i32.store (i32.const 204) (i32.trunc_f64_s (call $size (local.get $id))))
    (i32.store (i32.const 208)
      (i32.trunc_f64_s (call $read (local.get $id) (i32.const 100) (f64.const 2) (f64.const 4))))
    (i32.store (i32.const 212)
      (i32.trunc_f64_s (call $read (local.get $id) (i32.const 100) (f64.const 0) (f64.const -1))))
    (i32.store (i32.const 216)
      (i32.trunc_f64_s (call $write (local.get $id) (i32.const 48) (f64.const 8) (f64.const 2))))
    (i32.store (i32.const 220) (call $open (i32.const 272)))
    (call $close (local.get $id))
    (i32.store (i32.const 224) (i32.trunc_f64_s (call $size (local.get $id))))
    (call $blit (i32.const 100) (i32.const 4))
    (call $blit (i32.const 200) (i32.const 28))))
"#;

#[test]
fn disk_calls_move_bytes_through_guest_memory() {
    let disks = tempfile::tempdir().unwrap();
    fs::write(disks.path().join("hd.img"), b"0123456789").unwrap();
    let root = disks.path().to_path_buf();
    let mut h = Harness::with_host(move |host| host.with_disk(DirectoryDisks::new(root)));

    h.run(DISK_CORE);

    let frames = h.frames();
    assert_eq!(frames[0], b"2345");
    // id, size, read, invalid read, write, missing open, size after close
    assert_eq!(words(&frames[1]), vec![1, 10, 4, -1, 2, -1, -1]);
    assert_eq!(fs::read(disks.path().join("hd.img")).unwrap(), b"01234567ZZ");
}

const CDROM_CORE: &str = r#"
(module
  (import "env" "js_consume_cdrom_name" (func $cdrom (result i32)))
  (import "env" "js_free" (func $free (param i32)))
  (import "env" "js_blit" (func $blit (param i32 i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global $frees (mut i32) (i32.const 0))
  (func (export "malloc") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $len)))
    (local.get $ptr))
  (func (export "free") (param i32)
    (global.set $frees (i32.add (global.get $frees) (i32.const 1))))
  (func (export "_start")
    (local $name i32)
    (local.set $name (call $cdrom))
    (call $blit (local.get $name) (i32.const 6))
    (call $free (local.get $name))
    (i32.store (i32.const 0) (local.get $name))
    (i32.store (i32.const 4) (call $cdrom))
    (i32.store (i32.const 8) (global.get $frees))
    (call $blit (i32.const 0) (i32.const 12))))
"#;

#[test]
fn cdrom_names_are_copied_into_guest_allocations() {
    let disks = tempfile::tempdir().unwrap();
    let mut cdroms = DirectoryDisks::new(disks.path());
    cdroms.insert_cdrom("a.iso");
    let mut h = Harness::with_host(move |host| host.with_disk(cdroms));

    h.run(CDROM_CORE);

    let frames = h.frames();
    assert_eq!(frames[0], b"a.iso\0");
    // pointer from malloc, nothing pending afterwards, one free
    assert_eq!(words(&frames[1]), vec![1024, 0, 1]);
}

#[test]
fn input_getters_read_one_locked_snapshot() {
    let input = SharedInput::new();
    let writer = input.writer();
    writer.mouse_position(10, 20);
    writer.mouse_button(true);
    assert!(writer.key(42, true));
    let mut h = Harness::with_host(move |host| host.with_input(input));

    h.run(
        r#"
        (module
          (import "env" "js_acquire_input_lock" (func $acquire (result i32)))
          (import "env" "js_release_input_lock" (func $release))
          (import "env" "js_has_mouse_position" (func $has_pos (result i32)))
          (import "env" "js_get_mouse_x_position" (func $x (result i32)))
          (import "env" "js_get_mouse_y_position" (func $y (result i32)))
          (import "env" "js_get_mouse_button_state" (func $button (result i32)))
          (import "env" "js_has_key_event" (func $has_key (result i32)))
          (import "env" "js_get_key_code" (func $key_code (result i32)))
          (import "env" "js_get_key_state" (func $key_state (result i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (i32.store (i32.const 0) (call $acquire))
            (i32.store (i32.const 4) (call $has_pos))
            (i32.store (i32.const 8) (call $x))
            (i32.store (i32.const 12) (call $y))
            (i32.store (i32.const 16) (call $button))
            (i32.store (i32.const 20) (call $has_key))
            (i32.store (i32.const 24) (call $key_code))
            (i32.store (i32.const 28) (call $key_state))
            (call $release)
            (i32.store (i32.const 32) (call $acquire))
            (i32.store (i32.const 36) (call $has_key))
            (i32.store (i32.const 40) (call $button))
            (call $release)
            (call $blit (i32.const 0) (i32.const 44))))
        "#,
    );

    assert_eq!(
        words(&h.frames()[0]),
        vec![1, 1, 10, 20, 1, 1, 42, 1, 1, 0, -1]
    );
}

#[test]
fn runtime_calls_are_forwarded() {
    let mut h = Harness::new();
    h.run(
        r#"
        (module
          (import "env" "js_sleep" (func $sleep (param f64)))
          (import "env" "js_check_for_periodic_tasks" (func $check))
          (import "env" "js_console_log" (func $log (param i32)))
          (memory (export "memory") 1)
          (data (i32.const 256) "booting\00")
          (func (export "_start")
            (call $sleep (f64.const 0.25))
            (call $sleep (f64.const -1))
            (call $check)
            (call $check)
            (call $log (i32.const 256))))
        "#,
    );

    let calls = h.recorder.calls();
    assert_eq!(calls.sleeps, vec![Duration::from_millis(250), Duration::ZERO]);
    assert_eq!(calls.checks, 2);
    assert_eq!(calls.logs, vec!["booting"]);
}

#[test]
fn null_string_pointers_read_as_empty() {
    let mut h = Harness::new();
    h.run(
        r#"
        (module
          (import "env" "js_console_log" (func $log (param i32)))
          (import "env" "js_disk_open" (func $open (param i32) (result i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 0) "hd.img\00")
          (func (export "_start")
            (call $log (i32.const 0))
            (i32.store (i32.const 64) (call $open (i32.const 0)))
            (call $blit (i32.const 64) (i32.const 4))))
        "#,
    );

    let calls = h.recorder.calls();
    assert_eq!(calls.logs, vec![""]);
    assert_eq!(calls.disk_names, vec![""]);
    assert_eq!(words(&calls.frames[0]), vec![-1]);
}

#[test]
fn shared_memory_cores_use_the_same_imports() {
    let mut h = Harness::new();
    let outcome = h.run(
        r#"
        (module
          (import "env" "js_console_log" (func $log (param i32)))
          (import "env" "js_blit" (func $blit (param i32 i32)))
          (import "env" "js_disk_open" (func $open (param i32) (result i32)))
          (import "env" "js_disk_read" (func $read (param i32 i32 f64 f64) (result f64)))
          (memory (export "memory") 1 1 shared)
          (data (i32.const 16) "\01\02\03\04")
          (data (i32.const 64) "threaded\00")
          (data (i32.const 256) "hd.img\00")
          (func (export "_start")
            (call $log (i32.const 64))
            (call $blit (i32.const 16) (i32.const 4))
            (drop (call $read (call $open (i32.const 256)) (i32.const 100) (f64.const 6) (f64.const 4)))
            (call $blit (i32.const 100) (i32.const 4))))
        "#,
    );

    assert_eq!(outcome, RunOutcome::Returned);
    let calls = h.recorder.calls();
    assert_eq!(calls.logs, vec!["threaded"]);
    assert_eq!(calls.disk_names, vec!["hd.img"]);
    assert_eq!(calls.frames, vec![vec![1, 2, 3, 4], b"6789".to_vec()]);
}

#[test]
fn host_deadline_stops_a_spinning_core() {
    let mut h = Harness::with_host(|host| {
        host.with_runtime(SystemRuntime::new().with_deadline(Duration::ZERO))
    });

    let outcome = h.run(
        r#"
        (module
          (import "env" "js_check_for_periodic_tasks" (func $check))
          (memory (export "memory") 1)
          (func (export "_start") (loop $spin (call $check) (br $spin))))
        "#,
    );

    assert!(matches!(outcome, RunOutcome::Shutdown(reason) if reason.contains("limit")));
}

#[test]
fn proc_exit_is_reported_as_exit_status() {
    let mut h = Harness::new();
    let outcome = h.run(
        r#"
        (module
          (import "wasi_snapshot_preview1" "proc_exit" (func $exit (param i32)))
          (memory (export "memory") 1)
          (func (export "_start") (call $exit (i32.const 3))))
        "#,
    );
    assert_eq!(outcome, RunOutcome::Exited(3));
}

#[test]
fn main_is_used_when_there_is_no_start() {
    let mut h = Harness::new();
    let outcome = h.run(r#"(module (func (export "main") (result i32) (i32.const 7)))"#);
    assert_eq!(outcome, RunOutcome::Exited(7));
}

#[test]
fn a_core_without_entrypoint_is_an_error() {
    let mut h = Harness::new();
    assert!(h.try_run("(module)").is_err());
}

#[test]
fn a_guest_trap_is_an_error() {
    let mut h = Harness::new();
    assert!(h.try_run(r#"(module (func (export "_start") unreachable))"#).is_err());
}
