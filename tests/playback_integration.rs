//! Playback lifecycle over the null backend: lazy device start, the
//! active-buffer refcount, seeking, and clean teardown with a live playback
//! thread.

use std::time::Duration;

use ripieno::prelude::*;

fn test_engine() -> RipienoEngine {
    RipienoEngine::builder()
        .channels(2)
        .sample_rate(48_000)
        .latency_ms(5)
        .null_backend()
        .build()
        .unwrap()
}

#[test]
fn test_engine_reports_configuration() {
    let engine = test_engine();
    assert_eq!(engine.channels(), 2);
    assert_eq!(engine.sample_rate(), 48_000);
    assert_eq!(engine.backend_name(), "null");
    // 5 ms of stereo 48 kHz
    assert_eq!(engine.fragment_samples(), 240 * 2);
}

#[test]
fn test_device_starts_lazily_on_first_play() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.1; 1024]).unwrap();

    assert!(!engine.is_playing());
    buffer.play(true).unwrap();
    assert!(engine.is_playing());
    assert!(buffer.is_playing());
    assert!(buffer.is_looping());
}

#[test]
fn test_backend_stops_after_last_buffer() {
    let engine = test_engine();
    let a = engine.create_compatible_buffer(&[0.1; 1024]).unwrap();
    let b = engine.create_compatible_buffer(&[0.2; 1024]).unwrap();

    a.play(true).unwrap();
    b.play(true).unwrap();
    a.stop();
    // one buffer still playing: the device keeps running
    assert!(engine.is_playing());
    b.stop();
    assert!(!engine.is_playing());
}

#[test]
fn test_playback_thread_consumes_a_looping_buffer() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.1; 4096]).unwrap();
    buffer.play(true).unwrap();

    // several 5 ms fragments of wall clock
    std::thread::sleep(Duration::from_millis(50));

    assert!(buffer.position() > 0);
    assert!((buffer.position() as usize) < 4096);
    buffer.stop();
}

#[test]
fn test_seek_repositions_the_cursor() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.1; 64]).unwrap();

    buffer.seek(10).unwrap();
    assert_eq!(buffer.position(), 10);

    // clamped to the end
    buffer.seek(10_000).unwrap();
    assert_eq!(buffer.position(), 64);
}

#[test]
fn test_non_looping_buffer_stays_marked_playing_at_end() {
    let engine = test_engine();
    let fragment = engine.fragment_samples();
    let buffer = engine
        .create_compatible_buffer(&vec![0.1; fragment / 4])
        .unwrap();
    buffer.play(false).unwrap();

    std::thread::sleep(Duration::from_millis(30));

    // the engine does not auto-stop a drained buffer; the short read is the
    // only end-of-stream signal
    assert!(buffer.is_playing());
    assert_eq!(buffer.position() as usize, fragment / 4);
    buffer.stop();
}

#[test]
fn test_close_with_playing_buffers_is_clean() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.1; 4096]).unwrap();
    buffer.play(true).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    drop(engine);
}

#[test]
fn test_gain_is_live_per_handle() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.5; 64]).unwrap();
    assert_eq!(buffer.gain(), 1.0);
    buffer.set_gain(0.25);
    assert_eq!(buffer.gain(), 0.25);
}

#[test]
fn test_play_flag_can_change_loop_mode() {
    let engine = test_engine();
    let buffer = engine.create_compatible_buffer(&[0.5; 64]).unwrap();
    buffer.play(false).unwrap();
    assert!(!buffer.is_looping());
    buffer.play(true).unwrap();
    assert!(buffer.is_looping());
    buffer.stop();
}
