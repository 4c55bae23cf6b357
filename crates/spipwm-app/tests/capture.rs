use spipwm_app::capture_transaction;
use spipwm_core::{Direction, HarnessConfig, PinFrame};
use spipwm_decode::spi::ControlWord;

#[test]
fn it_should_round_trip_a_write() {
    let capture =
        capture_transaction(&HarnessConfig::default(), Direction::Write, 0x00, 0xF0).unwrap();

    assert_eq!(capture.frames.len(), 1);
    assert!(capture.frames[0].complete);
    assert_eq!(
        capture.frames[0].control_word(),
        Some(ControlWord {
            write: true,
            address: 0x00,
            data: 0xF0
        })
    );
    assert_eq!(capture.bench.uo_out(), 0xF0);
}

#[test]
fn it_should_round_trip_a_read() {
    let capture =
        capture_transaction(&HarnessConfig::default(), Direction::Read, 0x41, 0xEF).unwrap();

    let word = capture.frames[0].control_word().unwrap();
    assert!(!word.write);
    assert_eq!((word.address, word.data), (0x41, 0xEF));
}

#[test]
fn it_should_frame_with_chip_select() {
    let capture =
        capture_transaction(&HarnessConfig::default(), Direction::Write, 0x04, 0x80).unwrap();
    let entries = capture.trace.entries();

    // Setup frame, 16 clock-low/clock-high pairs, idle.
    assert_eq!(entries.len(), 34);
    assert_eq!(entries[0].frame, PinFrame::new(true, false, false));
    assert_eq!(entries[33].frame, PinFrame::IDLE);

    let rises = entries
        .windows(2)
        .filter(|w| !w[0].frame.clock && w[1].frame.clock)
        .count();
    assert_eq!(rises, 16);

    // Each half period is 51 ticks of 100 ns.
    assert_eq!(entries[2].time_ns - entries[1].time_ns, 5_100);
    let span = capture.frames[0].span;
    assert_eq!(span.duration_ns(), 100 + 32 * 5_100);
}

#[test]
fn it_should_not_capture_invalid_fields() {
    let result = capture_transaction(&HarnessConfig::default(), Direction::Write, 0x80, 0x00);
    assert!(result.unwrap_err().is_invalid_argument());
}
