//! End-to-end scenarios (spec §8) exercised through the public API only.

use cw_engine::{
    character_of_representation, compute_send_timing, representation_of_character, Backend,
    CwError, Generator, GeneratorConfig, KeyValue, Receiver, SendTiming,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn null_generator(wpm: u32) -> Generator {
    let g = Generator::new(GeneratorConfig {
        backend: Backend::Null,
        send_speed_wpm: wpm,
        ..Default::default()
    })
    .unwrap();
    g.start().unwrap();
    g
}

/// Scenario 1: fixed-speed round-trip at 12 wpm, "paris" x5.
#[test]
fn fixed_speed_round_trip_paris_x5() {
    let wpm = 12;
    let timing = compute_send_timing(wpm, 50, 0);
    let mut receiver = Receiver::new();
    receiver.set_speed(wpm).unwrap();

    let mut ts = 0i64;
    let mut decoded = String::new();

    for _ in 0..5 {
        for c in "paris".chars() {
            let rep = representation_of_character(c).unwrap();
            for sym in rep.chars() {
                let dur = if sym == '.' { timing.dot_us } else { timing.dash_us };
                receiver.mark_begin(ts).unwrap();
                ts += dur;
                receiver.mark_end(ts).unwrap();
                ts += timing.ims_us;
            }
            ts += timing.ics_us - timing.ims_us;
            let poll = receiver.poll_representation(ts).unwrap();
            assert!(!poll.is_error);
            decoded.push(character_of_representation(&poll.representation).unwrap());
            receiver.clear_buffer();
        }
        ts += timing.iws_us - (timing.ics_us - timing.ims_us);
    }

    assert_eq!(decoded, "PARIS".repeat(5));
}

/// Scenario 2: removing queued characters from "oooo ssss".
#[test]
fn removing_queued_characters() {
    let g = null_generator(20);
    g.enqueue_string("oooo ssss").unwrap();

    // 4 o's (7 tones each) + word space (2 tones) + 4 s's (7 tones each)
    assert_eq!(g.get_queue_length(), 4 * 7 + 2 + 4 * 7);

    g.remove_last_character();
    g.remove_last_character();
    g.remove_last_character();

    // last 3 s's removed, leaving "oooo s"
    assert_eq!(g.get_queue_length(), 4 * 7 + 2 + 7);
    g.stop().unwrap();
}

/// Scenario 3: forever tone key-down/key-up produces exactly one
/// Closed->Open and one Open->Closed transition.
#[test]
fn forever_tone_key_down_key_up() {
    let g = null_generator(20);
    let events: Arc<Mutex<Vec<KeyValue>>> = Arc::new(Mutex::new(Vec::new()));
    let events2 = events.clone();
    g.register_value_tracking_callback(Some(Arc::new(move |v| events2.lock().unwrap().push(v))));

    g.begin_mark().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    g.begin_space(false).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    g.stop().unwrap();

    let log = events.lock().unwrap();
    let closed_count = log.iter().filter(|&&v| v == KeyValue::Closed).count();
    let open_count = log.iter().filter(|&&v| v == KeyValue::Open).count();
    assert_eq!(closed_count, 1);
    assert!(open_count >= 1);
}

/// Scenario 4: queue-full back-pressure.
#[test]
fn queue_full_back_pressure() {
    let g = Generator::new(GeneratorConfig {
        backend: Backend::Null,
        ..Default::default()
    })
    .unwrap();
    // 'E' is a single dot: mark + ims + ics = 3 tones per enqueue.
    g.set_high_water_mark(3 * 10);

    let mut succeeded = 0;
    let mut failed = 0;
    for _ in 0..20 {
        match g.enqueue_character('E') {
            Ok(()) => succeeded += 1,
            Err(CwError::Again(_)) => failed += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(succeeded >= 10);
    assert!(failed > 0);

    g.start().unwrap();
    g.wait_for_queue_level(0);
    assert_eq!(g.get_queue_length(), 0);
    g.stop().unwrap();
}

/// Scenario 5: adaptive receiver tracking across a speed change. Feeds
/// alternating dot/dash marks (so both moving averages actually move) at
/// one real speed, then at a faster one, and checks the tracked speed
/// moves in the right direction each time.
#[test]
fn adaptive_receiver_tracks_speed_change() {
    let mut receiver = Receiver::new();
    receiver.enable_adaptive_mode();
    let initial_speed = receiver.get_speed();

    let mut ts = 0i64;
    let feed = |receiver: &mut Receiver, ts: &mut i64, timing: SendTiming, marks: usize| {
        for i in 0..marks {
            let is_dash = i % 2 == 1;
            let dur = if is_dash { timing.dash_us } else { timing.dot_us };
            receiver.mark_begin(*ts).unwrap();
            *ts += dur;
            receiver.mark_end(*ts).unwrap();
            *ts += timing.ims_us;
            receiver.clear_buffer();
        }
    };

    let slow = compute_send_timing(18, 50, 0);
    feed(&mut receiver, &mut ts, slow, 50);
    let speed_after_18 = receiver.get_speed();
    assert!(speed_after_18 > initial_speed);

    let fast = compute_send_timing(30, 50, 0);
    feed(&mut receiver, &mut ts, fast, 50);
    let speed_after_30 = receiver.get_speed();
    assert!(speed_after_30 > speed_after_18);
}

/// Scenario 6: procedural-signal concatenation ("SK" without the
/// inter-character-space between the two letters).
#[test]
fn procedural_signal_concatenation() {
    let wpm = 20;
    let timing = compute_send_timing(wpm, 50, 0);
    let mut receiver = Receiver::new();
    receiver.set_speed(wpm).unwrap();

    let combined: String = representation_of_character('S')
        .unwrap()
        .chars()
        .chain(representation_of_character('K').unwrap().chars())
        .collect();

    let mut ts = 0i64;
    for sym in combined.chars() {
        let dur = if sym == '.' { timing.dot_us } else { timing.dash_us };
        receiver.mark_begin(ts).unwrap();
        ts += dur;
        receiver.mark_end(ts).unwrap();
        ts += timing.ims_us;
    }
    ts += timing.ics_us - timing.ims_us;
    let poll = receiver.poll_representation(ts).unwrap();
    assert!(!poll.is_error);
    assert_eq!(poll.representation, combined);
    assert_eq!(character_of_representation(&poll.representation).unwrap(), '<');
}
