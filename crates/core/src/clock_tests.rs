// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_starts_at_epoch() {
    let clock = FakeClock::new();
    assert_eq!(clock.epoch_ms(), 0);
}

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::at(1_000);
    clock.advance_ms(500);
    assert_eq!(clock.epoch_ms(), 1_500);
    clock.advance_secs(2);
    assert_eq!(clock.epoch_ms(), 3_500);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance_secs(10);
    assert_eq!(other.epoch_ms(), 10_000);
}

#[test]
fn fake_clock_now_utc_tracks_epoch_ms() {
    let clock = FakeClock::at(86_400_000); // 1970-01-02T00:00:00Z
    let now = clock.now_utc();
    assert_eq!(now.to_rfc3339(), "1970-01-02T00:00:00+00:00");
}

#[test]
fn system_clock_is_past_2020() {
    let clock = SystemClock;
    assert!(clock.epoch_ms() > 1_577_836_800_000);
}
