//! End-to-end open/grow/shrink/save scenarios against the in-memory server.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use foldersync_core::{
    Direction, Flags, GrowOutcome, MessageHeader, SyncConfig, SyncResult, ViewCapabilities,
};

use common::{Harness, half_day, inbox, now};

fn counts(result: SyncResult) -> (usize, usize, usize) {
    (result.total_visible, result.fully_new, result.flags_updated)
}

#[tokio::test]
async fn test_fresh_folder_then_reload_reports_refresh() {
    let harness = Harness::with_inbox(4, Duration::hours(5));

    let engine = harness.engine().await;
    let (_view, update) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(counts(update.result), (4, 4, 0));
    assert_eq!(engine.save_state().await.unwrap(), 1);
    engine.shutdown();

    let engine = harness.engine().await;
    let (_view, update) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(counts(update.result), (4, 0, 4));
}

#[tokio::test]
async fn test_upstream_additions_then_unclean_restart() {
    let harness = Harness::with_inbox(4, Duration::hours(5));
    let engine = harness.engine().await;
    let (first, _) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    drop(first);
    engine.save_state().await.unwrap();

    harness.transport.insert(
        &inbox(),
        [
            MessageHeader::new("late-1", now() + Duration::minutes(20)),
            MessageHeader::new("late-2", now() + Duration::minutes(40)),
        ],
    );
    let (_view, update) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(counts(update.result), (6, 2, 4));
    engine.save_state().await.unwrap();

    // No shutdown: the process just goes away.
    drop(engine);

    let engine = harness.engine().await;
    let (_view, update) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(counts(update.result), (6, 0, 6));
}

#[tokio::test]
async fn test_open_then_grow_older_to_the_end() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;

    let (mut view, update) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(update.result.total_visible, 16);
    assert!(update.flags.touches_newest);
    assert!(update.flags.touches_oldest);
    assert!(update.flags.can_grow);

    let update = view.grow(Direction::Older, 15, true).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Fetched);
    assert_eq!(update.result.total_visible, 31);
    assert_eq!(update.result.fully_new, 15);

    let update = view.grow(Direction::Older, 15, true).await.unwrap();
    assert_eq!(update.result.total_visible, 46);
    assert!(update.flags.touches_oldest);
    assert!(!update.flags.can_grow);

    let headers = view.headers();
    assert_eq!(headers.len(), 46);
    assert!(headers.windows(2).all(|w| w[0].date > w[1].date));
}

#[tokio::test]
async fn test_shrink_both_edges() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();
    view.grow(Direction::Older, 15, true).await.unwrap();
    view.grow(Direction::Older, 15, true).await.unwrap();
    let fetches = harness.transport.fetch_count();

    let update = view.shrink(1, 0).unwrap();
    assert_eq!(update.result.total_visible, 45);
    assert!(!update.flags.touches_newest);

    let update = view.shrink(0, -21).unwrap();
    assert_eq!(update.result.total_visible, 25);
    assert!(update.result.is_zero_delta());
    assert_eq!(view.headers()[0].id.as_str(), "msg-1");
    assert_eq!(view.headers()[24].id.as_str(), "msg-25");
    assert_eq!(harness.transport.fetch_count(), fetches);
}

#[tokio::test]
async fn test_exclusive_negative_offsets() {
    let mut harness = Harness::with_inbox(46, half_day());
    harness.config = SyncConfig {
        negative_offset_inclusive: false,
        ..SyncConfig::default()
    };
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();

    let update = view.shrink(-2, -3).unwrap();
    assert_eq!(update.result.total_visible, 11);
}

#[tokio::test]
async fn test_implicit_grow_past_coverage_is_declined() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();
    let before = engine.folder_state(&inbox()).unwrap();
    let flags = view.flags();
    let fetches = harness.transport.fetch_count();

    let update = view.grow(Direction::Older, 5, false).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Declined);
    assert_eq!(update.result, SyncResult::visible(16));
    assert_eq!(update.flags, flags);
    assert_eq!(view.total(), 16);
    assert_eq!(harness.transport.fetch_count(), fetches);
    assert_eq!(engine.folder_state(&inbox()).unwrap().coverage, before.coverage);
}

#[tokio::test]
async fn test_grow_within_coverage_never_fetches() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();
    view.shrink(0, 6).unwrap();
    let fetches = harness.transport.fetch_count();

    let update = view.grow(Direction::Older, 4, false).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Local);
    assert_eq!(update.result.total_visible, 14);
    assert_eq!(harness.transport.fetch_count(), fetches);
}

#[tokio::test]
async fn test_open_widens_until_target() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;

    let (_view, update) = engine
        .open_view(&inbox(), 25, ViewCapabilities::default())
        .await
        .unwrap();
    // Initial window holds 16; one widening step adds 15 more.
    assert_eq!(update.result.total_visible, 25);
    assert_eq!(update.result.fully_new, 31);
    assert_eq!(harness.transport.fetch_count(), 2);
}

#[tokio::test]
async fn test_refresh_applies_deletes_and_flag_changes() {
    let harness = Harness::with_inbox(4, Duration::hours(5));
    let engine = harness.engine().await;
    drop(
        engine
            .open_view(&inbox(), 50, ViewCapabilities::default())
            .await
            .unwrap(),
    );

    assert!(harness.transport.remove(&inbox(), "msg-2"));
    let seen: Flags = [Flags::SEEN].into_iter().collect();
    assert!(harness.transport.set_flags(&inbox(), "msg-0", seen));

    let (view, update) = engine
        .open_view(&inbox(), 50, ViewCapabilities::default())
        .await
        .unwrap();
    assert_eq!(update.result.total_visible, 3);
    assert_eq!(update.result.deleted_removed, 1);
    assert_eq!(update.result.flags_updated, 3);
    assert!(view.headers()[0].flags.is_seen());
}

#[tokio::test]
async fn test_oldest_date_floor_stops_growth() {
    let mut harness = Harness::with_inbox(46, half_day());
    harness.config = SyncConfig {
        oldest_date_floor: Some(now() - Duration::hours(200)),
        ..SyncConfig::default()
    };
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();

    let update = view.grow(Direction::Older, 15, true).await.unwrap();
    assert_eq!(update.result.total_visible, 18);
    assert!(update.flags.touches_oldest);
    assert!(!update.flags.can_grow);

    let fetches = harness.transport.fetch_count();
    let update = view.grow(Direction::Older, 15, true).await.unwrap();
    assert_eq!(update.result.total_visible, 18);
    assert_eq!(harness.transport.fetch_count(), fetches);
}

#[tokio::test]
async fn test_grow_newer_after_time_passes() {
    let harness = Harness::with_inbox(10, Duration::hours(3));
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 10, ViewCapabilities::default())
        .await
        .unwrap();

    // Two days later the covered range no longer reaches the present.
    harness.clock.advance(Duration::hours(48));
    harness.transport.insert(
        &inbox(),
        [MessageHeader::new("fresh", now() + Duration::hours(40))],
    );

    assert!(!view.flags().touches_newest);
    let update = view.grow(Direction::Newer, 1, false).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Declined);
    assert!(!update.flags.touches_newest);

    let update = view.grow(Direction::Newer, 1, true).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Fetched);
    assert_eq!(update.result.fully_new, 1);
    assert_eq!(update.result.total_visible, 11);
    assert_eq!(view.headers()[0].id.as_str(), "fresh");
    assert!(update.flags.touches_newest);
}

#[tokio::test]
async fn test_grow_younger_and_older_again_locally() {
    let harness = Harness::with_inbox(46, half_day());
    let engine = harness.engine().await;
    let (mut view, _) = engine
        .open_view(&inbox(), 16, ViewCapabilities::default())
        .await
        .unwrap();
    view.grow(Direction::Older, 15, true).await.unwrap();
    view.grow(Direction::Older, 15, true).await.unwrap();
    let fetches = harness.transport.fetch_count();

    assert_eq!(view.shrink(1, 0).unwrap().result.total_visible, 45);
    let update = view.shrink(15, 0).unwrap();
    assert_eq!(update.result.total_visible, 30);
    assert!(!update.flags.touches_newest);
    assert!(update.flags.touches_oldest);

    let update = view.grow(Direction::Newer, 8, false).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Local);
    assert_eq!(update.result.total_visible, 38);
    assert!(!update.flags.touches_newest);

    let update = view.grow(Direction::Newer, 8, false).await.unwrap();
    assert_eq!(update.result.total_visible, 46);
    assert!(update.flags.touches_newest);
    assert!(update.flags.touches_oldest);
    assert!(!update.flags.can_grow);

    let update = view.shrink(0, -2).unwrap();
    assert_eq!(update.result.total_visible, 45);
    assert!(update.flags.touches_newest);
    assert!(!update.flags.touches_oldest);

    let update = view.shrink(0, -21).unwrap();
    assert_eq!(update.result.total_visible, 25);
    assert!(!update.flags.touches_oldest);

    let update = view.grow(Direction::Older, 21, false).await.unwrap();
    assert_eq!(update.outcome, GrowOutcome::Local);
    assert_eq!(update.result.total_visible, 46);
    assert!(update.flags.touches_newest);
    assert!(update.flags.touches_oldest);
    assert!(!update.flags.can_grow);

    assert_eq!(harness.transport.fetch_count(), fetches);
}
