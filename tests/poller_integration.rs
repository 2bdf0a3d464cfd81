mod common;

use std::time::Duration;

use common::{CallLog, FakeFeed, Reply, catalog, item};
use epic_photo_frame::error::PollError;
use epic_photo_frame::tasks::poller::{FeedPoller, PollOutcome, RetryPolicy};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn three_failures_make_three_attempts_with_backoff() {
    let log = CallLog::default();
    let poller = FeedPoller::new(FakeFeed::always(Reply::Fail, log.clone()), RetryPolicy::default());

    let started = Instant::now();
    let result = poller.poll(&CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(PollError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(log.calls(), 3);
    common::assert_gap(started, Instant::now(), Duration::from_secs(2 + 4));
}

#[tokio::test(start_paused = true)]
async fn recovers_on_a_later_attempt() {
    let log = CallLog::default();
    let feed = FakeFeed::scripted(
        [
            Reply::Fail,
            Reply::Items(vec![item("2024-01-01 00:00:00", "X")]),
        ],
        log.clone(),
    );
    let poller = FeedPoller::new(feed, RetryPolicy::default());

    let started = Instant::now();
    let snapshot = poller.poll(&CancellationToken::new()).await.unwrap();

    assert_eq!(snapshot.identifier(), "2024-01-01 00:00:00");
    assert_eq!(log.calls(), 2);
    common::assert_gap(started, Instant::now(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn empty_catalog_is_not_retried() {
    let log = CallLog::default();
    let poller = FeedPoller::new(
        FakeFeed::always(Reply::Items(Vec::new()), log.clone()),
        RetryPolicy::default(),
    );

    let result = poller.poll(&CancellationToken::new()).await;

    assert!(matches!(result, Err(PollError::EmptyCatalog)));
    assert_eq!(log.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_poll_makes_no_request() {
    let log = CallLog::default();
    let poller = FeedPoller::new(FakeFeed::always(Reply::Fail, log.clone()), RetryPolicy::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        poller.poll(&cancel).await,
        Err(PollError::Cancelled)
    ));
    assert_eq!(log.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let log = CallLog::default();
    let poller = FeedPoller::new(FakeFeed::always(Reply::Fail, log.clone()), RetryPolicy::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    assert!(matches!(
        poller.poll(&cancel).await,
        Err(PollError::Cancelled)
    ));
    assert_eq!(log.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_identifier_is_unchanged_even_if_other_items_differ() {
    let first = catalog("2024-01-01 00:00:00", "a", 2);
    let mut second = catalog("2024-01-01 00:00:00", "b", 3);
    second[1] = item("2023-12-31 12:00:00", "older");
    let feed = FakeFeed::scripted(
        [Reply::Items(first), Reply::Items(second)],
        CallLog::default(),
    );
    let mut poller = FeedPoller::new(feed, RetryPolicy::default());
    let cancel = CancellationToken::new();

    let PollOutcome::Changed(snapshot) = poller.check(&cancel).await else {
        panic!("first poll should report a change");
    };
    poller.commit(&snapshot);

    assert!(matches!(poller.check(&cancel).await, PollOutcome::Unchanged));
    assert_eq!(poller.last_identifier(), Some("2024-01-01 00:00:00"));
}

#[tokio::test(start_paused = true)]
async fn uncommitted_change_is_reported_again() {
    let feed = FakeFeed::always(
        Reply::Items(catalog("2024-01-02 00:00:00", "x", 1)),
        CallLog::default(),
    );
    let poller = FeedPoller::new(feed, RetryPolicy::default());
    let cancel = CancellationToken::new();

    assert!(matches!(poller.check(&cancel).await, PollOutcome::Changed(_)));
    assert!(matches!(poller.check(&cancel).await, PollOutcome::Changed(_)));
    assert_eq!(poller.last_identifier(), None);
}

#[tokio::test(start_paused = true)]
async fn failure_then_recovery_with_same_identifier_is_unchanged() {
    let items = catalog("2024-01-01 00:00:00", "a", 1);
    let feed = FakeFeed::scripted(
        [
            Reply::Items(items.clone()),
            Reply::Fail,
            Reply::Fail,
            Reply::Fail,
            Reply::Items(items),
        ],
        CallLog::default(),
    );
    let mut poller = FeedPoller::new(feed, RetryPolicy::default());
    let cancel = CancellationToken::new();

    let PollOutcome::Changed(snapshot) = poller.check(&cancel).await else {
        panic!("first poll should report a change");
    };
    poller.commit(&snapshot);

    assert!(matches!(
        poller.check(&cancel).await,
        PollOutcome::Failed(PollError::Exhausted { .. })
    ));
    assert!(matches!(poller.check(&cancel).await, PollOutcome::Unchanged));
}
