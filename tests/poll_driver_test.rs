//! Poll driver behaviour under a paused tokio clock.

mod common;

use std::time::Duration;

use common::{small_viewer, SharedProducer};
use shm_viewer::config::ViewerConfig;
use shm_viewer::poll::{PollDriver, PollRate};
use tokio::sync::{mpsc, watch};

#[tokio::test(start_paused = true)]
async fn test_driver_reports_only_new_frames() {
    let producer = SharedProducer::new(4, 4, 2);
    let driver = PollDriver::new(small_viewer(8, 16), producer.clone(), PollRate::Hz100);
    let (tx, mut rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(driver.run(tx, stop_rx));

    let first = rx.recv().await.unwrap();
    assert_eq!(first.generation, 0);

    // Ten ticks with nothing new
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    producer.publish(42);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.generation, 1);
    assert_eq!(second.full.max, 42.0);

    stop_tx.send(true).unwrap();
    let (viewer, _source) = handle.await.unwrap();
    assert_eq!(viewer.last_generation(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_drops_reports() {
    let producer = SharedProducer::new(2, 2, 2);
    let driver = PollDriver::new(small_viewer(4, 8), producer.clone(), PollRate::Hz50);
    let (tx, mut rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(driver.run(tx, stop_rx));

    for value in 1..=5u16 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        producer.publish(value);
    }
    tokio::time::sleep(Duration::from_millis(40)).await;

    // Only the first report fit; the driver kept polling regardless
    let kept = rx.recv().await.unwrap();
    assert_eq!(kept.generation, 0);
    assert!(rx.try_recv().is_err());

    stop_tx.send(true).unwrap();
    let (viewer, _source) = handle.await.unwrap();
    assert_eq!(viewer.last_generation(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_driver_stops_when_receiver_closes() {
    let producer = SharedProducer::new(2, 2, 2);
    let driver = PollDriver::new(small_viewer(4, 8), producer, PollRate::Hz10);
    let (tx, rx) = mpsc::channel(4);
    let (_stop_tx, stop_rx) = watch::channel(false);
    drop(rx);

    let (viewer, _source) = driver.run(tx, stop_rx).await;
    assert_eq!(viewer.last_generation(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_shutdown_sender_stops_driver() {
    let producer = SharedProducer::new(2, 2, 2);
    let driver = PollDriver::new(small_viewer(4, 8), producer, PollRate::Hz30);
    let (tx, _rx) = mpsc::channel(4);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(driver.run(tx, stop_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stop_tx);
    assert!(handle.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_driver_from_config_uses_poll_rate() {
    let mut config = ViewerConfig::default();
    config.display.poll_rate = PollRate::Hz10;
    config.trace.capacity = 64;
    config.trace.hist_bins = 8;

    let producer = SharedProducer::new(2, 2, 2);
    let driver = PollDriver::from_config(producer.clone(), &config).unwrap();
    assert_eq!(driver.rate(), PollRate::Hz10);

    let (tx, mut rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(driver.run(tx, stop_rx));
    assert_eq!(rx.recv().await.unwrap().generation, 0);

    // A new frame published right after a tick waits for the next 100 ms tick
    producer.publish(7);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(rx.try_recv().unwrap().generation, 1);

    stop_tx.send(true).unwrap();
    assert!(handle.await.is_ok());
}
