//! Max-slop synchronization over reopened bags

use crate::common::*;
use protobag::{Error, MaxSlopConfig, StampedEntry};
use std::time::Duration;

fn seconds_of(bundle: &[StampedEntry]) -> Vec<(String, i64)> {
    bundle
        .iter()
        .map(|e| (e.topic.clone(), e.timestamp.seconds()))
        .collect()
}

#[test]
fn exact_matches_with_zero_slop() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        let config = MaxSlopConfig::new(["/a", "/b"], Duration::ZERO);
        let bundles: Vec<_> = reader
            .time_sync(&config)
            .unwrap()
            .map(|b| seconds_of(&b.unwrap()))
            .collect();

        assert_eq!(
            bundles,
            vec![
                vec![("/a".to_string(), 1), ("/b".to_string(), 1)],
                vec![("/a".to_string(), 2), ("/b".to_string(), 2)],
            ],
            "{:?}",
            backend
        );
    }
}

#[test]
fn bundles_follow_requested_topic_order() {
    let bag = TestBag::new(Backend::Directory);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();

    let reader = bag.reader();
    let config = MaxSlopConfig::new(["b", "a"], Duration::ZERO);
    let first = reader.time_sync(&config).unwrap().next().unwrap().unwrap();
    assert_eq!(
        seconds_of(&first),
        vec![("/b".to_string(), 1), ("/a".to_string(), 1)]
    );
}

#[test]
fn slop_tolerates_offset_streams() {
    let bag = TestBag::new(Backend::Memory);
    let mut writer = bag.writer();
    for s in 0..3 {
        writer
            .write_stamped_typed("/cam", ts(s, 0), &testing::dynamic_reading("cam", 0.5))
            .unwrap();
        writer
            .write_stamped_typed("/lidar", ts(s, 100_000_000), &testing::dynamic_reading("lidar", 0.5))
            .unwrap();
    }
    writer.close().unwrap();
    let reader = bag.reader();

    let tight = MaxSlopConfig::new(["/cam", "/lidar"], Duration::from_millis(50));
    assert_eq!(reader.time_sync(&tight).unwrap().count(), 0);

    let loose = MaxSlopConfig::new(["/cam", "/lidar"], Duration::from_millis(200));
    let bundles: Vec<_> = reader.time_sync(&loose).unwrap().map(|b| b.unwrap()).collect();
    assert_eq!(bundles.len(), 3);
    for bundle in &bundles {
        assert!(bundle[0].timestamp.abs_diff(&bundle[1].timestamp) <= Duration::from_millis(200));
    }
}

#[test]
fn unknown_config_is_rejected_before_reading() {
    let bag = TestBag::new(Backend::Memory);
    bag.writer().close().unwrap();
    let reader = bag.reader();

    let empty = MaxSlopConfig::new(Vec::<String>::new(), Duration::ZERO);
    assert!(matches!(reader.time_sync(&empty), Err(Error::Config(_))));

    let no_queue = MaxSlopConfig::new(["/a"], Duration::ZERO).with_max_queue_size(0);
    assert!(matches!(reader.time_sync(&no_queue), Err(Error::Config(_))));
}
