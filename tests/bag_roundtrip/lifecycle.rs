//! Writer session rules and index persistence

use crate::common::*;
use protobag::{names, DuplicatePolicy, Error, Selection, WriterConfig};

#[test]
fn closed_writer_refuses_writes() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        writer.write_raw("/x", b"1").unwrap();
        writer.close().unwrap();

        assert!(writer.is_closed());
        assert!(matches!(writer.write_raw("/y", b"2"), Err(Error::SessionState(_))));
        assert!(matches!(writer.close(), Err(Error::SessionState(_))));
    }
}

#[test]
fn exactly_one_index_entry_is_written() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let index_entries: Vec<String> = bag
            .store()
            .list()
            .unwrap()
            .into_iter()
            .filter(|n| n.starts_with(names::BAG_INDEX_TOPIC))
            .collect();
        assert_eq!(index_entries.len(), 1, "{:?}", backend);
        assert!(index_entries[0].ends_with(".stampedmsg.protobin"));
    }
}

#[test]
fn summary_reads_without_descriptor_pool() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let config = bag.writer_config().with_namespace("drive_42");
        let mut writer = bag.writer_with(config);
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        let summary = reader.index_summary().unwrap();
        assert_eq!(summary.bag_namespace, "drive_42");
        assert_eq!(summary.protobag_version, protobag::PROTOBAG_VERSION);
        assert_eq!(summary.message_count(), 6, "{:?}", backend);
        assert_eq!(
            summary.topic_stats.keys().cloned().collect::<Vec<_>>(),
            vec!["/a".to_string(), "/b".to_string()]
        );
        let range = summary.time_range.expect("stamped entries give a range");
        assert_eq!((range.start, range.end), (secs(0), secs(3)));

        assert_eq!(reader.index().unwrap().summary(), summary);
    }
}

#[test]
fn duplicate_names_follow_policy() {
    let bag = TestBag::new(Backend::Directory);
    let mut writer = bag.writer();
    writer.write_raw("/cfg", b"one").unwrap();
    assert!(matches!(writer.write_raw("/cfg", b"two"), Err(Error::DuplicateEntry(_))));
    writer.close().unwrap();
    assert_eq!(bag.store().get("/cfg").unwrap(), b"one");

    let bag = TestBag::new(Backend::Directory);
    let config = WriterConfig::default().with_duplicate_policy(DuplicatePolicy::Overwrite);
    let mut writer = bag.writer_with(config);
    writer.write_raw("/cfg", b"one").unwrap();
    writer.write_raw("/cfg", b"two").unwrap();
    writer.close().unwrap();
    assert_eq!(bag.store().get("/cfg").unwrap(), b"two");
}

#[test]
fn reserved_names_are_refused() {
    let bag = TestBag::new(Backend::Memory);
    let mut writer = bag.writer();
    let reserved = format!("{}/mine", names::INDEX_TOPIC);
    assert!(matches!(writer.write_raw(&reserved, b""), Err(Error::ReservedName(_))));
    writer.close().unwrap();

    let reader = bag.reader();
    assert!(reader.get_entry(&reserved).is_err());
    assert_eq!(reader.entries(&Selection::all()).unwrap().count(), 0);
}

#[test]
fn dropped_writer_still_produces_a_readable_bag() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        {
            let mut writer = bag.writer();
            write_two_topics(&mut writer);
        }
        let reader = bag.reader();
        assert!(reader.has_index(), "{:?}", backend);
        assert_eq!(reader.index_summary().unwrap().message_count(), 6);
    }
}
