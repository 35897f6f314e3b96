//! Stored bytes survive a close/reopen unchanged

use crate::common::*;
use prost::Message;
use protobag::{names, Entry, Selection};

#[test]
fn raw_bytes_are_stored_verbatim() {
    let payload: Vec<u8> = (0u8..=255).collect();
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        let name = writer.write_raw("blobs/all_bytes", &payload).unwrap();
        writer.close().unwrap();
        assert_eq!(name, "/blobs/all_bytes");

        assert_eq!(bag.store().get(&name).unwrap(), payload, "{:?}", backend);

        let reader = bag.reader();
        match reader.get_entry("blobs/all_bytes").unwrap() {
            Entry::Raw(raw) => assert_eq!(raw.payload, payload),
            other => panic!("{:?}: expected raw entry, got {:?}", backend, other),
        }
    }
}

#[test]
fn message_payloads_roundtrip_bit_identical() {
    let msg = testing::reading("lidar", 2.5);
    let payload = msg.encode_to_vec();
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        writer
            .write_message("/calib", &testing::reading_type_url(), &payload, None)
            .unwrap();
        writer.close().unwrap();

        let entry = bag.reader().get_entry("/calib").unwrap();
        assert!(matches!(entry, Entry::Message(_)), "{:?}", backend);
        assert_eq!(entry.type_url(), testing::reading_type_url());
        assert_eq!(entry.payload(), payload.as_slice());
    }
}

#[test]
fn stamped_entries_keep_topic_and_time() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        let name = writer
            .write_stamped("imu", 7, 250, &testing::reading_type_url(), b"\x11", None)
            .unwrap();
        writer.close().unwrap();
        assert_eq!(name, "/imu/7.250.stampedmsg.protobin");

        let entry = bag.reader().get_entry(&name).unwrap();
        let stamped = entry.as_stamped().expect("stamped entry");
        assert_eq!(stamped.topic, "/imu");
        assert_eq!(stamped.timestamp, ts(7, 250));
        assert_eq!(stamped.msg.payload, b"\x11");
    }
}

#[test]
fn select_all_returns_every_user_entry() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.write_raw("/notes", b"hello").unwrap();
        writer.close().unwrap();

        let reader = bag.reader();
        let mut got: Vec<String> = reader
            .entries(&Selection::all())
            .unwrap()
            .map(|e| e.unwrap().entry_name().to_string())
            .collect();
        got.sort();

        assert_eq!(got.len(), 7, "{:?}", backend);
        assert!(got.contains(&"/notes".to_string()));
        assert!(got.iter().all(|n| !names::is_reserved(n)));
    }
}

#[test]
fn colliding_stamps_get_distinct_names() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        let first = writer
            .write_stamped_typed("/a", secs(1), &testing::dynamic_reading("a", 1.0))
            .unwrap();
        let second = writer
            .write_stamped_typed("/a", secs(1), &testing::dynamic_reading("a", 2.0))
            .unwrap();
        writer.close().unwrap();

        assert_ne!(first, second);
        let reader = bag.reader();
        let count = reader
            .entries(&Selection::topics(["/a"]))
            .unwrap()
            .count();
        assert_eq!(count, 2, "{:?}", backend);
    }
}
