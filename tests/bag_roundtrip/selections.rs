//! Selection resolution against reopened bags

use crate::common::*;
use proptest::prelude::*;
use protobag::{Entry, Error, EventRef, Selection};

fn stamps(entries: impl Iterator<Item = protobag::Result<Entry>>) -> Vec<(String, i64)> {
    entries
        .map(|e| {
            let e = e.unwrap();
            let (topic, t) = e.topic_time().expect("stamped entry");
            (topic.to_string(), t.seconds())
        })
        .collect()
}

#[test]
fn window_is_time_ordered_and_inclusive() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        let sel = Selection::window(Vec::<String>::new(), Some(secs(1)), Some(secs(2)));
        let got = stamps(reader.entries(&sel).unwrap());
        assert_eq!(
            got,
            vec![
                ("/a".to_string(), 1),
                ("/b".to_string(), 1),
                ("/a".to_string(), 2),
                ("/b".to_string(), 2),
            ],
            "{:?}",
            backend
        );
    }
}

#[test]
fn window_filters_topics_and_exclusions() {
    let bag = TestBag::new(Backend::Directory);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();
    let reader = bag.reader();

    let only_b = stamps(reader.entries(&Selection::topics(["b"])).unwrap());
    assert_eq!(
        only_b,
        vec![("/b".to_string(), 1), ("/b".to_string(), 2), ("/b".to_string(), 3)]
    );

    let all_but_b = Selection::window(Vec::<String>::new(), None, None).with_excluded_topics(["/b"]);
    let got = stamps(reader.entries(&all_but_b).unwrap());
    assert!(got.iter().all(|(topic, _)| topic == "/a"));
    assert_eq!(got.len(), 3);
}

#[test]
fn events_resolve_by_topic_and_time() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        let sel = Selection::events(vec![
            EventRef::new("/b", secs(3)),
            EventRef::new("a", secs(0)),
        ]);
        let got = stamps(reader.entries(&sel).unwrap());
        assert_eq!(got, vec![("/b".to_string(), 3), ("/a".to_string(), 0)], "{:?}", backend);
    }
}

#[test]
fn events_ignore_raw_entry_holding_the_stamp_name() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        writer.write_raw("/t/1.0.stampedmsg.protobin", b"not a message").unwrap();
        let stamped = writer
            .write_stamped("/t", 1, 0, &testing::reading_type_url(), b"\x11", None)
            .unwrap();
        writer.close().unwrap();
        assert_eq!(stamped, "/t/1.0.stampedmsg.1.protobin");

        let reader = bag.reader();
        let sel = Selection::events(vec![EventRef::new("/t", secs(1))]).with_require_all(true);
        let got: Vec<String> = reader
            .entries(&sel)
            .unwrap()
            .map(|e| e.unwrap().entry_name().to_string())
            .collect();
        assert_eq!(got, vec![stamped], "{:?}", backend);
    }
}

#[test]
fn missing_names_fail_unless_ignored() {
    let bag = TestBag::new(Backend::Tar);
    let mut writer = bag.writer();
    writer.write_raw("/present", b"x").unwrap();
    writer.close().unwrap();
    let reader = bag.reader();

    let strict = Selection::names(["/present", "/ghost"]);
    assert!(matches!(reader.entries(&strict), Err(Error::NotFound(_))));

    let lenient = strict.with_ignore_missing(true);
    let got: Vec<String> = reader
        .entries(&lenient)
        .unwrap()
        .map(|e| e.unwrap().entry_name().to_string())
        .collect();
    assert_eq!(got, vec!["/present".to_string()]);
}

#[test]
fn missing_events_follow_require_all() {
    let bag = TestBag::new(Backend::Memory);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();
    let reader = bag.reader();

    let events = vec![EventRef::new("/a", secs(1)), EventRef::new("/a", secs(99))];
    let strict = Selection::events(events.clone()).with_require_all(true);
    assert!(matches!(reader.entries(&strict), Err(Error::NotFound(_))));

    let lenient = Selection::events(events).with_require_all(false);
    let got = stamps(reader.entries(&lenient).unwrap());
    assert_eq!(got, vec![("/a".to_string(), 1)]);
}

#[test]
fn serialized_selection_matches_native() {
    let bag = TestBag::new(Backend::TarZstd);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();
    let reader = bag.reader();

    let sel = Selection::window(["/a"], Some(secs(1)), None);
    let native = stamps(reader.entries(&sel).unwrap());
    let from_bytes = stamps(reader.entries_from_bytes(&sel.encode_to_vec()).unwrap());
    assert_eq!(native, from_bytes);
    assert_eq!(native, vec![("/a".to_string(), 1), ("/a".to_string(), 2)]);
}

#[test]
fn garbage_selection_bytes_are_rejected() {
    let bag = TestBag::new(Backend::Memory);
    bag.writer().close().unwrap();
    let reader = bag.reader();
    assert!(reader.entries_from_bytes(&[0xff, 0xff, 0xff]).is_err());
}

#[test]
fn unindexed_bag_still_lists_entries() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let config = bag
            .writer_config()
            .with_timeseries_index(false)
            .with_descriptor_index(false);
        let mut writer = bag.writer_with(config);
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        assert!(!reader.has_index(), "{:?}", backend);
        assert_eq!(reader.entries(&Selection::all()).unwrap().count(), 6);

        let window = Selection::window(["/a"], None, None);
        assert!(matches!(
            reader.entries(&window),
            Err(Error::CorruptArchive(_))
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn window_returns_exactly_the_stamps_inside(
        stamps_a in prop::collection::vec(0i64..20, 0..12),
        start in 0i64..20,
        len in 0i64..10,
    ) {
        let bag = TestBag::new(Backend::Memory);
        let mut writer = bag.writer();
        for s in &stamps_a {
            writer.write_stamped_typed("/a", secs(*s), &testing::dynamic_reading("a", 1.0)).unwrap();
        }
        writer.close().unwrap();
        let reader = bag.reader();

        let end = start + len;
        let sel = Selection::window(["/a"], Some(secs(start)), Some(secs(end)));
        let got: Vec<i64> = stamps(reader.entries(&sel).unwrap()).into_iter().map(|(_, s)| s).collect();

        let mut expected: Vec<i64> = stamps_a.iter().copied().filter(|s| start <= *s && *s <= end).collect();
        expected.sort();
        prop_assert_eq!(got, expected);
    }
}
