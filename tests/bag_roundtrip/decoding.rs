//! Decoding with descriptors recovered from the bag itself

use crate::common::*;
use prost::Message;
use prost_reflect::ReflectMessage;
use protobag::{Error, MessageDecoder, ReaderConfig, Selection};

#[test]
fn dynamic_decode_matches_static_decode() {
    for backend in Backend::ALL {
        let bag = TestBag::new(backend);
        let mut writer = bag.writer();
        write_two_topics(&mut writer);
        writer.close().unwrap();

        let reader = bag.reader();
        assert!(reader.decoder().is_registered(&testing::reading_type_url()));

        for item in reader.decoded_entries(&Selection::topics(["/a", "/b"])).unwrap() {
            let (entry, decoded) = item.unwrap();
            let decoded = decoded.expect("typed entry");
            let dynamic = decoded.as_dynamic().expect("no static decoder registered");
            assert_eq!(dynamic.descriptor().full_name(), "protobag_test.Reading");

            let stamped = entry.as_stamped().unwrap();
            let sensor = &stamped.topic[1..];
            let expected = testing::reading(sensor, stamped.timestamp.seconds() as f64);
            let via_dynamic = Reading::decode(decoded.encode_to_bytes().as_slice()).unwrap();
            assert_eq!(via_dynamic, expected, "{:?}", backend);
        }
    }
}

#[test]
fn closure_carries_imported_files() {
    let bag = TestBag::new(Backend::Directory);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();

    let reader = bag.reader();
    let index = reader.index().unwrap();
    let closure = index
        .descriptor_pool
        .get(&testing::reading_type_url())
        .expect("closure recorded for Reading");
    let files = closure.file_names();
    assert!(files.contains(testing::SENSORS_FILE));
    assert!(files.contains(testing::GEOMETRY_FILE));
    assert!(!files.contains(testing::UNRELATED_FILE));

    // A decoder seeded only from the recovered closure handles the nested type
    let mut decoder = MessageDecoder::empty();
    decoder.register(&testing::reading_type_url(), closure).unwrap();
    let reading = decoder.descriptor_for(&testing::reading_type_url()).unwrap();
    assert!(reading.parent_pool().get_message_by_name("protobag_test.Point").is_some());
}

#[test]
fn registering_twice_changes_nothing() {
    let bag = TestBag::new(Backend::Memory);
    let mut writer = bag.writer();
    write_two_topics(&mut writer);
    writer.close().unwrap();

    let mut reader = bag.reader();
    let files = reader.decoder().file_count();
    assert_eq!(reader.register_index_descriptors().unwrap(), 1);
    assert_eq!(reader.register_index_descriptors().unwrap(), 1);
    assert_eq!(reader.decoder().file_count(), files);
}

#[test]
fn static_decoder_takes_precedence() {
    let bag = TestBag::new(Backend::Tar);
    let mut writer = bag.writer();
    writer.write_message_typed("/calib", &testing::dynamic_reading("cam", 4.0)).unwrap();
    writer.close().unwrap();

    let mut reader = bag.reader();
    reader.decoder_mut().register_static::<Reading>();
    let entry = reader.get_entry("/calib").unwrap();
    let decoded = reader.decode(&entry).unwrap().unwrap();
    assert_eq!(decoded.downcast_ref::<Reading>(), Some(&testing::reading("cam", 4.0)));
}

#[test]
fn without_dynamic_decode_unknown_types_fail() {
    let bag = TestBag::new(Backend::Memory);
    let mut writer = bag.writer();
    writer.write_message_typed("/calib", &testing::dynamic_reading("cam", 4.0)).unwrap();
    writer.close().unwrap();

    let reader = bag.reader_with(ReaderConfig::default().with_dynamic_decode(false));
    let entry = reader.get_entry("/calib").unwrap();
    assert!(matches!(reader.decode(&entry), Err(Error::Decode { .. })));
}

#[test]
fn raw_entries_decode_to_nothing() {
    let bag = TestBag::new(Backend::TarZstd);
    let mut writer = bag.writer();
    writer.write_raw("/blob", b"\x0a\x03abc").unwrap();
    writer.close().unwrap();

    let reader = bag.reader();
    let entry = reader.get_entry("/blob").unwrap();
    assert!(entry.is_raw());
    assert!(reader.decode(&entry).unwrap().is_none());
}

#[test]
fn built_in_index_type_decodes_statically() {
    let decoder = MessageDecoder::new();
    let url = protobag::names::type_url_for("protobag.BagIndex");
    assert!(decoder.has_static(&url));
}
