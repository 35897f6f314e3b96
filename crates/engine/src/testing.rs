//! Testing utilities
//!
//! Schemas for tests are assembled at runtime as `FileDescriptorProto`s, so
//! no protobuf compiler is needed. The layout exercises import closures:
//!
//! ```text
//! protobag_test/geometry.proto   Point { x, y }, Pose { position, heading }
//! protobag_test/sensors.proto    Reading { sensor, value, origin: Point }   imports geometry
//! protobag_test/unrelated.proto  Unused { note }
//! ```
//!
//! [`Point`] and [`Reading`] are hand-written prost twins of the runtime
//! schemas for comparing static and dynamic decoding.

use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};

/// Package of the fixture schemas
pub const TEST_PACKAGE: &str = "protobag_test";
/// File declaring `Point` and `Pose`
pub const GEOMETRY_FILE: &str = "protobag_test/geometry.proto";
/// File declaring `Reading`, importing [`GEOMETRY_FILE`]
pub const SENSORS_FILE: &str = "protobag_test/sensors.proto";
/// File with no relation to the others
pub const UNRELATED_FILE: &str = "protobag_test/unrelated.proto";

/// `protobag_test.Point` twin
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    /// X coordinate
    #[prost(double, tag = "1")]
    pub x: f64,
    /// Y coordinate
    #[prost(double, tag = "2")]
    pub y: f64,
}

/// `protobag_test.Reading` twin
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reading {
    /// Sensor name
    #[prost(string, tag = "1")]
    pub sensor: String,
    /// Measured value
    #[prost(double, tag = "2")]
    pub value: f64,
    /// Sensor position
    #[prost(message, optional, tag = "3")]
    pub origin: Option<Point>,
}

impl ::prost::Name for Point {
    const NAME: &'static str = "Point";
    const PACKAGE: &'static str = TEST_PACKAGE;
}

impl ::prost::Name for Reading {
    const NAME: &'static str = "Reading";
    const PACKAGE: &'static str = TEST_PACKAGE;
}

fn field(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn file(name: &str, deps: &[&str], messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(TEST_PACKAGE.to_string()),
        dependency: deps.iter().map(|d| d.to_string()).collect(),
        message_type: messages,
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// `protobag_test/geometry.proto`
pub fn geometry_file() -> FileDescriptorProto {
    file(
        GEOMETRY_FILE,
        &[],
        vec![
            message(
                "Point",
                vec![
                    field("x", 1, Type::Double, None),
                    field("y", 2, Type::Double, None),
                ],
            ),
            message(
                "Pose",
                vec![
                    field("position", 1, Type::Message, Some(".protobag_test.Point")),
                    field("heading", 2, Type::Double, None),
                ],
            ),
        ],
    )
}

/// `protobag_test/sensors.proto`
pub fn sensors_file() -> FileDescriptorProto {
    file(
        SENSORS_FILE,
        &[GEOMETRY_FILE],
        vec![message(
            "Reading",
            vec![
                field("sensor", 1, Type::String, None),
                field("value", 2, Type::Double, None),
                field("origin", 3, Type::Message, Some(".protobag_test.Point")),
            ],
        )],
    )
}

/// `protobag_test/unrelated.proto`
pub fn unrelated_file() -> FileDescriptorProto {
    file(
        UNRELATED_FILE,
        &[],
        vec![message("Unused", vec![field("note", 1, Type::String, None)])],
    )
}

/// Pool holding every fixture file
///
/// Stands in for "the writer's compiled schemas".
pub fn fixture_pool() -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_protos([geometry_file(), sensors_file(), unrelated_file()])
        .expect("fixture schemas are valid");
    pool
}

/// Descriptor of `protobag_test.Reading`
pub fn reading_descriptor() -> MessageDescriptor {
    fixture_pool()
        .get_message_by_name("protobag_test.Reading")
        .expect("Reading is declared")
}

/// Descriptor of `protobag_test.Point`
pub fn point_descriptor() -> MessageDescriptor {
    fixture_pool()
        .get_message_by_name("protobag_test.Point")
        .expect("Point is declared")
}

/// Type URL of `protobag_test.Reading`
pub fn reading_type_url() -> String {
    protobag_core::names::type_url_for("protobag_test.Reading")
}

/// Type URL of `protobag_test.Point`
pub fn point_type_url() -> String {
    protobag_core::names::type_url_for("protobag_test.Point")
}

/// A static `Reading`
pub fn reading(sensor: &str, value: f64) -> Reading {
    Reading {
        sensor: sensor.to_string(),
        value,
        origin: Some(Point { x: value, y: -value }),
    }
}

/// The same `Reading`, built dynamically from the fixture schema
pub fn dynamic_reading(sensor: &str, value: f64) -> DynamicMessage {
    let descriptor = reading_descriptor();
    let point = descriptor
        .parent_pool()
        .get_message_by_name("protobag_test.Point")
        .expect("Point is declared");
    let mut origin = DynamicMessage::new(point);
    origin.set_field_by_name("x", Value::F64(value));
    origin.set_field_by_name("y", Value::F64(-value));

    let mut msg = DynamicMessage::new(descriptor);
    msg.set_field_by_name("sensor", Value::String(sensor.to_string()));
    msg.set_field_by_name("value", Value::F64(value));
    msg.set_field_by_name("origin", Value::Message(origin));
    msg
}
