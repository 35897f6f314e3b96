//! Message decoding
//!
//! [`MessageDecoder`] is a registry from type URL to [`Decoder`]. Two kinds
//! of decoder exist:
//!
//! - static: a compiled `prost::Message` type, registered with
//!   [`MessageDecoder::register_static`]
//! - dynamic: a descriptor closure added to the decoder's own
//!   [`DescriptorPool`]; payloads decode into a [`DynamicMessage`]
//!
//! Resolution for a [`TypedBytes`]:
//!
//! 1. If its entry name is pinned (from the bag index), the pinned type URL
//!    is used. A different, non-empty type URL on the message is a
//!    `SchemaConflict`.
//! 2. A static decoder for the type URL, if one is registered.
//! 3. The descriptor pool, if a closure was registered for the type URL.
//!
//! Anything else is a `Decode` error naming the type URL.
//!
//! Each decoder owns its pool; nothing is shared between sessions.

use prost::Name;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use prost_types::FileDescriptorProto;
use protobag_core::{names, pb, BagIndex, DescriptorClosure, Error, Result, TypedBytes};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// Decoded messages
// =============================================================================

/// A decoded message of any type
///
/// Implemented for every `prost::Message`, which covers both compiled types
/// and [`DynamicMessage`].
pub trait DecodedMessage: fmt::Debug + Send + Sync + 'static {
    /// For downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Re-encode to protobuf wire bytes
    fn encode_to_bytes(&self) -> Vec<u8>;
}

impl<M: prost::Message + 'static> DecodedMessage for M {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

impl dyn DecodedMessage {
    /// Downcast to a concrete message type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// The dynamic message, if this was decoded from descriptors
    pub fn as_dynamic(&self) -> Option<&DynamicMessage> {
        self.downcast_ref::<DynamicMessage>()
    }
}

// =============================================================================
// Decoders
// =============================================================================

/// Decodes payloads of one type
pub trait Decoder: Send + Sync {
    /// Decode a serialized payload
    fn decode(&self, payload: &[u8]) -> Result<Box<dyn DecodedMessage>>;
}

/// Decoder for a compiled message type
pub struct StaticDecoder<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> StaticDecoder<M> {
    /// Create a decoder for `M`
    pub fn new() -> Self {
        StaticDecoder {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for StaticDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: prost::Message + Default + 'static> Decoder for StaticDecoder<M> {
    fn decode(&self, payload: &[u8]) -> Result<Box<dyn DecodedMessage>> {
        Ok(Box::new(M::decode(payload)?))
    }
}

/// Decoder backed by a message descriptor
#[derive(Debug, Clone)]
pub struct DescriptorDecoder {
    descriptor: MessageDescriptor,
}

impl DescriptorDecoder {
    /// Create a decoder for `descriptor`
    pub fn new(descriptor: MessageDescriptor) -> Self {
        DescriptorDecoder { descriptor }
    }

    /// Decode into a [`DynamicMessage`]
    pub fn decode_dynamic(&self, payload: &[u8]) -> Result<DynamicMessage> {
        Ok(DynamicMessage::decode(self.descriptor.clone(), payload)?)
    }
}

impl Decoder for DescriptorDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Box<dyn DecodedMessage>> {
        Ok(Box::new(self.decode_dynamic(payload)?))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Type URL to decoder registry
pub struct MessageDecoder {
    statics: HashMap<String, Arc<dyn Decoder>>,
    pool: DescriptorPool,
    /// Type URLs whose closures are in `pool`
    registered: HashSet<String>,
    /// Entry name to the type URL it was written with
    pins: HashMap<String, String>,
}

impl fmt::Debug for MessageDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDecoder")
            .field("statics", &self.statics.len())
            .field("registered", &self.registered.len())
            .field("files", &self.pool.files().len())
            .field("pins", &self.pins.len())
            .finish()
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    /// Registry with static decoders for the bag format's own messages
    /// and the `protobag.StdMsg` wrappers
    pub fn new() -> Self {
        let mut decoder = Self::empty();
        decoder.register_static::<pb::StampedMessage>();
        decoder.register_static::<pb::TopicTime>();
        decoder.register_static::<pb::Selection>();
        decoder.register_static::<pb::BagIndex>();
        decoder.register_static::<pb::std_msg::BoolValue>();
        decoder.register_static::<pb::std_msg::IntValue>();
        decoder.register_static::<pb::std_msg::FloatValue>();
        decoder.register_static::<pb::std_msg::StringValue>();
        decoder.register_static::<pb::std_msg::BytesValue>();
        decoder
    }

    /// Registry with nothing registered
    pub fn empty() -> Self {
        MessageDecoder {
            statics: HashMap::new(),
            pool: DescriptorPool::new(),
            registered: HashSet::new(),
            pins: HashMap::new(),
        }
    }

    /// Register a compiled type under its canonical type URL
    pub fn register_static<M>(&mut self)
    where
        M: prost::Message + Name + Default + 'static,
    {
        self.register_static_as(names::type_url_for(&M::full_name()), StaticDecoder::<M>::new());
    }

    /// Register a decoder under an explicit type URL
    pub fn register_static_as<D: Decoder + 'static>(&mut self, type_url: impl Into<String>, decoder: D) {
        let type_url = type_url.into();
        trace!(target: "protobag::decoder", type_url = %type_url, "Registered static decoder");
        self.statics.insert(type_url, Arc::new(decoder));
    }

    /// Register a type from its descriptor closure
    ///
    /// Only files the pool does not already hold are added, imports first.
    /// Registering a type URL again is a no-op.
    pub fn register(&mut self, type_url: &str, closure: &DescriptorClosure) -> Result<()> {
        if self.registered.contains(type_url) {
            return Ok(());
        }

        let mut pending: Vec<&FileDescriptorProto> = closure
            .files()
            .iter()
            .filter(|f| self.pool.get_file_by_name(f.name()).is_none())
            .collect();
        let added = pending.len();

        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for file in pending {
                if self.pool.get_file_by_name(file.name()).is_some() {
                    continue;
                }
                let ready = file
                    .dependency
                    .iter()
                    .all(|dep| self.pool.get_file_by_name(dep).is_some());
                if ready {
                    self.pool
                        .add_file_descriptor_proto(file.clone())
                        .map_err(|e| Error::descriptor(format!("{} ({}): {}", file.name(), type_url, e)))?;
                } else {
                    blocked.push(file);
                }
            }
            if blocked.len() == before {
                let missing: Vec<&str> = blocked.iter().map(|f| f.name()).collect();
                return Err(Error::descriptor(format!(
                    "unresolved imports for {}: {}",
                    type_url,
                    missing.join(", ")
                )));
            }
            pending = blocked;
        }

        if self.pool.get_message_by_name(names::message_name(type_url)).is_none() {
            return Err(Error::descriptor(format!(
                "closure for {} does not declare the type",
                type_url
            )));
        }
        self.registered.insert(type_url.to_string());
        debug!(target: "protobag::decoder", type_url, files_added = added, "Registered descriptors");
        Ok(())
    }

    /// Pin an entry to the type URL it was written with
    pub fn register_entry(&mut self, entry_name: impl Into<String>, type_url: impl Into<String>) {
        self.pins.insert(entry_name.into(), type_url.into());
    }

    /// Register every closure and entry pin in a bag index
    ///
    /// A type that fails to register is logged and skipped. Returns the
    /// number of types now decodable from the index.
    pub fn register_from_index(&mut self, index: &BagIndex) -> usize {
        let mut ok = 0;
        for (type_url, closure) in &index.descriptor_pool {
            match self.register(type_url, closure) {
                Ok(()) => ok += 1,
                Err(e) => {
                    warn!(target: "protobag::decoder", type_url = %type_url, error = %e, "Skipping undecodable type")
                }
            }
        }
        for (entry_name, type_url) in &index.entry_name_to_type_url {
            self.register_entry(entry_name.clone(), type_url.clone());
        }
        ok
    }

    /// Whether a static decoder is registered for `type_url`
    pub fn has_static(&self, type_url: &str) -> bool {
        self.statics.contains_key(type_url)
    }

    /// Whether descriptors are registered for `type_url`
    pub fn is_registered(&self, type_url: &str) -> bool {
        self.registered.contains(type_url)
    }

    /// Number of files in the descriptor pool
    pub fn file_count(&self) -> usize {
        self.pool.files().len()
    }

    /// Descriptor of a registered type
    pub fn descriptor_for(&self, type_url: &str) -> Option<MessageDescriptor> {
        if !self.registered.contains(type_url) {
            return None;
        }
        self.pool.get_message_by_name(names::message_name(type_url))
    }

    /// Type URL pinned to `entry_name`
    pub fn pinned_type_url(&self, entry_name: &str) -> Option<&str> {
        self.pins.get(entry_name).map(String::as_str)
    }

    /// Type URL `msg` should be decoded as
    pub fn resolve_type_url<'a>(&'a self, msg: &'a TypedBytes) -> Result<&'a str> {
        let pinned = msg
            .entry_name
            .as_deref()
            .and_then(|name| self.pinned_type_url(name))
            .filter(|pin| !pin.is_empty());
        match pinned {
            Some(pin) if !msg.type_url.is_empty() && pin != msg.type_url => Err(Error::SchemaConflict {
                entry_name: msg.entry_name.clone().unwrap_or_default(),
                pinned: pin.to_string(),
                requested: msg.type_url.clone(),
            }),
            Some(pin) => Ok(pin),
            None => Ok(&msg.type_url),
        }
    }

    /// Decode a message
    pub fn decode(&self, msg: &TypedBytes) -> Result<Box<dyn DecodedMessage>> {
        let type_url = self.resolve_type_url(msg)?;
        if type_url.is_empty() {
            return Err(Error::decode(type_url, msg.entry_name.as_deref()));
        }
        if let Some(decoder) = self.statics.get(type_url) {
            return decoder.decode(&msg.payload);
        }
        let descriptor = self
            .descriptor_for(type_url)
            .ok_or_else(|| Error::decode(type_url, msg.entry_name.as_deref()))?;
        DescriptorDecoder::new(descriptor).decode(&msg.payload)
    }

    /// Decode through the descriptor pool only, ignoring static decoders
    pub fn decode_dynamic(&self, msg: &TypedBytes) -> Result<DynamicMessage> {
        let type_url = self.resolve_type_url(msg)?;
        let descriptor = self
            .descriptor_for(type_url)
            .ok_or_else(|| Error::decode(type_url, msg.entry_name.as_deref()))?;
        DescriptorDecoder::new(descriptor).decode_dynamic(&msg.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors;
    use crate::testing::{self, Reading};
    use prost::Message;
    use prost_reflect::ReflectMessage;

    fn reading_bytes() -> TypedBytes {
        TypedBytes::new(
            testing::reading_type_url(),
            testing::reading("lidar", 3.5).encode_to_vec(),
        )
    }

    fn reading_closure() -> DescriptorClosure {
        descriptors::collect(&testing::reading_descriptor())
    }

    #[test]
    fn test_static_decode() {
        let mut decoder = MessageDecoder::empty();
        decoder.register_static::<Reading>();
        let decoded = decoder.decode(&reading_bytes()).unwrap();
        let reading = decoded.downcast_ref::<Reading>().unwrap();
        assert_eq!(reading, &testing::reading("lidar", 3.5));
        assert!(decoded.as_dynamic().is_none());
    }

    #[test]
    fn test_dynamic_matches_static() {
        let mut decoder = MessageDecoder::empty();
        decoder
            .register(&testing::reading_type_url(), &reading_closure())
            .unwrap();
        let decoded = decoder.decode(&reading_bytes()).unwrap();
        let dynamic = decoded.as_dynamic().unwrap();
        assert_eq!(dynamic.descriptor().full_name(), "protobag_test.Reading");
        let back = Reading::decode(decoded.encode_to_bytes().as_slice()).unwrap();
        assert_eq!(back, testing::reading("lidar", 3.5));
    }

    #[test]
    fn test_static_takes_precedence() {
        let mut decoder = MessageDecoder::empty();
        decoder
            .register(&testing::reading_type_url(), &reading_closure())
            .unwrap();
        decoder.register_static::<Reading>();
        let decoded = decoder.decode(&reading_bytes()).unwrap();
        assert!(decoded.downcast_ref::<Reading>().is_some());
        // Still reachable dynamically
        assert!(decoder.decode_dynamic(&reading_bytes()).is_ok());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut decoder = MessageDecoder::empty();
        let url = testing::reading_type_url();
        decoder.register(&url, &reading_closure()).unwrap();
        let files = decoder.file_count();
        decoder.register(&url, &reading_closure()).unwrap();
        assert_eq!(decoder.file_count(), files);
        assert_eq!(files, 2);

        // Overlapping closure for another type adds nothing new
        let point = descriptors::collect(&testing::point_descriptor());
        decoder.register(&testing::point_type_url(), &point).unwrap();
        assert_eq!(decoder.file_count(), files);
        assert!(decoder.is_registered(&testing::point_type_url()));
    }

    #[test]
    fn test_register_orders_imports() {
        // sensors.proto listed before the geometry.proto it imports
        let closure = DescriptorClosure::new(vec![testing::sensors_file(), testing::geometry_file()]);
        let mut decoder = MessageDecoder::empty();
        decoder.register(&testing::reading_type_url(), &closure).unwrap();
        assert!(decoder.descriptor_for(&testing::reading_type_url()).is_some());
    }

    #[test]
    fn test_register_missing_import_fails() {
        let closure = DescriptorClosure::new(vec![testing::sensors_file()]);
        let mut decoder = MessageDecoder::empty();
        let err = decoder
            .register(&testing::reading_type_url(), &closure)
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor(ref m) if m.contains("sensors.proto")));
        assert!(!decoder.is_registered(&testing::reading_type_url()));
    }

    #[test]
    fn test_register_wrong_closure_fails() {
        let closure = DescriptorClosure::new(vec![testing::unrelated_file()]);
        let mut decoder = MessageDecoder::empty();
        let err = decoder
            .register(&testing::reading_type_url(), &closure)
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor(_)));
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let decoder = MessageDecoder::new();
        let msg = reading_bytes().with_entry_name("/r");
        match decoder.decode(&msg).unwrap_err() {
            Error::Decode {
                type_url,
                entry_name,
            } => {
                assert_eq!(type_url, testing::reading_type_url());
                assert_eq!(entry_name.as_deref(), Some("/r"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pin_conflict() {
        let mut decoder = MessageDecoder::empty();
        decoder.register_static::<Reading>();
        decoder.register_entry("/r", testing::point_type_url());
        let err = decoder
            .decode(&reading_bytes().with_entry_name("/r"))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
    }

    #[test]
    fn test_pin_supplies_missing_type_url() {
        let mut decoder = MessageDecoder::empty();
        decoder.register_static::<Reading>();
        decoder.register_entry("/r", testing::reading_type_url());
        let msg = TypedBytes::new("", testing::reading("a", 1.0).encode_to_vec()).with_entry_name("/r");
        let decoded = decoder.decode(&msg).unwrap();
        assert!(decoded.downcast_ref::<Reading>().is_some());

        let unpinned = TypedBytes::new("", vec![]);
        assert!(matches!(decoder.decode(&unpinned), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_builtin_wrappers() {
        let decoder = MessageDecoder::new();
        let value = pb::std_msg::IntValue { value: -42 };
        let msg = TypedBytes::new(
            names::type_url_for("protobag.StdMsg.Int"),
            value.encode_to_vec(),
        );
        let decoded = decoder.decode(&msg).unwrap();
        assert_eq!(decoded.downcast_ref::<pb::std_msg::IntValue>(), Some(&value));
        assert!(decoder.has_static(&names::type_url_for("protobag.BagIndex")));
    }

    #[test]
    fn test_register_from_index_skips_bad_types() {
        let mut index = BagIndex::default();
        index
            .descriptor_pool
            .insert(testing::reading_type_url(), reading_closure());
        index.descriptor_pool.insert(
            names::type_url_for("protobag_test.Missing"),
            DescriptorClosure::new(vec![testing::unrelated_file()]),
        );
        index
            .entry_name_to_type_url
            .insert("/r".to_string(), testing::reading_type_url());

        let mut decoder = MessageDecoder::empty();
        assert_eq!(decoder.register_from_index(&index), 1);
        assert_eq!(decoder.pinned_type_url("/r"), Some(testing::reading_type_url().as_str()));
        assert!(decoder.decode(&reading_bytes().with_entry_name("/r")).is_ok());
    }

    #[test]
    fn test_malformed_payload() {
        let mut decoder = MessageDecoder::empty();
        decoder.register_static::<Reading>();
        let msg = TypedBytes::new(testing::reading_type_url(), vec![0x0a, 0x09]);
        assert!(matches!(decoder.decode(&msg), Err(Error::Protobuf(_))));
    }
}
