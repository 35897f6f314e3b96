//! Descriptor closures
//!
//! A closure is the set of schema files needed to rebuild one message type
//! without generated code: the file declaring the type plus every file it
//! transitively imports. File order carries no meaning.

use crate::error::Result;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::BTreeSet;

/// Schema files sufficient to decode one type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorClosure {
    files: Vec<FileDescriptorProto>,
}

impl DescriptorClosure {
    /// Wrap a list of file descriptors
    pub fn new(files: Vec<FileDescriptorProto>) -> Self {
        DescriptorClosure { files }
    }

    /// Decode a serialized `google.protobuf.FileDescriptorSet`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(bytes)?;
        Ok(Self::from(set))
    }

    /// Serialize as a `google.protobuf.FileDescriptorSet`
    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.to_file_descriptor_set().encode_to_vec()
    }

    /// The file descriptors
    pub fn files(&self) -> &[FileDescriptorProto] {
        &self.files
    }

    /// Names of the contained files
    pub fn file_names(&self) -> BTreeSet<String> {
        self.files.iter().map(|f| f.name().to_string()).collect()
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if there are no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Convert into the protobuf set form
    pub fn to_file_descriptor_set(&self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.files.clone(),
        }
    }
}

impl From<FileDescriptorSet> for DescriptorClosure {
    fn from(set: FileDescriptorSet) -> Self {
        DescriptorClosure { files: set.file }
    }
}

impl From<DescriptorClosure> for FileDescriptorSet {
    fn from(closure: DescriptorClosure) -> Self {
        FileDescriptorSet {
            file: closure.files,
        }
    }
}
