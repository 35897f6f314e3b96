//! Descriptor closure collection
//!
//! Walks the import graph of a message's declaring file breadth-first and
//! returns every file reached, so a reader can rebuild the type without
//! generated code.
//!
//! The walk is file-granular: importing a file pulls in every type that
//! file declares, not only the one referenced.
//
// TODO: a type-granular walk (following field types instead of imports)
// would shrink closures for files that declare many unrelated types.

use prost_reflect::{FileDescriptor, MessageDescriptor, ReflectMessage};
use protobag_core::DescriptorClosure;
use std::collections::{HashSet, VecDeque};

/// Collect the closure of files needed to decode `descriptor`
///
/// File order in the result follows the traversal and is not meaningful.
pub fn collect(descriptor: &MessageDescriptor) -> DescriptorClosure {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<FileDescriptor> = VecDeque::new();
    let mut files = Vec::new();

    queue.push_back(descriptor.parent_file());
    while let Some(file) = queue.pop_front() {
        if !visited.insert(file.name().to_string()) {
            continue;
        }
        files.push(file.file_descriptor_proto().clone());
        for dep in file.dependencies() {
            if !visited.contains(dep.name()) {
                queue.push_back(dep);
            }
        }
    }

    DescriptorClosure::new(files)
}

/// Collect the closure for a message instance
pub fn collect_for<M: ReflectMessage>(msg: &M) -> DescriptorClosure {
    collect(&msg.descriptor())
}
