//! Entry-name and type-URL conventions
//!
//! ## Entry names
//!
//! Names are canonicalized to a single leading `/` with no trailing `/`, so
//! `camera`, `/camera` and `//camera/` all address the same topic. Stamped
//! entries are named deterministically from their topic and timestamp:
//!
//! ```text
//! /<topic>/<seconds>.<nanos>.stampedmsg.protobin        first write
//! /<topic>/<seconds>.<nanos>.stampedmsg.<k>.protobin    k-th collision (k >= 1)
//! ```
//!
//! Everything under `/_protobag_index` is reserved for the bag index and is
//! never returned by a user-facing selection.
//!
//! ## Type URLs
//!
//! `type.googleapis.com/<full.message.Name>`, the shape `google.protobuf.Any`
//! uses. Only the part after the last `/` is significant when looking a type
//! up in a descriptor pool.

use crate::timestamp::Timestamp;

/// Root of the reserved index namespace
pub const INDEX_TOPIC: &str = "/_protobag_index";

/// Topic under which the bag index is written
pub const BAG_INDEX_TOPIC: &str = "/_protobag_index/bag_index";

/// Infix marking stamped-message entries
pub const STAMPED_INFIX: &str = "stampedmsg";

/// Extension of serialized protobuf entries
pub const PROTOBIN_EXT: &str = "protobin";

/// Default host prefix of type URLs
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Canonicalize an entry name or topic
pub fn canonical(name: &str) -> String {
    let trimmed = name.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push('/');
    out.push_str(trimmed);
    out
}

/// Whether a name lives in the reserved index namespace
pub fn is_reserved(name: &str) -> bool {
    let name = canonical(name);
    name == INDEX_TOPIC || name.starts_with(&format!("{}/", INDEX_TOPIC))
}

/// Deterministic name of a stamped entry
///
/// `collision` is 0 for the first entry with this `(topic, timestamp)` and
/// increases for each further write with the same pair.
pub fn stamped_entry_name(topic: &str, ts: Timestamp, collision: u32) -> String {
    let topic = canonical(topic);
    let sep = if topic == "/" { "" } else { "/" };
    if collision == 0 {
        format!(
            "{}{}{}.{}.{}.{}",
            topic,
            sep,
            ts.seconds(),
            ts.nanos(),
            STAMPED_INFIX,
            PROTOBIN_EXT
        )
    } else {
        format!(
            "{}{}{}.{}.{}.{}.{}",
            topic,
            sep,
            ts.seconds(),
            ts.nanos(),
            STAMPED_INFIX,
            collision,
            PROTOBIN_EXT
        )
    }
}

/// Topic of a stamped entry: the parent path of its name
pub fn topic_of(entry_name: &str) -> String {
    let name = canonical(entry_name);
    match name.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => name[..idx].to_string(),
    }
}

/// Build a type URL for a fully-qualified message name
pub fn type_url_for(full_name: &str) -> String {
    format!("{}{}", TYPE_URL_PREFIX, full_name)
}

/// Fully-qualified message name of a type URL
pub fn message_name(type_url: &str) -> &str {
    match type_url.rfind('/') {
        Some(idx) => &type_url[idx + 1..],
        None => type_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("camera"), "/camera");
        assert_eq!(canonical("/camera/"), "/camera");
        assert_eq!(canonical("//a/b"), "/a/b");
        assert_eq!(canonical(""), "/");
    }

    #[test]
    fn test_reserved() {
        assert!(is_reserved("/_protobag_index"));
        assert!(is_reserved("_protobag_index/bag_index/1.0.stampedmsg.protobin"));
        assert!(!is_reserved("/_protobag_indexed"));
        assert!(!is_reserved("/camera"));
    }

    #[test]
    fn test_stamped_entry_name() {
        let ts = Timestamp::new(12, 34).unwrap();
        assert_eq!(
            stamped_entry_name("camera", ts, 0),
            "/camera/12.34.stampedmsg.protobin"
        );
        assert_eq!(
            stamped_entry_name("/camera/", ts, 2),
            "/camera/12.34.stampedmsg.2.protobin"
        );
    }

    #[test]
    fn test_topic_of() {
        assert_eq!(topic_of("/camera/left/1.0.stampedmsg.protobin"), "/camera/left");
        assert_eq!(topic_of("/toplevel"), "/");
        assert_eq!(
            topic_of(&stamped_entry_name("/imu", Timestamp::from_secs(3), 1)),
            "/imu"
        );
    }

    #[test]
    fn test_type_url_helpers() {
        let url = type_url_for("pkg.sub.Msg");
        assert_eq!(url, "type.googleapis.com/pkg.sub.Msg");
        assert_eq!(message_name(&url), "pkg.sub.Msg");
        assert_eq!(message_name("pkg.Msg"), "pkg.Msg");
    }
}
