//! Metadata fingerprints
//!
//! A fingerprint is a canonical digest of a backing-store entry's metadata:
//! type, originating store type, owner, group, mode and content hash. It is
//! used for change detection only, never for identity. Computing one is
//! pure and total; semantically identical snapshots always fingerprint
//! equal. The serialized form is persisted inside tree entries and must
//! round-trip through [`Fingerprint::parse`].

use crate::status::BackingStatus;
use std::fmt;

/// Placeholder for fields the store did not report
const UNSET: &str = "_";

/// Canonical digest of a backing-store entry's metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    kind: String,
    store: String,
    owner: String,
    group: String,
    mode: String,
    content_hash: String,
}

impl Fingerprint {
    /// Compute a fingerprint from a status snapshot
    #[must_use]
    pub fn from_status(store_type: &str, status: &BackingStatus) -> Self {
        let content_hash = status
            .file
            .as_ref()
            .map_or_else(|| UNSET.to_string(), |f| f.content_hash.clone());
        Self {
            kind: status.kind.as_str().to_string(),
            store: tag(store_type),
            owner: tag(&status.owner),
            group: tag(&status.group),
            mode: format!("{:o}", status.mode),
            content_hash: tag(&content_hash),
        }
    }

    /// The fingerprint of a structurally absent counterpart
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            kind: UNSET.to_string(),
            store: UNSET.to_string(),
            owner: UNSET.to_string(),
            group: UNSET.to_string(),
            mode: UNSET.to_string(),
            content_hash: UNSET.to_string(),
        }
    }

    /// Whether this fingerprint describes an existing entry
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.kind != UNSET
    }

    /// Serialize for persistence inside a tree entry
    #[must_use]
    pub fn serialize(&self) -> String {
        format!(
            "type:{} store:{} owner:{} group:{} mode:{} hash:{}",
            self.kind, self.store, self.owner, self.group, self.mode, self.content_hash
        )
    }

    /// Parse a serialized fingerprint; `None` for anything malformed
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let mut fields = [None, None, None, None, None, None];
        const KEYS: [&str; 6] = ["type", "store", "owner", "group", "mode", "hash"];
        for pair in input.split(' ') {
            let (key, value) = pair.split_once(':')?;
            let idx = KEYS.iter().position(|k| *k == key)?;
            if fields[idx].is_some() {
                return None;
            }
            fields[idx] = Some(value.to_string());
        }
        let [kind, store, owner, group, mode, content_hash] = fields;
        Some(Self {
            kind: kind?,
            store: store?,
            owner: owner?,
            group: group?,
            mode: mode?,
            content_hash: content_hash?,
        })
    }

    /// Whether the type and content signature match
    #[must_use]
    pub fn matches_content(&self, other: &Self) -> bool {
        self.kind == other.kind && self.content_hash == other.content_hash
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

fn tag(value: &str) -> String {
    if value.is_empty() {
        UNSET.to_string()
    } else {
        // Spaces would break the serialized form
        value.replace(' ', "_")
    }
}
