//! Range and identity records.
//!
//! Derived bounds (`last_id`, `last_base_rid`, `last_secondary_rid`) are
//! computed from their inputs on every call and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::interval::overlaps;

/// Highest identifier (and RID) a regular range may reach.
pub const ID_CEILING: u64 = 2_147_483_647;

/// Identifiers below this value are reserved for system accounts.
pub const SYSTEM_ID_FLOOR: u64 = 1000;

// =============================================================================
// Range kind
// =============================================================================

/// The `ipaRangeType` of a range.
///
/// Only [`RangeKind::Local`] ranges carry RID-base semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RangeKind {
    /// `ipa-local`
    Local,
    /// `ipa-ad-trust-posix`
    TrustPosix,
    /// `ipa-ad-trust`
    TrustAd,
    /// `ipa-local-subid`
    Subordinate,
    /// Any other range type, preserved verbatim.
    Other(String),
}

impl RangeKind {
    /// Returns the directory representation of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RangeKind::Local => "ipa-local",
            RangeKind::TrustPosix => "ipa-ad-trust-posix",
            RangeKind::TrustAd => "ipa-ad-trust",
            RangeKind::Subordinate => "ipa-local-subid",
            RangeKind::Other(raw) => raw,
        }
    }

    /// Returns true for `ipa-local` ranges.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, RangeKind::Local)
    }
}

impl From<&str> for RangeKind {
    fn from(raw: &str) -> Self {
        match raw {
            "ipa-local" => RangeKind::Local,
            "ipa-ad-trust-posix" => RangeKind::TrustPosix,
            "ipa-ad-trust" => RangeKind::TrustAd,
            "ipa-local-subid" => RangeKind::Subordinate,
            other => RangeKind::Other(other.to_string()),
        }
    }
}

impl From<String> for RangeKind {
    fn from(raw: String) -> Self {
        RangeKind::from(raw.as_str())
    }
}

impl From<RangeKind> for String {
    fn from(kind: RangeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Origin handle
// =============================================================================

/// Reference to the persisted record a range or identity was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginHandle(String);

impl OriginHandle {
    /// Wraps a directory entry name.
    pub fn new(dn: impl Into<String>) -> Self {
        Self(dn.into())
    }

    /// Returns the wrapped entry name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ID range
// =============================================================================

/// A committed or proposed block of the identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdRange {
    pub name: String,
    pub kind: RangeKind,
    first_id: u64,
    size: u64,
    pub base_rid: Option<u64>,
    pub secondary_base_rid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginHandle>,
}

impl IdRange {
    /// Creates a range of `size` identifiers starting at `first_id`.
    pub fn new(
        name: impl Into<String>,
        kind: RangeKind,
        first_id: u64,
        size: u64,
    ) -> Result<Self, EngineError> {
        let name = name.into();
        if size == 0 {
            return Err(EngineError::EmptyRange { name });
        }
        if first_id.checked_add(size).is_none() {
            return Err(EngineError::RangeOutOfBounds {
                name,
                first_id,
                size,
            });
        }
        Ok(Self {
            name,
            kind,
            first_id,
            size,
            base_rid: None,
            secondary_base_rid: None,
            origin: None,
        })
    }

    /// Creates a range covering `first..=last`.
    ///
    /// `last` below `first` yields a single-identifier range.
    #[must_use]
    pub fn spanning(name: impl Into<String>, kind: RangeKind, first: u64, last: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            first_id: first,
            size: last.saturating_sub(first).saturating_add(1).min(u64::MAX - first),
            base_rid: None,
            secondary_base_rid: None,
            origin: None,
        }
    }

    #[must_use]
    pub fn with_rid_bases(mut self, base_rid: Option<u64>, secondary_base_rid: Option<u64>) -> Self {
        self.base_rid = base_rid;
        self.secondary_base_rid = secondary_base_rid;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: OriginHandle) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn first_id(&self) -> u64 {
        self.first_id
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last identifier covered by the range (inclusive).
    #[must_use]
    pub fn last_id(&self) -> u64 {
        self.first_id + self.size - 1
    }

    /// Replaces the bounds with `first..=last`.
    pub fn set_bounds(&mut self, first: u64, last: u64) -> Result<(), EngineError> {
        if last < first {
            return Err(EngineError::EmptyRange {
                name: self.name.clone(),
            });
        }
        let size = (last - first)
            .checked_add(1)
            .filter(|size| first.checked_add(*size).is_some())
            .ok_or_else(|| EngineError::RangeOutOfBounds {
                name: self.name.clone(),
                first_id: first,
                size: last - first,
            })?;
        self.first_id = first;
        self.size = size;
        Ok(())
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.kind.is_local()
    }

    /// End of the primary RID interval, `base_rid + size`.
    ///
    /// Unlike [`IdRange::last_id`] this is not reduced by one; downstream
    /// consumers rely on the extra slot.
    #[must_use]
    pub fn last_base_rid(&self) -> Option<u64> {
        if !self.is_local() {
            return None;
        }
        self.base_rid.map(|base| base.saturating_add(self.size))
    }

    /// End of the secondary RID interval, `secondary_base_rid + size`.
    #[must_use]
    pub fn last_secondary_rid(&self) -> Option<u64> {
        if !self.is_local() {
            return None;
        }
        self.secondary_base_rid.map(|base| base.saturating_add(self.size))
    }

    /// True for local ranges lacking either RID base.
    #[must_use]
    pub fn is_missing_rid_bases(&self) -> bool {
        self.is_local() && (self.base_rid.is_none() || self.secondary_base_rid.is_none())
    }

    /// True once the range has been persisted.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.origin.is_some()
    }

    /// Returns true if the identifier intervals of both ranges intersect.
    #[must_use]
    pub fn overlaps(&self, other: &IdRange) -> bool {
        overlaps(
            self.first_id,
            self.last_id(),
            other.first_id,
            other.last_id(),
        )
    }

    /// Returns true if `id` falls inside this range.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        id >= self.first_id && id <= self.last_id()
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IDRange(name='{}', type={}, size={}, first_id={}, base_rid={}, secondary_base_rid={})",
            self.name,
            self.kind,
            self.size,
            self.first_id,
            display_opt(self.base_rid),
            display_opt(self.secondary_base_rid),
        )
    }
}

fn display_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

// =============================================================================
// Identity
// =============================================================================

/// Whether an identity is a user (UID) or a group (GID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Group,
}

/// A user or group whose number lies outside every known range.
///
/// Identities are never mutated after they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    identifier: u64,
    kind: IdentityKind,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<OriginHandle>,
}

impl Identity {
    pub fn new(identifier: u64, kind: IdentityKind, label: impl Into<String>) -> Self {
        Self {
            identifier,
            kind,
            label: label.into(),
            origin: None,
        }
    }

    pub fn user(identifier: u64, label: impl Into<String>) -> Self {
        Self::new(identifier, IdentityKind::User, label)
    }

    pub fn group(identifier: u64, label: impl Into<String>) -> Self {
        Self::new(identifier, IdentityKind::Group, label)
    }

    #[must_use]
    pub fn with_origin(mut self, origin: OriginHandle) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn identifier(&self) -> u64 {
        self.identifier
    }

    #[must_use]
    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn origin(&self) -> Option<&OriginHandle> {
        self.origin.as_ref()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, label_key, number_key) = match self.kind {
            IdentityKind::User => ("user", "username", "uid"),
            IdentityKind::Group => ("group", "groupname", "gid"),
        };
        write!(
            f,
            "{kind}({label_key}='{}', {number_key}={}",
            self.label, self.identifier
        )?;
        if let Some(origin) = &self.origin {
            write!(f, ", {origin}")?;
        }
        f.write_str(")")
    }
}
