//! Directory searches, change records and `ipa` commands.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use idrange_engine::{local_ranges, IdRange, IdentityKind, ID_CEILING};

/// Where the generated searches append their results.
pub const OUTOFRANGE_FILE: &str = "outofranges.ldif";

/// Bind DN used in the printed commands.
pub const DIRECTORY_MANAGER: &str = "cn=Directory Manager";

struct SearchTarget {
    object_class: &'static str,
    attribute: &'static str,
    container: &'static str,
}

fn search_target(kind: IdentityKind) -> SearchTarget {
    match kind {
        IdentityKind::User => SearchTarget {
            object_class: "posixaccount",
            attribute: "uidNumber",
            container: "users",
        },
        IdentityKind::Group => SearchTarget {
            object_class: "posixgroup",
            attribute: "gidNumber",
            container: "groups",
        },
    }
}

/// LDAP filter matching users or groups outside every local range.
///
/// One `(&(attr>=lo)(attr<=hi))` term per gap between sorted local
/// ranges, from 1 up to 2147483647.
pub fn outofrange_filter(ranges: &[IdRange], kind: IdentityKind) -> String {
    let target = search_target(kind);
    let attr = target.attribute;

    let mut local = local_ranges(ranges);
    local.sort_by_key(|range| range.first_id());

    let mut filter = format!("(&(objectClass={})(|", target.object_class);
    let mut lower = 1;
    for range in local {
        filter.push_str(&format!(
            "(&({attr}>={lower})({attr}<={}))",
            range.first_id().saturating_sub(1)
        ));
        lower = range.last_id().saturating_add(1);
    }
    filter.push_str(&format!("(&({attr}>={lower})({attr}<={ID_CEILING}))"));
    filter.push_str("))");
    filter
}

/// `ldapsearch` invocation that dumps out-of-range entries to
/// [`OUTOFRANGE_FILE`]. `None` when there is no local range to search
/// around.
pub fn ldapsearch_command(ranges: &[IdRange], kind: IdentityKind, suffix: &str) -> Option<String> {
    if local_ranges(ranges).is_empty() {
        return None;
    }
    let target = search_target(kind);
    Some(format!(
        "ldapsearch -xLLL -o ldif-wrap=no -D \"{DIRECTORY_MANAGER}\" -W -b \"cn={},cn=accounts,{suffix}\" \"{}\" dn {} >> {OUTOFRANGE_FILE}",
        target.container,
        outofrange_filter(ranges, kind),
        target.attribute,
    ))
}

/// DN of a range: where it was read from, or where a new one goes.
pub fn range_dn(range: &IdRange, suffix: &str) -> String {
    range.origin.as_ref().map_or_else(
        || format!("cn={},cn=ranges,cn=etc,{suffix}", range.name),
        |origin| origin.as_str().to_string(),
    )
}

/// RFC 2849 SAFE-STRING check; anything else is written base64.
fn is_safe_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    if matches!(bytes.first(), Some(b' ' | b':' | b'<')) || value.ends_with(' ') {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii() && !matches!(b, b'\0' | b'\n' | b'\r'))
}

fn push_line(out: &mut String, name: &str, value: &str) {
    if is_safe_value(value) {
        out.push_str(&format!("{name}: {value}\n"));
    } else {
        out.push_str(&format!("{name}:: {}\n", STANDARD.encode(value)));
    }
}

/// LDIF modify record adding the given RID bases.
///
/// Only the bases passed as `Some` are written, so attributes already on
/// the entry are left alone.
pub fn rid_bases_modify(dn: &str, base_rid: Option<u64>, secondary_base_rid: Option<u64>) -> String {
    let mut out = String::new();
    push_line(&mut out, "dn", dn);
    out.push_str("changetype: modify\n");
    for (attribute, value) in [
        ("ipaBaseRID", base_rid),
        ("ipaSecondaryBaseRID", secondary_base_rid),
    ] {
        if let Some(value) = value {
            out.push_str(&format!("add: {attribute}\n{attribute}: {value}\n-\n"));
        }
    }
    out
}

/// LDIF add record for a new local range.
pub fn range_add_record(range: &IdRange, dn: &str) -> String {
    let mut out = String::new();
    push_line(&mut out, "dn", dn);
    out.push_str("changetype: add\n");
    out.push_str("objectClass: ipaIDRange\n");
    out.push_str("objectClass: ipaDomainIDRange\n");
    push_line(&mut out, "cn", &range.name);
    out.push_str(&format!("ipaBaseID: {}\n", range.first_id()));
    out.push_str(&format!("ipaIDRangeSize: {}\n", range.size()));
    if let Some(base) = range.base_rid {
        out.push_str(&format!("ipaBaseRID: {base}\n"));
    }
    if let Some(base) = range.secondary_base_rid {
        out.push_str(&format!("ipaSecondaryBaseRID: {base}\n"));
    }
    push_line(&mut out, "ipaRangeType", range.kind.as_str());
    out
}

/// Equivalent `ipa idrange-add` command line.
///
/// RID flags are left out unless both bases are known.
pub fn idrange_add_command(range: &IdRange) -> String {
    let mut command = format!(
        "ipa idrange-add {} --base-id={} --range-size={}",
        range.name,
        range.first_id(),
        range.size()
    );
    if let (Some(base), Some(secondary)) = (range.base_rid, range.secondary_base_rid) {
        command.push_str(&format!(" --rid-base={base} --secondary-rid-base={secondary}"));
    }
    command
}

/// A single write to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// Add RID bases to an existing range.
    RidBases {
        range: String,
        dn: String,
        base_rid: Option<u64>,
        secondary_base_rid: Option<u64>,
    },
    /// Create a range.
    NewRange { dn: String, range: IdRange },
}

impl ChangeRecord {
    /// The bases `after` has that `before` lacked, if any.
    pub fn rid_bases(before: &IdRange, after: &IdRange, suffix: &str) -> Option<Self> {
        let base_rid = after.base_rid.filter(|_| before.base_rid.is_none());
        let secondary_base_rid = after
            .secondary_base_rid
            .filter(|_| before.secondary_base_rid.is_none());
        if base_rid.is_none() && secondary_base_rid.is_none() {
            return None;
        }
        Some(Self::RidBases {
            range: after.name.clone(),
            dn: range_dn(after, suffix),
            base_rid,
            secondary_base_rid,
        })
    }

    pub fn new_range(range: &IdRange, suffix: &str) -> Self {
        Self::NewRange {
            dn: range_dn(range, suffix),
            range: range.clone(),
        }
    }

    pub fn range_name(&self) -> &str {
        match self {
            Self::RidBases { range, .. } => range,
            Self::NewRange { range, .. } => &range.name,
        }
    }

    pub fn dn(&self) -> &str {
        match self {
            Self::RidBases { dn, .. } | Self::NewRange { dn, .. } => dn,
        }
    }

    /// The record as LDIF, ending in a newline.
    pub fn to_ldif(&self) -> String {
        match self {
            Self::RidBases {
                dn,
                base_rid,
                secondary_base_rid,
                ..
            } => rid_bases_modify(dn, *base_rid, *secondary_base_rid),
            Self::NewRange { dn, range } => range_add_record(range, dn),
        }
    }

    /// Heredoc `ldapmodify` command applying this record.
    pub fn ldapmodify_command(&self) -> String {
        format!(
            "ldapmodify -D \"{DIRECTORY_MANAGER}\" -W -x << EOF\n{}EOF",
            self.to_ldif()
        )
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RidBases { range, .. } => write!(f, "add RID bases to range '{range}'"),
            Self::NewRange { range, .. } => write!(f, "create range '{}'", range.name),
        }
    }
}
