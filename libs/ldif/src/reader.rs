//! Readers for range and identity dumps.
//!
//! Accepts both LDIF from `ldapsearch` and the indented output of
//! `ipa idrange-find --all --raw`. A record starts at a `dn:` line; lines
//! without a colon, blank lines and `#` comments are skipped. Attribute
//! names are case-insensitive and `attr:: value` is base64.
//!
//! After a `dn:` line that starts in the first column, a line starting
//! with a space continues the previous one (RFC 2849 folding). After an
//! indented `dn:` line, as `ipa` prints them, leading whitespace is only
//! indentation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use idrange_engine::{IdRange, Identity, IdentityKind, OriginHandle, RangeKind};

use crate::error::FormatError;

const CN: &str = "cn";
const BASE_ID: &str = "ipaBaseID";
const RANGE_SIZE: &str = "ipaIDRangeSize";
const BASE_RID: &str = "ipaBaseRID";
const SECONDARY_BASE_RID: &str = "ipaSecondaryBaseRID";
const RANGE_TYPE: &str = "ipaRangeType";
const UID_NUMBER: &str = "uidNumber";
const GID_NUMBER: &str = "gidNumber";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: String,
    line: usize,
}

/// One directory entry as read from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    dn: String,
    line: usize,
    attributes: Vec<Attribute>,
}

impl Record {
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Line of the `dn:` that opened the record.
    pub fn line(&self) -> usize {
        self.line
    }

    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    /// First value of `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|attribute| attribute.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn require(&self, name: &'static str) -> Result<&str, FormatError> {
        self.get(name).ok_or_else(|| FormatError::MissingAttribute {
            line: self.line,
            dn: self.dn.clone(),
            attribute: name,
        })
    }

    fn number(&self, name: &'static str) -> Result<Option<u64>, FormatError> {
        let Some(attribute) = self.attribute(name) else {
            return Ok(None);
        };
        attribute
            .value
            .parse()
            .map(Some)
            .map_err(|_| FormatError::InvalidNumber {
                line: attribute.line,
                attribute: name,
                value: attribute.value.clone(),
            })
    }

    fn require_number(&self, name: &'static str) -> Result<u64, FormatError> {
        self.require(name)?;
        self.number(name)?
            .ok_or_else(|| FormatError::MissingAttribute {
                line: self.line,
                dn: self.dn.clone(),
                attribute: name,
            })
    }
}

fn is_dn_line(line: &str) -> bool {
    line.trim_start()
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("dn:"))
}

/// Joins folded LDIF lines, keeping the number of each line's first part.
fn unfold(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    let mut folding = false;

    for (index, raw) in input.lines().enumerate() {
        if folding {
            if let (Some(rest), Some((_, previous))) = (raw.strip_prefix(' '), lines.last_mut()) {
                previous.push_str(rest);
                continue;
            }
        }
        if is_dn_line(raw) {
            folding = !raw.starts_with(char::is_whitespace);
        }
        lines.push((index + 1, raw.to_string()));
    }
    lines
}

/// Splits text into records.
pub fn parse_records(input: &str) -> Result<Vec<Record>, FormatError> {
    let mut records = Vec::new();
    let mut current: Option<Record> = None;

    for (line, raw) in unfold(input) {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((name, rest)) = trimmed.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = decode_value(line, name, rest)?;

        if name.eq_ignore_ascii_case("dn") {
            records.extend(current.take());
            current = Some(Record {
                dn: value,
                line,
                attributes: Vec::new(),
            });
        } else if let Some(record) = current.as_mut() {
            record.attributes.push(Attribute {
                name: name.to_string(),
                value,
                line,
            });
        }
    }

    records.extend(current);
    Ok(records)
}

fn decode_value(line: usize, name: &str, rest: &str) -> Result<String, FormatError> {
    if let Some(encoded) = rest.strip_prefix(':') {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| FormatError::Parse {
                line,
                reason: format!("invalid base64 value for {name}: {err}"),
            })?;
        return String::from_utf8(bytes).map_err(|_| FormatError::Parse {
            line,
            reason: format!("value for {name} is not valid UTF-8"),
        });
    }
    if rest.starts_with('<') {
        return Err(FormatError::Parse {
            line,
            reason: format!("URL value for {name} is not supported"),
        });
    }
    Ok(rest.trim().to_string())
}

fn is_range_record(record: &Record) -> bool {
    [BASE_ID, RANGE_SIZE, RANGE_TYPE]
        .iter()
        .any(|name| record.has(name))
}

fn range_from_record(record: &Record) -> Result<IdRange, FormatError> {
    let name = record.require(CN)?;
    let first_id = record.require_number(BASE_ID)?;
    let size = record.require_number(RANGE_SIZE)?;
    let kind = RangeKind::from(record.require(RANGE_TYPE)?);

    let range = IdRange::new(name, kind, first_id, size)
        .map_err(|source| FormatError::InvalidRange {
            line: record.line,
            source,
        })?
        .with_rid_bases(record.number(BASE_RID)?, record.number(SECONDARY_BASE_RID)?)
        .with_origin(OriginHandle::new(record.dn()));
    Ok(range)
}

/// Reads ID ranges from a range dump.
///
/// Entries carrying none of the range attributes (such as the container
/// itself) are skipped. Anything else that is incomplete is an error.
pub fn parse_ranges(input: &str) -> Result<Vec<IdRange>, FormatError> {
    let mut ranges = Vec::new();
    for record in parse_records(input)? {
        if !is_range_record(&record) {
            debug!(dn = record.dn(), "skipping entry without ID range attributes");
            continue;
        }
        let range = range_from_record(&record)?;
        debug!(%range, "ID range found");
        ranges.push(range);
    }
    Ok(ranges)
}

/// Attribute and value of the leftmost RDN.
fn leading_rdn(dn: &str) -> Option<(&str, &str)> {
    let rdn = dn.split(',').next()?;
    let (attribute, value) = rdn.split_once('=')?;
    Some((attribute.trim(), value.trim()))
}

fn identity_from_record(record: &Record) -> Result<Identity, FormatError> {
    let (attribute, label) = leading_rdn(record.dn()).ok_or_else(|| FormatError::Parse {
        line: record.line,
        reason: format!("cannot read a name from '{}'", record.dn()),
    })?;

    let (kind, number_attribute) = if attribute.eq_ignore_ascii_case("uid") {
        (IdentityKind::User, UID_NUMBER)
    } else {
        (IdentityKind::Group, GID_NUMBER)
    };
    let identifier = record.require_number(number_attribute)?;

    Ok(Identity::new(identifier, kind, label).with_origin(OriginHandle::new(record.dn())))
}

/// Reads users and groups from an LDIF dump.
///
/// `uid=` entries are users and use `uidNumber`; everything else is a
/// group and uses `gidNumber`.
pub fn parse_identities(input: &str) -> Result<Vec<Identity>, FormatError> {
    parse_records(input)?
        .iter()
        .map(|record| {
            let identity = identity_from_record(record)?;
            debug!(%identity, "out of range identity found");
            Ok(identity)
        })
        .collect()
}

/// The `dc=` tail of a DN.
pub fn suffix_of(dn: &str) -> Option<&str> {
    let mut offset = 0;
    for component in dn.split(',') {
        if component
            .trim_start()
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case("dc="))
        {
            return Some(dn[offset..].trim_start());
        }
        offset += component.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use idrange_engine::EngineError;
    use rstest::rstest;

    const IPA_RAW: &str = "\
----------------
2 ranges matched
----------------
  dn: cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com
  cn: EXAMPLE.COM_id_range
  ipabaseid: 1536000000
  ipaidrangesize: 200000
  ipabaserid: 1000
  ipasecondarybaserid: 100000000
  iparangetype: ipa-local
  objectclass: top
  objectclass: ipaIDrange
  objectclass: ipaDomainIDRange

  dn: cn=AD.EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com
  cn: AD.EXAMPLE.COM_id_range
  ipabaseid: 1000000000
  ipaidrangesize: 200000
  ipabaserid: 0
  ipanttrusteddomainsid: S-1-5-21-1-2-3
  iparangetype: ipa-ad-trust
----------------------------
Number of entries returned 2
----------------------------
";

    #[test]
    fn reads_ipa_raw_output() {
        let ranges = parse_ranges(IPA_RAW).unwrap();
        assert_eq!(ranges.len(), 2);

        let local = &ranges[0];
        assert_eq!(local.name, "EXAMPLE.COM_id_range");
        assert_eq!(local.kind, RangeKind::Local);
        assert_eq!(local.first_id(), 1_536_000_000);
        assert_eq!(local.last_id(), 1_536_199_999);
        assert_eq!(local.base_rid, Some(1000));
        assert_eq!(local.secondary_base_rid, Some(100_000_000));
        assert_eq!(
            local.origin.as_ref().unwrap().as_str(),
            "cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com"
        );

        let trust = &ranges[1];
        assert_eq!(trust.kind, RangeKind::TrustAd);
        assert_eq!(trust.base_rid, Some(0));
        assert_eq!(trust.secondary_base_rid, None);
    }

    #[test]
    fn reads_ldif_with_base64_and_mixed_case() {
        // "legacy range" in base64
        let input = "\
dn: cn=ranges,cn=etc,dc=example,dc=com
objectClass: nsContainer
cn: ranges

dn: cn=legacy,cn=ranges,cn=etc,dc=example,dc=com
cn:: bGVnYWN5IHJhbmdl
ipaBaseID: 300000
IPAIDRANGESIZE: 100000
ipaRangeType: ipa-local
";
        let ranges = parse_ranges(input).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].name, "legacy range");
        assert_eq!(ranges[0].size(), 100_000);
        assert!(ranges[0].is_missing_rid_bases());
    }

    #[test]
    fn unknown_range_types_are_preserved() {
        let input = "\
dn: cn=odd,cn=ranges,cn=etc,dc=example,dc=com
cn: odd
ipaBaseID: 5000
ipaIDRangeSize: 10
ipaRangeType: ipa-something-new
";
        let ranges = parse_ranges(input).unwrap();
        assert_eq!(ranges[0].kind, RangeKind::Other("ipa-something-new".to_string()));
    }

    #[rstest]
    #[case::missing_size(
        "dn: cn=a,dc=x\ncn: a\nipaBaseID: 1\nipaRangeType: ipa-local\n",
        1
    )]
    #[case::bad_number(
        "dn: cn=a,dc=x\ncn: a\nipaBaseID: lots\nipaIDRangeSize: 5\nipaRangeType: ipa-local\n",
        3
    )]
    #[case::zero_size(
        "dn: cn=a,dc=x\ncn: a\nipaBaseID: 1\nipaIDRangeSize: 0\nipaRangeType: ipa-local\n",
        1
    )]
    #[case::bad_base64("dn: cn=a,dc=x\ncn:: ***\n", 2)]
    #[case::url_value("dn: cn=a,dc=x\ncn:< file:///etc/passwd\n", 2)]
    fn malformed_ranges_name_the_line(#[case] input: &str, #[case] line: usize) {
        let err = parse_ranges(input).unwrap_err();
        assert_eq!(err.line(), line, "{err}");
    }

    #[test]
    fn range_past_u64_is_malformed() {
        let input = "\
dn: cn=huge,cn=ranges,cn=etc,dc=example,dc=com
cn: huge
ipaBaseID: 18446744073709551615
ipaIDRangeSize: 2
ipaRangeType: ipa-local

dn: cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com
cn: EXAMPLE.COM_id_range
ipaBaseID: 1000
ipaIDRangeSize: 200000
ipaRangeType: ipa-local
";
        let err = parse_ranges(input).unwrap_err();
        assert_eq!(err.line(), 1);
        assert!(matches!(
            err,
            FormatError::InvalidRange {
                source: EngineError::RangeOutOfBounds { .. },
                ..
            }
        ));
    }

    #[test]
    fn folded_ldif_lines_are_joined() {
        let input = "\
version: 1

dn: cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=ipa,dc=corp,dc=example,dc=co
 m
cn: EXAMPLE.COM_id_range
ipaBaseID: 1000
ipaIDRangeSize: 200000
ipaBaseRID: 10
 00
ipaRangeType: ipa-local

dn:: Y249bGVnYWN5LGNuPXJhbmdlcyxjbj1ldGMsZGM9ZXhh
 bXBsZSxkYz1jb20=
cn: legacy
ipaBaseID: 300000
ipaIDRangeSize: 100000
ipaRangeType: ipa-local
";
        let ranges = parse_ranges(input).unwrap();
        assert_eq!(ranges.len(), 2);

        let dn = ranges[0].origin.as_ref().unwrap().as_str();
        assert_eq!(
            dn,
            "cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=ipa,dc=corp,dc=example,dc=com"
        );
        assert_eq!(suffix_of(dn), Some("dc=ipa,dc=corp,dc=example,dc=com"));
        assert_eq!(ranges[0].base_rid, Some(1000));

        assert_eq!(
            ranges[1].origin.as_ref().unwrap().as_str(),
            "cn=legacy,cn=ranges,cn=etc,dc=example,dc=com"
        );
    }

    #[test]
    fn indented_ipa_output_is_not_unfolded() {
        let ranges = parse_ranges(IPA_RAW).unwrap();
        assert_eq!(ranges[0].name, "EXAMPLE.COM_id_range");
        assert_eq!(ranges[0].size(), 200_000);
    }

    #[test]
    fn reads_users_and_groups() {
        let input = "\
dn: uid=jdoe,cn=users,cn=accounts,dc=example,dc=com
uidNumber: 500000
gidNumber: 1536000001

dn: cn=wheel2,cn=groups,cn=accounts,dc=example,dc=com
gidNumber: 900000
";
        let identities = parse_identities(input).unwrap();
        assert_eq!(identities.len(), 2);

        assert_eq!(identities[0].kind(), IdentityKind::User);
        assert_eq!(identities[0].label(), "jdoe");
        assert_eq!(identities[0].identifier(), 500_000);

        assert_eq!(identities[1].kind(), IdentityKind::Group);
        assert_eq!(identities[1].label(), "wheel2");
        assert_eq!(identities[1].identifier(), 900_000);
        assert_eq!(
            identities[1].origin().unwrap().as_str(),
            "cn=wheel2,cn=groups,cn=accounts,dc=example,dc=com"
        );
    }

    #[test]
    fn identity_without_number_is_malformed() {
        let input = "dn: uid=jdoe,cn=users,cn=accounts,dc=example,dc=com\ngidNumber: 5\n";
        assert!(matches!(
            parse_identities(input),
            Err(FormatError::MissingAttribute {
                attribute: "uidNumber",
                ..
            })
        ));
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(parse_ranges("").unwrap().is_empty());
        assert!(parse_identities("no colons here\n").unwrap().is_empty());
    }

    #[rstest]
    #[case("cn=r,cn=ranges,cn=etc,dc=example,dc=com", Some("dc=example,dc=com"))]
    #[case("uid=a, DC=Example, DC=org", Some("DC=Example, DC=org"))]
    #[case("cn=ranges,cn=etc", None)]
    #[case("cn=dcname,dc=x", Some("dc=x"))]
    fn suffix_is_the_dc_tail(#[case] dn: &str, #[case] expected: Option<&str>) {
        assert_eq!(suffix_of(dn), expected);
    }
}
