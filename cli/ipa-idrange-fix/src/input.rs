//! Loading range and identity dumps.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, Result};
use idrange_engine::{IdRange, Identity};
use idrange_ldif::{parse_identities, parse_ranges, suffix_of};
use tracing::info;

use crate::error::CliError;

/// Where the range dump came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSource {
    File,
    Stdin,
}

/// Parsed inputs for one run.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub ranges: Vec<IdRange>,
    /// `None` when no identity dump was given.
    pub identities: Option<Vec<Identity>>,
    pub suffix: Option<String>,
    pub range_source: RangeSource,
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn read_stdin() -> Result<Option<String>> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut data = String::new();
    stdin
        .read_to_string(&mut data)
        .context("Failed to read from stdin")?;
    Ok(Some(data))
}

/// Suffix given on the command line, else the one in the first range DN.
fn resolve_suffix(explicit: Option<&str>, ranges: &[IdRange]) -> Option<String> {
    explicit.map(str::to_string).or_else(|| {
        ranges
            .iter()
            .filter_map(|range| range.origin.as_ref())
            .find_map(|origin| suffix_of(origin.as_str()))
            .map(str::to_string)
    })
}

/// Reads ranges from `ranges` or stdin, and identities from `outofrange`.
pub fn load(ranges: Option<&Path>, outofrange: Option<&Path>, suffix: Option<&str>) -> Result<Inputs> {
    let (text, source_name, range_source) = match ranges {
        Some(path) => (read_file(path)?, path.display().to_string(), RangeSource::File),
        None => match read_stdin()? {
            Some(text) => (text, "stdin".to_string(), RangeSource::Stdin),
            None => return Err(CliError::NoRangeInput.into()),
        },
    };
    let ranges = parse_ranges(&text).map_err(|e| CliError::format(source_name, e))?;
    info!(count = ranges.len(), "ID ranges read");

    let identities = match outofrange {
        Some(path) => {
            let text = read_file(path)?;
            let identities = parse_identities(&text)
                .map_err(|e| CliError::format(path.display().to_string(), e))?;
            info!(count = identities.len(), "out of range identities read");
            Some(identities)
        }
        None => None,
    };

    let suffix = resolve_suffix(suffix, &ranges);
    Ok(Inputs {
        ranges,
        identities,
        suffix,
        range_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RANGES: &str = "\
dn: cn=EXAMPLE.COM_id_range,cn=ranges,cn=etc,dc=example,dc=com
cn: EXAMPLE.COM_id_range
ipaBaseID: 1000
ipaIDRangeSize: 200000
ipaBaseRID: 1000
ipaSecondaryBaseRID: 100000000
ipaRangeType: ipa-local
";

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_files_and_derives_suffix() {
        let ranges = write_temp(RANGES);
        let identities = write_temp("dn: uid=a,cn=users,cn=accounts,dc=example,dc=com\nuidNumber: 500000\n");

        let inputs = load(Some(ranges.path()), Some(identities.path()), None).unwrap();
        assert_eq!(inputs.ranges.len(), 1);
        assert_eq!(inputs.identities.as_ref().map(Vec::len), Some(1));
        assert_eq!(inputs.suffix.as_deref(), Some("dc=example,dc=com"));
        assert_eq!(inputs.range_source, RangeSource::File);
    }

    #[test]
    fn explicit_suffix_wins() {
        let ranges = write_temp(RANGES);
        let inputs = load(Some(ranges.path()), None, Some("dc=other")).unwrap();
        assert!(inputs.identities.is_none());
        assert_eq!(inputs.suffix.as_deref(), Some("dc=other"));
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let ranges = write_temp("dn: cn=a,dc=x\ncn: a\nipaBaseID: nope\nipaIDRangeSize: 1\nipaRangeType: ipa-local\n");
        let err = load(Some(ranges.path()), None, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Format { .. })
        ));
    }
}
