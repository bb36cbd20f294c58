//! # idrange-ldif
//!
//! Text formats around the allocation engine.
//!
//! ## Input
//!
//! Range dumps (`ipa idrange-find --all --raw` or `ldapsearch` LDIF of the
//! ranges container) and identity dumps (LDIF of out-of-range users and
//! groups). Malformed records are errors carrying their line number.
//!
//! ## Output
//!
//! The searches that produce identity dumps, LDIF change records for new
//! ranges and RID bases, and the equivalent `ipa` commands.

mod error;
mod reader;
mod render;

pub use error::FormatError;
pub use reader::{parse_identities, parse_ranges, parse_records, suffix_of, Record};
pub use render::{
    idrange_add_command, ldapsearch_command, outofrange_filter, range_add_record, range_dn,
    rid_bases_modify, ChangeRecord, DIRECTORY_MANAGER, OUTOFRANGE_FILE,
};
