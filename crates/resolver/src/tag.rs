//! Fixed-width provenance tag stored in the solver's per-item slot
//!
//! Layout, most significant bits first:
//!
//! | bits  | meaning                                 |
//! |-------|-----------------------------------------|
//! | 31-24 | field table version                     |
//! | 23-20 | discriminant: 1 channel, 2 URL-derived  |
//! | 19-0  | stub bitmask over the field table       |
//!
//! The all-zero value is never produced by [`encode`], so an empty slot can
//! not be mistaken for a valid tag.

use serde::{Deserialize, Serialize};
use sprig_types::{FieldSet, Provenance, FIELD_TABLE_VERSION};
use std::fmt;
use thiserror::Error;

const VERSION_SHIFT: u32 = 24;
const DISCRIMINANT_SHIFT: u32 = 20;
const DISCRIMINANT_MASK: u32 = 0xF;
const FIELD_MASK: u32 = (1 << DISCRIMINANT_SHIFT) - 1;

const CHANNEL_AUTHORITATIVE: u32 = 1;
const URL_DERIVED: u32 = 2;

/// Encoded provenance as stored by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverTag(u32);

impl SolverTag {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SolverTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Why a tag could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagDecodeError {
    #[error("empty tag slot")]
    Empty,

    #[error("unknown field table version {0}")]
    UnknownVersion(u8),

    #[error("unknown provenance discriminant {0}")]
    UnknownDiscriminant(u32),

    #[error("channel-authoritative tag carries stub bits {0:#07x}")]
    ChannelWithStubs(u32),

    #[error("stub mask has bits outside the field table: {0:#07x}")]
    UnknownFieldBits(u32),
}

/// Encode provenance into a tag
#[must_use]
pub fn encode(provenance: Provenance) -> SolverTag {
    let (discriminant, mask) = match provenance {
        Provenance::ChannelAuthoritative => (CHANNEL_AUTHORITATIVE, 0),
        Provenance::UrlDerived { stub_fields } => (URL_DERIVED, stub_fields.bits() & FIELD_MASK),
    };
    SolverTag(
        (u32::from(FIELD_TABLE_VERSION) << VERSION_SHIFT)
            | (discriminant << DISCRIMINANT_SHIFT)
            | mask,
    )
}

/// Decode a tag back into provenance
///
/// # Errors
///
/// Returns a [`TagDecodeError`] for any bit pattern [`encode`] cannot
/// produce.
pub fn decode(tag: SolverTag) -> Result<Provenance, TagDecodeError> {
    let raw = tag.raw();
    if raw == 0 {
        return Err(TagDecodeError::Empty);
    }

    let version = raw.to_be_bytes()[0];
    if version != FIELD_TABLE_VERSION {
        return Err(TagDecodeError::UnknownVersion(version));
    }

    let mask = raw & FIELD_MASK;
    match (raw >> DISCRIMINANT_SHIFT) & DISCRIMINANT_MASK {
        CHANNEL_AUTHORITATIVE if mask == 0 => Ok(Provenance::ChannelAuthoritative),
        CHANNEL_AUTHORITATIVE => Err(TagDecodeError::ChannelWithStubs(mask)),
        URL_DERIVED => FieldSet::from_bits(mask)
            .map(|stub_fields| Provenance::UrlDerived { stub_fields })
            .ok_or(TagDecodeError::UnknownFieldBits(
                mask & !FieldSet::all().bits(),
            )),
        other => Err(TagDecodeError::UnknownDiscriminant(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sprig_types::SourceKind;

    #[test]
    fn channel_tag_layout() {
        let tag = encode(Provenance::ChannelAuthoritative);
        assert_eq!(tag.raw(), 0x0110_0000);
        assert_eq!(decode(tag), Ok(Provenance::ChannelAuthoritative));
    }

    #[test]
    fn url_derived_license_and_timestamp_round_trip() {
        let provenance = Provenance::UrlDerived {
            stub_fields: FieldSet::LICENSE | FieldSet::TIMESTAMP,
        };
        let tag = encode(provenance);
        assert_eq!(tag.raw(), 0x0120_000A);
        assert_eq!(decode(tag), Ok(provenance));
    }

    #[test]
    fn every_source_row_round_trips() {
        for source in [
            SourceKind::CondaArchive,
            SourceKind::Wheel,
            SourceKind::SourceControl,
            SourceKind::CondaLock,
            SourceKind::HealedCacheRecord,
        ] {
            let provenance = Provenance::url_derived(source);
            assert_eq!(decode(encode(provenance)), Ok(provenance), "{source}");
        }
    }

    #[test]
    fn rejects_patterns_encode_never_produces() {
        assert_eq!(decode(SolverTag::from_raw(0)), Err(TagDecodeError::Empty));
        assert_eq!(
            decode(SolverTag::from_raw(0x0210_0000)),
            Err(TagDecodeError::UnknownVersion(2))
        );
        assert_eq!(
            decode(SolverTag::from_raw(0x0130_0000)),
            Err(TagDecodeError::UnknownDiscriminant(3))
        );
        assert_eq!(
            decode(SolverTag::from_raw(0x0100_0000)),
            Err(TagDecodeError::UnknownDiscriminant(0))
        );
        assert_eq!(
            decode(SolverTag::from_raw(0x0110_0002)),
            Err(TagDecodeError::ChannelWithStubs(2))
        );
        assert_eq!(
            decode(SolverTag::from_raw(0x0128_0001)),
            Err(TagDecodeError::UnknownFieldBits(0x8_0000))
        );
    }

    proptest! {
        #[test]
        fn any_stub_set_round_trips(bits in 0u32..(1 << 15)) {
            let stub_fields = FieldSet::from_bits_truncate(bits);
            let provenance = Provenance::UrlDerived { stub_fields };
            prop_assert_eq!(decode(encode(provenance)), Ok(provenance));
        }

        #[test]
        fn no_raw_value_decodes_to_something_else(raw in any::<u32>()) {
            if let Ok(provenance) = decode(SolverTag::from_raw(raw)) {
                prop_assert_eq!(encode(provenance).raw(), raw);
            }
        }
    }
}
