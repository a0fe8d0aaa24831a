//! Recipient argument normalisation.
//!
//! Callers hand recipients over as nothing, a single address, or a list of
//! addresses. Everything downstream works on a plain list, so the shape is
//! collapsed here and nowhere else. Addresses are never deduplicated, and
//! the only check applied is [`check_address`], which keeps them from
//! breaking out of an envelope command or a header line.

use std::fmt;

use serde::{
    Deserialize, Deserializer,
    de::{self, SeqAccess, Visitor},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecipientError {
    /// The raw value was neither absent, a single address nor a list of
    /// addresses. Carries the deserializer's description of what was found.
    #[error("Only accept a single address or a list of addresses as parameter, given: {0}")]
    UnsupportedType(String),

    /// The address holds a line break or an angle bracket.
    #[error("Invalid address {0:?}")]
    InvalidAddress(String),
}

/// A recipient argument in any of the shapes a caller may use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Recipients {
    #[default]
    Absent,
    Single(String),
    List(Vec<String>),
}

impl Recipients {
    /// Collapse into a list.
    ///
    /// An absent value and an empty single address both become the empty
    /// list. Lists are returned as given, order and duplicates preserved.
    #[must_use]
    pub fn normalize(self) -> Vec<String> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(address) if address.is_empty() => Vec::new(),
            Self::Single(address) => vec![address],
            Self::List(addresses) => addresses,
        }
    }

    /// `true` when normalisation would produce the empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Single(address) => address.is_empty(),
            Self::List(addresses) => addresses.is_empty(),
        }
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Self::Single(address.to_string())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Self::Single(address)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Self::List(addresses)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(addresses: Vec<&str>) -> Self {
        Self::List(addresses.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for Recipients {
    fn from(addresses: &[String]) -> Self {
        Self::List(addresses.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for Recipients {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

struct RecipientsVisitor;

impl<'de> Visitor<'de> for RecipientsVisitor {
    type Value = Recipients;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a single address or a list of addresses")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(Recipients::Single(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(Recipients::Single(value))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Recipients::Absent)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Recipients::Absent)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut addresses = Vec::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(address) = seq.next_element::<String>()? {
            addresses.push(address);
        }

        Ok(Recipients::List(addresses))
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RecipientsVisitor)
    }
}

/// Normalise an untyped recipient value straight from a deserializer.
///
/// # Errors
///
/// [`RecipientError::UnsupportedType`] when the value is a number, boolean,
/// map, or a list holding anything other than strings.
pub fn normalize_value<'de, D: Deserializer<'de>>(raw: D) -> Result<Vec<String>, RecipientError> {
    Recipients::deserialize(raw)
        .map(Recipients::normalize)
        .map_err(|err| RecipientError::UnsupportedType(err.to_string()))
}

/// Reject an address that could not be carried inside `<...>` on a single
/// protocol line.
///
/// # Errors
///
/// [`RecipientError::InvalidAddress`] when `address` contains CR, LF, `<`
/// or `>`.
pub fn check_address(address: &str) -> Result<(), RecipientError> {
    if address.contains(['\r', '\n', '<', '>']) {
        return Err(RecipientError::InvalidAddress(address.to_string()));
    }

    Ok(())
}
