use crate::{
    Result,
    constants::UNIT_NAME_LEN,
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum tag UID length in bytes (ISO 14443 single-size UID).
pub const MIN_TAG_LEN: usize = 4;

/// Maximum tag UID length in bytes (ISO 14443 triple-size UID).
pub const MAX_TAG_LEN: usize = 10;

/// Logical container unit identifier (one byte on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(u8);

impl UnitId {
    /// Create a unit id. Every byte value is a valid address.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        UnitId(id)
    }

    /// Get the raw unit id as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl From<u8> for UnitId {
    fn from(id: u8) -> Self {
        UnitId(id)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name of a unit (ASCII, at most 16 bytes).
///
/// On the wire the name is always exactly 16 bytes, right-padded with NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitName(String);

impl UnitName {
    /// Create a unit name with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUnitName` if the name is longer than 16 bytes,
    /// contains non-ASCII characters, or contains a NUL byte.
    pub fn new(name: &str) -> Result<Self> {
        if !name.is_ascii() {
            return Err(Error::InvalidUnitName(format!("{name:?} is not ASCII")));
        }
        if name.len() > UNIT_NAME_LEN {
            return Err(Error::InvalidUnitName(format!(
                "{name:?} is {} bytes, maximum is {UNIT_NAME_LEN}",
                name.len()
            )));
        }
        if name.contains('\0') {
            return Err(Error::InvalidUnitName(format!("{name:?} contains NUL")));
        }
        Ok(UnitName(name.to_string()))
    }

    /// Decode a name from its 16-byte wire field, dropping the NUL padding.
    ///
    /// # Errors
    /// Returns `Error::InvalidUnitName` if the field has the wrong length or
    /// the unpadded content is not a valid name.
    pub fn from_padded(field: &[u8]) -> Result<Self> {
        if field.len() != UNIT_NAME_LEN {
            return Err(Error::InvalidUnitName(format!(
                "name field is {} bytes, expected {UNIT_NAME_LEN}",
                field.len()
            )));
        }
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if field[end..].iter().any(|&b| b != 0) {
            return Err(Error::InvalidUnitName(
                "data after NUL padding".to_string(),
            ));
        }
        let text = std::str::from_utf8(&field[..end])
            .map_err(|_| Error::InvalidUnitName("name field is not ASCII".to_string()))?;
        UnitName::new(text)
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as its fixed-width wire field.
    #[must_use]
    pub fn padded(&self) -> [u8; UNIT_NAME_LEN] {
        let mut field = [0u8; UNIT_NAME_LEN];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }
}

impl TryFrom<String> for UnitName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        UnitName::new(&value)
    }
}

impl From<UnitName> for String {
    fn from(name: UnitName) -> Self {
        name.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to register one unit, as delivered by `initUnits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Logical unit id, also the address byte on the link.
    pub id: UnitId,

    /// Display name programmed into the unit.
    pub name: UnitName,

    /// Declared weight capacity.
    pub weight: u8,

    /// Serial path of the link hosting this unit.
    #[serde(alias = "serialPath")]
    pub serial_path: String,
}

/// One `(container, target amount)` pair of a put-in or take-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Container the items go into or come out of.
    pub container_id: UnitId,

    /// Number of items to move.
    pub amount: u8,
}

impl OrderLine {
    /// Create an order line.
    #[must_use]
    pub fn new(container_id: impl Into<UnitId>, amount: u8) -> Self {
        Self {
            container_id: container_id.into(),
            amount,
        }
    }
}

/// RFID credential identifier (tag UID).
///
/// Rendered as upper-case hex, which is also its serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId(Vec<u8>);

impl TagId {
    /// Create a tag id from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidTag` if the UID is not 4-10 bytes long.
    pub fn new(uid: Vec<u8>) -> Result<Self> {
        if !(MIN_TAG_LEN..=MAX_TAG_LEN).contains(&uid.len()) {
            return Err(Error::InvalidTag(format!(
                "UID must be {MIN_TAG_LEN}-{MAX_TAG_LEN} bytes, got {}",
                uid.len()
            )));
        }
        Ok(TagId(uid))
    }

    /// Parse a tag id from a hex string such as `699F0464`.
    ///
    /// # Errors
    /// Returns `Error::InvalidTag` for odd-length or non-hex input, or a UID
    /// of invalid length.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(Error::InvalidTag(format!("{hex:?} has odd length")));
        }
        let uid = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| Error::InvalidTag(format!("{hex:?} is not hex")))
            })
            .collect::<Result<Vec<u8>>>()?;
        TagId::new(uid)
    }

    /// Get the raw UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the UID as an upper-case hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl TryFrom<String> for TagId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TagId::from_hex(&value)
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.to_hex()
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagId::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Cameras shelf")]
    #[case("")]
    #[case("sixteen-chars-ok")]
    fn test_unit_name_valid(#[case] name: &str) {
        let unit_name = UnitName::new(name).unwrap();
        assert_eq!(unit_name.as_str(), name);
    }

    #[rstest]
    #[case("seventeen-chars!!")]
    #[case("Półka")]
    #[case("a\0b")]
    fn test_unit_name_invalid(#[case] name: &str) {
        assert!(matches!(
            UnitName::new(name),
            Err(Error::InvalidUnitName(_))
        ));
    }

    #[test]
    fn test_unit_name_padding() {
        let name = UnitName::new("Relays").unwrap();
        let field = name.padded();
        assert_eq!(&field[..6], b"Relays");
        assert!(field[6..].iter().all(|&b| b == 0));
        assert_eq!(UnitName::from_padded(&field).unwrap(), name);
    }

    #[test]
    fn test_unit_name_from_padded_rejects_garbage_after_nul() {
        let mut field = [0u8; UNIT_NAME_LEN];
        field[0] = b'A';
        field[5] = b'B';
        assert!(UnitName::from_padded(&field).is_err());
        assert!(UnitName::from_padded(&field[..15]).is_err());
    }

    #[test]
    fn test_tag_hex_roundtrip() {
        let tag = TagId::from_hex("699f0464").unwrap();
        assert_eq!(tag.as_bytes(), &[0x69, 0x9F, 0x04, 0x64]);
        assert_eq!(tag.to_string(), "699F0464");
    }

    #[rstest]
    #[case("ABC")]
    #[case("ZZ9F0464")]
    #[case("0102")]
    #[case("0102030405060708090A0B")]
    fn test_tag_invalid(#[case] hex: &str) {
        assert!(matches!(TagId::from_hex(hex), Err(Error::InvalidTag(_))));
    }

    #[test]
    fn test_unit_spec_accepts_control_plane_field_names() {
        let json = r#"{"id":3,"name":"Cameras shelf","weight":100,"errorMargin":10,"serialPath":"/dev/ttyACM0"}"#;
        let spec: UnitSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.id, UnitId::new(3));
        assert_eq!(spec.name.as_str(), "Cameras shelf");
        assert_eq!(spec.serial_path, "/dev/ttyACM0");
    }

    #[test]
    fn test_unit_spec_rejects_long_name() {
        let json = r#"{"id":3,"name":"A name that is far too long","weight":1,"serial_path":"COM7"}"#;
        assert!(serde_json::from_str::<UnitSpec>(json).is_err());
    }

    #[test]
    fn test_order_line_serialization() {
        let line = OrderLine::new(7, 3);
        let json = serde_json::to_string(&line).unwrap();
        assert_eq!(json, r#"{"container_id":7,"amount":3}"#);
    }
}
