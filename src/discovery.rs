//! Observed-but-unconnected peripherals.

use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use crate::central::PeripheralId;

/// Byte range of the advert's manufacturer data holding the company identifier.
const COMPANY_RANGE: std::ops::Range<usize> = 0..2;
/// Byte range of the advert's manufacturer data holding the serial number.
const SERIAL_RANGE: std::ops::Range<usize> = 2..8;

/// A peripheral seen during scanning but not yet connected to.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The advertised local name, empty when the advert carried none.
    pub name: String,
    /// The serial number extracted from the vendor-specific advert bytes.
    pub serial: String,
    /// The platform handle backing this discovery.
    pub peripheral: PeripheralId,
}

impl Discovery {
    /// Validates an advert and builds a discovery from it.
    ///
    /// Rejects the advert when the manufacturer data is absent, shorter than
    /// eight bytes, or carries the wrong company identifier.
    pub fn from_advert(
        peripheral: PeripheralId,
        local_name: Option<&str>,
        manufacturer_data: Option<&[u8]>,
        company_identifier: [u8; 2],
    ) -> Option<Self> {
        let data = manufacturer_data?;
        if data.len() < SERIAL_RANGE.end || data[COMPANY_RANGE] != company_identifier {
            return None;
        }
        Some(Self {
            name: local_name.unwrap_or_default().to_owned(),
            serial: hex_string(&data[SERIAL_RANGE]),
            peripheral,
        })
    }
}

// Two discoveries are the same discovery when their peripheral handles match,
// regardless of what the advert said.
impl PartialEq for Discovery {
    fn eq(&self, other: &Self) -> bool {
        self.peripheral == other.peripheral
    }
}

impl Eq for Discovery {}

impl Hash for Discovery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peripheral.hash(state);
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANY: [u8; 2] = [0x4C, 0x52];

    fn advert() -> Vec<u8> {
        vec![0x4C, 0x52, 0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]
    }

    #[test]
    fn builds_from_valid_advert() {
        let discovery = Discovery::from_advert(
            PeripheralId::random(),
            Some("Front Door"),
            Some(&advert()),
            COMPANY,
        )
        .unwrap();
        assert_eq!(discovery.name, "Front Door");
        assert_eq!(discovery.serial, "deadbeef0001");
    }

    #[test]
    fn rejects_wrong_company_identifier() {
        let discovery = Discovery::from_advert(
            PeripheralId::random(),
            None,
            Some(&advert()),
            [0x00, 0x00],
        );
        assert!(discovery.is_none());
    }

    #[test]
    fn rejects_short_manufacturer_data() {
        let discovery =
            Discovery::from_advert(PeripheralId::random(), None, Some(&[0x4C, 0x52, 0x01]), COMPANY);
        assert!(discovery.is_none());
    }

    #[test]
    fn rejects_missing_manufacturer_data() {
        assert!(Discovery::from_advert(PeripheralId::random(), None, None, COMPANY).is_none());
    }

    #[test]
    fn identity_is_the_peripheral_handle() {
        let id = PeripheralId::random();
        let a = Discovery::from_advert(id, Some("a"), Some(&advert()), COMPANY).unwrap();
        let mut other = advert();
        other[7] = 0xFF;
        let b = Discovery::from_advert(id, Some("b"), Some(&other), COMPANY).unwrap();
        assert_eq!(a, b);
    }
}
