//! USB serial device discovery.
//!
//! [`UsbPortLocator`] enumerates serial ports once per call and picks the
//! first one whose USB vendor/product pair matches.  The matching itself is
//! [`select_matching`], a pure function over [`PortCandidate`]s.

use std::path::PathBuf;

use lcd_core::UsbId;
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, warn};

use crate::application::device::DeviceLocator;

/// One enumerated serial port.  `usb` is `None` for non-USB ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub path: PathBuf,
    pub usb: Option<UsbId>,
}

impl From<SerialPortInfo> for PortCandidate {
    fn from(info: SerialPortInfo) -> Self {
        let usb = match info.port_type {
            SerialPortType::UsbPort(usb) => Some(UsbId::new(usb.vid, usb.pid)),
            _ => None,
        };
        Self {
            path: PathBuf::from(info.port_name),
            usb,
        }
    }
}

/// First candidate whose USB id equals `wanted`, in enumeration order.
pub fn select_matching(
    candidates: impl IntoIterator<Item = PortCandidate>,
    wanted: UsbId,
) -> Option<PathBuf> {
    candidates.into_iter().find_map(|candidate| {
        let Some(id) = candidate.usb else {
            return None;
        };
        debug!("found {} ({id})", candidate.path.display());
        (id == wanted).then_some(candidate.path)
    })
}

/// Production [`DeviceLocator`] over `serialport::available_ports`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbPortLocator;

impl DeviceLocator for UsbPortLocator {
    fn locate(&self, device: UsbId) -> Option<PathBuf> {
        match serialport::available_ports() {
            Ok(ports) => select_matching(ports.into_iter().map(PortCandidate::from), device),
            Err(e) => {
                warn!("serial port enumeration failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    const UNO: UsbId = UsbId::new(0x2341, 0x0043);

    fn usb(path: &str, vid: u16, pid: u16) -> PortCandidate {
        PortCandidate {
            path: PathBuf::from(path),
            usb: Some(UsbId::new(vid, pid)),
        }
    }

    #[test]
    fn test_select_matching_skips_non_matching_devices() {
        // Arrange: two unrelated adapters enumerated before the display
        let candidates = vec![
            usb("/dev/ttyUSB0", 0x0403, 0x6001),
            usb("/dev/ttyUSB1", 0x1a86, 0x7523),
            usb("/dev/ttyACM0", 0x2341, 0x0043),
        ];

        // Act
        let found = select_matching(candidates, UNO);

        // Assert
        assert_eq!(found, Some(PathBuf::from("/dev/ttyACM0")));
    }

    #[test]
    fn test_select_matching_none_when_only_non_matching() {
        let candidates = vec![
            usb("/dev/ttyUSB0", 0x0403, 0x6001),
            usb("/dev/ttyUSB1", 0x2341, 0x0001),
        ];
        assert_eq!(select_matching(candidates, UNO), None);
    }

    #[test]
    fn test_select_matching_ignores_non_usb_ports() {
        let candidates = vec![
            PortCandidate {
                path: PathBuf::from("/dev/ttyS0"),
                usb: None,
            },
            usb("/dev/ttyACM1", 0x2341, 0x0043),
        ];
        assert_eq!(
            select_matching(candidates, UNO),
            Some(PathBuf::from("/dev/ttyACM1"))
        );
    }

    #[test]
    fn test_select_matching_returns_first_of_two_matches() {
        let candidates = vec![
            usb("/dev/ttyACM0", 0x2341, 0x0043),
            usb("/dev/ttyACM1", 0x2341, 0x0043),
        ];
        assert_eq!(
            select_matching(candidates, UNO),
            Some(PathBuf::from("/dev/ttyACM0"))
        );
    }

    #[test]
    fn test_candidate_from_usb_port_info() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2341,
                pid: 0x0043,
                serial_number: None,
                manufacturer: Some("Arduino".to_string()),
                product: None,
            }),
        };

        let candidate = PortCandidate::from(info);

        assert_eq!(candidate.usb, Some(UNO));
    }

    #[test]
    fn test_candidate_from_builtin_port_has_no_usb_id() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };
        assert_eq!(PortCandidate::from(info).usb, None);
    }
}
