//! The fixed result vocabulary of the management protocol.
//!
//! Every power or boot operation resolves to one [`CompletionCode`]. Boot
//! devices are carried on the wire as a selector in bits 2..5 of the second
//! boot flags byte; [`BootDevice`] maps between those selectors and the names
//! operators type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// IPMI completion codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompletionCode {
    /// Command completed normally.
    Success = 0x00,
    /// Payload already active, or already deactivated (payload commands).
    PayloadStateConflict = 0x80,
    /// Payload type disabled (payload commands).
    PayloadDisabled = 0x81,
    /// Node busy.
    NodeBusy = 0xC0,
    /// Invalid command.
    InvalidCommand = 0xC1,
    /// Command invalid for given LUN.
    InvalidCommandForLun = 0xC2,
    /// Timeout while processing command.
    Timeout = 0xC3,
    /// Out of space.
    OutOfSpace = 0xC4,
    /// Reservation canceled or invalid reservation ID.
    ReservationCanceledOrInvalid = 0xC5,
    /// Request data truncated.
    RequestDataTruncated = 0xC6,
    /// Request data length invalid.
    RequestDataLengthInvalid = 0xC7,
    /// Request data field length limit exceeded.
    RequestDataFieldLengthLimitExceeded = 0xC8,
    /// Parameter out of range.
    ParameterOutOfRange = 0xC9,
    /// Cannot return number of requested data bytes.
    CannotReturnNumberOfRequestedDataBytes = 0xCA,
    /// Requested sensor, data, or record not present.
    RequestedSensorDataOrRecordNotPresent = 0xCB,
    /// Invalid data field in request.
    InvalidDataFieldInRequest = 0xCC,
    /// Command illegal for specified sensor or record type.
    CommandIllegalForSensorOrRecordType = 0xCD,
    /// Command response could not be provided.
    CommandResponseCouldNotBeProvided = 0xCE,
    /// Cannot execute duplicated request.
    CannotExecuteDuplicatedRequest = 0xCF,
    /// SDR repository in update mode.
    SdrRepositoryInUpdateMode = 0xD0,
    /// Device in firmware update mode.
    DeviceInFirmwareUpdateMode = 0xD1,
    /// BMC initialization in progress.
    BmcInitializationInProgress = 0xD2,
    /// Destination unavailable.
    DestinationUnavailable = 0xD3,
    /// Insufficient privilege level.
    InsufficientPrivilegeLevel = 0xD4,
    /// Command not supported in present state.
    CommandNotSupportedInPresentState = 0xD5,
    /// Command sub-function disabled or unavailable.
    CommandSubFunctionDisabledOrUnavailable = 0xD6,
    /// Unspecified error.
    UnspecifiedError = 0xFF,
}

impl CompletionCode {
    /// Every defined code, in wire order.
    pub const ALL: [Self; 27] = [
        Self::Success,
        Self::PayloadStateConflict,
        Self::PayloadDisabled,
        Self::NodeBusy,
        Self::InvalidCommand,
        Self::InvalidCommandForLun,
        Self::Timeout,
        Self::OutOfSpace,
        Self::ReservationCanceledOrInvalid,
        Self::RequestDataTruncated,
        Self::RequestDataLengthInvalid,
        Self::RequestDataFieldLengthLimitExceeded,
        Self::ParameterOutOfRange,
        Self::CannotReturnNumberOfRequestedDataBytes,
        Self::RequestedSensorDataOrRecordNotPresent,
        Self::InvalidDataFieldInRequest,
        Self::CommandIllegalForSensorOrRecordType,
        Self::CommandResponseCouldNotBeProvided,
        Self::CannotExecuteDuplicatedRequest,
        Self::SdrRepositoryInUpdateMode,
        Self::DeviceInFirmwareUpdateMode,
        Self::BmcInitializationInProgress,
        Self::DestinationUnavailable,
        Self::InsufficientPrivilegeLevel,
        Self::CommandNotSupportedInPresentState,
        Self::CommandSubFunctionDisabledOrUnavailable,
        Self::UnspecifiedError,
    ];

    /// The wire byte for this code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u8() == value)
    }

    /// Returns true for [`CompletionCode::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "command completed normally",
            Self::PayloadStateConflict => "payload already in the requested state",
            Self::PayloadDisabled => "payload type disabled",
            Self::NodeBusy => "node busy",
            Self::InvalidCommand => "invalid command",
            Self::InvalidCommandForLun => "command invalid for given LUN",
            Self::Timeout => "timeout while processing command",
            Self::OutOfSpace => "out of space",
            Self::ReservationCanceledOrInvalid => "reservation canceled or invalid reservation ID",
            Self::RequestDataTruncated => "request data truncated",
            Self::RequestDataLengthInvalid => "request data length invalid",
            Self::RequestDataFieldLengthLimitExceeded => "request data field length limit exceeded",
            Self::ParameterOutOfRange => "parameter out of range",
            Self::CannotReturnNumberOfRequestedDataBytes => {
                "cannot return number of requested data bytes"
            }
            Self::RequestedSensorDataOrRecordNotPresent => {
                "requested sensor, data, or record not present"
            }
            Self::InvalidDataFieldInRequest => "invalid data field in request",
            Self::CommandIllegalForSensorOrRecordType => {
                "command illegal for specified sensor or record type"
            }
            Self::CommandResponseCouldNotBeProvided => "command response could not be provided",
            Self::CannotExecuteDuplicatedRequest => "cannot execute duplicated request",
            Self::SdrRepositoryInUpdateMode => "SDR repository in update mode",
            Self::DeviceInFirmwareUpdateMode => "device in firmware update mode",
            Self::BmcInitializationInProgress => "BMC initialization in progress",
            Self::DestinationUnavailable => "destination unavailable",
            Self::InsufficientPrivilegeLevel => "insufficient privilege level",
            Self::CommandNotSupportedInPresentState => "command not supported in present state",
            Self::CommandSubFunctionDisabledOrUnavailable => {
                "command sub-function disabled or unavailable"
            }
            Self::UnspecifiedError => "unspecified error",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.as_u8(), self.description())
    }
}

/// Chassis power state as reported to management clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// The machine is running or booting.
    On,
    /// The machine is off.
    Off,
}

impl PowerState {
    /// Returns true for [`PowerState::On`].
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boot device override.
///
/// Discriminants are the selector values as they appear in the second boot
/// flags byte (device selector shifted left by two).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BootDevice {
    /// No override.
    Default = 0x00,
    /// PXE network boot.
    Network = 0x04,
    /// Primary hard disk.
    Hd = 0x08,
    /// Hard disk, safe mode.
    Safe = 0x0c,
    /// Optical drive.
    Optical = 0x14,
    /// Enter BIOS setup.
    Setup = 0x18,
    /// Removable media.
    Floppy = 0x3c,
}

/// Mask for the device selector bits in the second boot flags byte.
pub const BOOT_DEVICE_MASK: u8 = 0x3c;

impl BootDevice {
    /// The selector byte for this device.
    #[must_use]
    pub const fn selector(self) -> u8 {
        self as u8
    }

    /// Decode the selector bits of a boot flags byte.
    #[must_use]
    pub const fn from_selector(flags: u8) -> Option<Self> {
        match flags & BOOT_DEVICE_MASK {
            0x00 => Some(Self::Default),
            0x04 => Some(Self::Network),
            0x08 => Some(Self::Hd),
            0x0c => Some(Self::Safe),
            0x14 => Some(Self::Optical),
            0x18 => Some(Self::Setup),
            0x3c => Some(Self::Floppy),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Network => "network",
            Self::Hd => "hd",
            Self::Safe => "safe",
            Self::Optical => "optical",
            Self::Setup => "setup",
            Self::Floppy => "floppy",
        }
    }
}

impl fmt::Display for BootDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown boot device name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown boot device: {0}")]
pub struct UnknownBootDevice(pub String);

impl FromStr for BootDevice {
    type Err = UnknownBootDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "net" | "network" | "pxe" => Ok(Self::Network),
            "hd" | "disk" => Ok(Self::Hd),
            "safe" => Ok(Self::Safe),
            "cd" | "cdrom" | "optical" | "dvd" => Ok(Self::Optical),
            "setup" | "bios" | "f1" => Ok(Self::Setup),
            "floppy" | "usb" => Ok(Self::Floppy),
            _ => Err(UnknownBootDevice(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_code_bytes() {
        assert_eq!(CompletionCode::Success.as_u8(), 0x00);
        assert_eq!(CompletionCode::InvalidDataFieldInRequest.as_u8(), 0xCC);
        assert_eq!(CompletionCode::CommandNotSupportedInPresentState.as_u8(), 0xD5);
        assert_eq!(CompletionCode::UnspecifiedError.as_u8(), 0xFF);
    }

    #[test]
    fn completion_code_decoding() {
        for code in CompletionCode::ALL {
            assert_eq!(CompletionCode::from_u8(code.as_u8()), Some(code));
        }
        assert_eq!(CompletionCode::from_u8(0x81), Some(CompletionCode::PayloadDisabled));
        assert_eq!(CompletionCode::from_u8(0x82), None);
        assert_eq!(CompletionCode::from_u8(0xD7), None);
    }

    #[test]
    fn boot_device_aliases() {
        assert_eq!("pxe".parse::<BootDevice>().unwrap(), BootDevice::Network);
        assert_eq!("net".parse::<BootDevice>().unwrap(), BootDevice::Network);
        assert_eq!("cdrom".parse::<BootDevice>().unwrap(), BootDevice::Optical);
        assert_eq!("BIOS".parse::<BootDevice>().unwrap(), BootDevice::Setup);
        assert_eq!("usb".parse::<BootDevice>().unwrap(), BootDevice::Floppy);
        assert!("tape".parse::<BootDevice>().is_err());
    }

    #[test]
    fn boot_device_selectors() {
        assert_eq!(BootDevice::Network.selector(), 4);
        assert_eq!(BootDevice::Hd.selector(), 8);
        assert_eq!(BootDevice::from_selector(0x80 | 0x08), Some(BootDevice::Hd));
        assert_eq!(BootDevice::from_selector(0x10), None);
    }

    #[test]
    fn power_state_from_bool() {
        assert_eq!(PowerState::from(true), PowerState::On);
        assert_eq!(PowerState::from(false).as_str(), "off");
    }
}
