//! Device state reported by the tracker service.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Connectivity / health state of the eye-tracker device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TrackerState {
    /// Device connected and streaming.
    Connected,
    /// Device connected to a port without enough bandwidth (USB 2.0).
    ConnectedNoUsb3,
    /// Device connected but its firmware must be updated.
    ConnectedBadFirmware,
    /// No device found.
    NotConnected,
    /// Device connected but the sensor produces no data.
    ConnectedNoStream,
}

impl TrackerState {
    /// Whether a calibration may run in this state.
    pub fn is_usable(&self) -> bool {
        matches!(self, TrackerState::Connected)
    }

    /// Human-readable explanation for states that block calibration.
    ///
    /// Returns `None` for [`TrackerState::Connected`].
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            TrackerState::Connected => None,
            TrackerState::ConnectedNoUsb3 => Some("Device connected to a USB2.0 port"),
            TrackerState::ConnectedBadFirmware => Some("A firmware update is required."),
            TrackerState::NotConnected => Some("Device not connected."),
            TrackerState::ConnectedNoStream => Some("No data coming out of the sensor."),
        }
    }
}
