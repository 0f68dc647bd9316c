//! Compute device detection.
//!
//! The device class is decided once at startup from compile-time feature
//! flags and reported in the `ready` handshake; it also picks the expected
//! stage durations that shape heartbeat curves.

use crate::defaults;

/// The device class a build runs inference on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// Compute device description reported to the host process.
#[derive(Debug, Clone)]
pub struct Device {
    pub kind: DeviceKind,
    /// Wire name, e.g. "cpu" or "cuda".
    pub name: String,
    /// Numeric precision the backend runs at.
    pub compute_type: String,
}

impl Device {
    /// Detect the device from the GPU backend compiled into this build.
    pub fn detect() -> Self {
        match defaults::gpu_backend() {
            "CPU" => Device {
                kind: DeviceKind::Cpu,
                name: "cpu".to_string(),
                compute_type: "int8".to_string(),
            },
            backend => Device {
                kind: DeviceKind::Gpu,
                name: backend.to_ascii_lowercase(),
                compute_type: "float16".to_string(),
            },
        }
    }

    /// Expected recognition wall time in seconds for this device class.
    pub fn recognition_expected_secs(&self) -> f64 {
        match self.kind {
            DeviceKind::Cpu => defaults::RECOGNITION_EXPECTED_SECS_CPU,
            DeviceKind::Gpu => defaults::RECOGNITION_EXPECTED_SECS_GPU,
        }
    }

    /// Expected alignment wall time in seconds for this device class.
    pub fn alignment_expected_secs(&self) -> f64 {
        match self.kind {
            DeviceKind::Cpu => defaults::ALIGNMENT_EXPECTED_SECS_CPU,
            DeviceKind::Gpu => defaults::ALIGNMENT_EXPECTED_SECS_GPU,
        }
    }
}
