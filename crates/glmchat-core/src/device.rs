use std::fmt;
use std::str::FromStr;

use candle_core::Device;

use crate::error::{ChatError, Result};

/// The device named on the command line, e.g. `CPU`, `CUDA:1` or `metal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceSpec {
    /// Open the device. Fails when candle was built without the backend.
    pub fn open(&self) -> Result<Device> {
        let device = match self {
            DeviceSpec::Cpu => Device::Cpu,
            DeviceSpec::Cuda(ordinal) => Device::new_cuda(*ordinal)?,
            DeviceSpec::Metal(ordinal) => Device::new_metal(*ordinal)?,
        };
        Ok(device)
    }
}

impl FromStr for DeviceSpec {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let (name, ordinal) = match s.split_once(':') {
            Some((name, ordinal)) => {
                let ordinal = ordinal
                    .parse::<usize>()
                    .map_err(|_| ChatError::InvalidDevice(s.clone()))?;
                (name, ordinal)
            }
            None => (s.as_str(), 0),
        };

        match name {
            "cpu" => Ok(DeviceSpec::Cpu),
            "cuda" | "gpu" => Ok(DeviceSpec::Cuda(ordinal)),
            "metal" => Ok(DeviceSpec::Metal(ordinal)),
            _ => Err(ChatError::InvalidDevice(s.clone())),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Cpu => write!(f, "CPU"),
            DeviceSpec::Cuda(ordinal) => write!(f, "CUDA:{ordinal}"),
            DeviceSpec::Metal(ordinal) => write!(f, "METAL:{ordinal}"),
        }
    }
}
