use std::collections::BTreeMap;
use std::fmt;

use crate::backend::{Backend, BackendDevice};
use crate::error::{Error, Result};

// DeviceRegistry — Explicit table of opened devices for one backend
//
// Tensors carry a device handle, and the handle is always obtained from a
// registry the caller owns. There is no process-wide "current device": a
// multi-device run opens `min_device..=max_device` once and hands each worker
// the handle for its ordinal.

/// Devices of one backend, keyed by ordinal.
pub struct DeviceRegistry<B: Backend> {
    devices: BTreeMap<usize, B::Device>,
}

impl<B: Backend> DeviceRegistry<B> {
    pub fn new() -> Self {
        DeviceRegistry {
            devices: BTreeMap::new(),
        }
    }

    /// Open every ordinal in `min..=max`.
    pub fn open_range(min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(Error::msg(format!(
                "empty device range {min}..={max}"
            )));
        }
        let mut registry = Self::new();
        for ordinal in min..=max {
            registry.register(B::open(ordinal)?);
        }
        tracing::debug!(backend = B::NAME, min, max, "opened devices");
        Ok(registry)
    }

    /// Add a device, replacing any previous device with the same ordinal.
    pub fn register(&mut self, device: B::Device) -> Option<B::Device> {
        self.devices.insert(device.ordinal(), device)
    }

    /// Device handle for an ordinal.
    pub fn get(&self, ordinal: usize) -> Result<&B::Device> {
        self.devices
            .get(&ordinal)
            .ok_or(Error::UnknownDevice { ordinal })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Registered ordinals in ascending order.
    pub fn ordinals(&self) -> Vec<usize> {
        self.devices.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &B::Device> {
        self.devices.values()
    }
}

impl<B: Backend> Default for DeviceRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for DeviceRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.devices.values().map(|d| d.name()))
            .finish()
    }
}
