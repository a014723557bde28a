//! Registry of loaded devices
//!
//! Built once per run and passed explicitly to everything that needs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ir::{Category, Device};

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    /// Devices keyed by (category, snake name) for a stable iteration order
    devices: BTreeMap<(Category, String), Arc<Device>>,
    /// Mapping from wire identifier to key
    identifier_index: BTreeMap<u16, (Category, String)>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. The wire identifier must not be taken yet.
    pub fn insert(&mut self, device: Device) -> Result<()> {
        if let Some(existing) = self
            .identifier_index
            .get(&device.identifier)
            .and_then(|key| self.devices.get(key))
        {
            return Err(Error::DuplicateDevice {
                identifier: device.identifier,
                name: device.name.to_string(),
                existing: existing.name.to_string(),
            });
        }

        let key = (device.category, device.name.snake());
        if let Some(existing) = self.devices.get(&key) {
            return Err(Error::DuplicateDevice {
                identifier: device.identifier,
                name: device.name.to_string(),
                existing: existing.name.to_string(),
            });
        }

        self.identifier_index.insert(device.identifier, key.clone());
        self.devices.insert(key, Arc::new(device));
        Ok(())
    }

    pub fn get(&self, identifier: u16) -> Option<&Arc<Device>> {
        self.identifier_index
            .get(&identifier)
            .and_then(|key| self.devices.get(key))
    }

    /// Find a device by its canonical name, in any category.
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Device>> {
        self.devices.values().find(|d| d.name.space() == name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    pub fn released(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values().filter(|d| d.released)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::minimal_device;

    #[test]
    fn rejects_reused_identifier() {
        let mut registry = DeviceRegistry::new();
        registry.insert(minimal_device()).unwrap();

        let mut other = minimal_device();
        other.name = crate::Name::new("Other");
        let err = registry.insert(other).unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice { identifier: 2100, .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn looks_up_by_identifier_and_name() {
        let mut registry = DeviceRegistry::new();
        registry.insert(minimal_device()).unwrap();
        assert!(registry.get(2100).is_some());
        assert!(registry.get_by_name("Example").is_some());
        assert!(registry.get(1).is_none());
    }
}
