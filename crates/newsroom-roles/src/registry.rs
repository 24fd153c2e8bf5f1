use std::collections::BTreeMap;
use std::sync::Arc;

use newsroom_core::RoleId;

use crate::{ConfigurationError, Role, RoleDescriptor};

#[derive(Clone)]
pub struct RegisteredRole {
    pub descriptor: RoleDescriptor,
    pub role: Arc<dyn Role>,
}

/// Roles known to the engine, keyed by id. Filled before any newsroom is composed.
#[derive(Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<RoleId, RegisteredRole>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: RoleDescriptor, role: Arc<dyn Role>) -> Result<(), ConfigurationError> {
        if descriptor.capabilities.is_empty() {
            return Err(ConfigurationError::NoCapabilities(descriptor.id));
        }
        if self.roles.contains_key(&descriptor.id) {
            return Err(ConfigurationError::DuplicateRegistration(descriptor.id));
        }
        self.roles.insert(descriptor.id.clone(), RegisteredRole { descriptor, role });
        Ok(())
    }

    pub fn get(&self, id: &RoleId) -> Option<&RegisteredRole> {
        self.roles.get(id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RoleDescriptor> {
        self.roles.values().map(|r| &r.descriptor)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
