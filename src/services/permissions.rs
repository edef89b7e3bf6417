//! Bitmask permission model.
//!
//! Every role owns one bit. A caller's key is the union of the bits of its roles, and a route
//! with a non-zero level admits any caller whose key shares at least one bit with it.

use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::db::models::Role;
use crate::repositories::{self, EntityStore, StoreError};

/// Highest bit a role may use; keeps values inside a signed 32-bit range for JSON clients.
const MAX_ROLE_BIT: u32 = 1 << 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct PermissionMask(u32);

impl PermissionMask {
    pub(crate) const PUBLIC: Self = Self(0);

    pub(crate) const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub(crate) const fn bits(self) -> u32 {
        self.0
    }

    pub(crate) const fn is_public(self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for PermissionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PermissionMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum PermissionError {
    #[error("role value must be a single bit between 1 and {MAX_ROLE_BIT}, got {0}")]
    NotSingleBit(u32),
}

/// Validates a role value as exactly one permission bit.
pub(crate) fn role_bit(value: u32) -> Result<PermissionMask, PermissionError> {
    if value.is_power_of_two() && value <= MAX_ROLE_BIT {
        Ok(PermissionMask(value))
    } else {
        Err(PermissionError::NotSingleBit(value))
    }
}

pub(crate) fn authorize(level: PermissionMask, key: PermissionMask) -> bool {
    level.is_public() || key.intersects(level)
}

/// Role name to bit table, loaded from the store at startup and after every role write.
#[derive(Clone, Default)]
pub(crate) struct RoleRegistry {
    bits: Arc<RwLock<HashMap<String, PermissionMask>>>,
}

impl RoleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn reload(&self, store: &dyn EntityStore) -> Result<usize, StoreError> {
        let roles: Vec<Role> = repositories::list(store).await?;
        warn_on_overlaps(&roles);

        let table: HashMap<String, PermissionMask> = roles
            .into_iter()
            .map(|role| (role.name, PermissionMask(role.numeric_value)))
            .collect();
        let count = table.len();

        *self.bits.write().await = table;
        tracing::debug!(roles = count, "role registry reloaded");
        Ok(count)
    }

    /// Union of the bits of the named roles. Unknown names add nothing.
    pub(crate) async fn role_key(&self, names: &[String]) -> PermissionMask {
        let bits = self.bits.read().await;
        names
            .iter()
            .filter_map(|name| bits.get(name).copied())
            .fold(PermissionMask::PUBLIC, |key, bit| key | bit)
    }
}

fn warn_on_overlaps(roles: &[Role]) {
    for (index, role) in roles.iter().enumerate() {
        if role_bit(role.numeric_value).is_err() {
            tracing::warn!(role = %role.name, value = role.numeric_value, "role value is not a single bit");
        }
        for other in &roles[index + 1..] {
            if role.numeric_value & other.numeric_value != 0 {
                tracing::warn!(
                    first = %role.name,
                    second = %other.name,
                    "roles share permission bits; keys combine them with OR"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{create, memory::MemoryEntityStore};

    async fn registry_with(roles: &[(&str, u32)]) -> RoleRegistry {
        let store = MemoryEntityStore::new();
        for (name, value) in roles {
            let mut role = Role { name: name.to_string(), numeric_value: *value, ..Role::default() };
            create(&store, &mut role).await.unwrap();
        }
        let registry = RoleRegistry::new();
        registry.reload(&store).await.unwrap();
        registry
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn student_alone_cannot_reach_level_two() {
        let registry = registry_with(&[("student", 1), ("ta", 2)]).await;

        let key = registry.role_key(&names(&["student"])).await;
        assert_eq!(key.bits(), 1);
        assert!(!authorize(PermissionMask::new(2), key));
    }

    #[tokio::test]
    async fn student_and_ta_reach_level_two() {
        let registry = registry_with(&[("student", 1), ("ta", 2)]).await;

        let key = registry.role_key(&names(&["student", "ta"])).await;
        assert_eq!(key.bits(), 3);
        assert!(authorize(PermissionMask::new(2), key));
    }

    #[tokio::test]
    async fn unknown_roles_contribute_nothing() {
        let registry = registry_with(&[("student", 1)]).await;

        let key = registry.role_key(&names(&["ghost", "student", "ghost"])).await;
        assert_eq!(key, PermissionMask::new(1));
        assert_eq!(registry.role_key(&[]).await, PermissionMask::PUBLIC);
    }

    #[tokio::test]
    async fn overlapping_legacy_values_do_not_borrow_bits() {
        let registry = registry_with(&[("editor", 3), ("viewer", 1)]).await;

        let key = registry.role_key(&names(&["editor", "viewer"])).await;
        assert_eq!(key.bits(), 3, "a sum would have produced 4");
        assert!(!authorize(PermissionMask::new(4), key));
    }

    #[test]
    fn public_level_admits_everyone() {
        assert!(authorize(PermissionMask::PUBLIC, PermissionMask::PUBLIC));
        assert!(!authorize(PermissionMask::new(8), PermissionMask::PUBLIC));
    }

    #[test]
    fn role_values_must_be_single_bits() {
        assert_eq!(role_bit(4), Ok(PermissionMask::new(4)));
        assert_eq!(role_bit(0), Err(PermissionError::NotSingleBit(0)));
        assert_eq!(role_bit(3), Err(PermissionError::NotSingleBit(3)));
        assert_eq!(role_bit(1 << 31), Err(PermissionError::NotSingleBit(1 << 31)));
    }
}
