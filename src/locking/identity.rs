// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Canonical ordering keys for lockable objects.
//!
//! Every object handed to the coordinator is ordered by its [`IdentityKey`]:
//! the domain identity it declares through [`Identity`], or the address of its
//! shared allocation when it declares none. Keys are resolved once, when the
//! object's lock is created, and never re-derived during comparisons.

use std::any::{TypeId, type_name};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A stable, totally ordered domain identity such as a primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DomainId {
    Int(i64),
    Uint(u64),
    Text(Arc<str>),
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainId::Int(value) => write!(f, "{value}"),
            DomainId::Uint(value) => write!(f, "{value}"),
            DomainId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i32> for DomainId {
    fn from(value: i32) -> Self {
        DomainId::Int(i64::from(value))
    }
}

impl From<i64> for DomainId {
    fn from(value: i64) -> Self {
        DomainId::Int(value)
    }
}

impl From<u32> for DomainId {
    fn from(value: u32) -> Self {
        DomainId::Uint(u64::from(value))
    }
}

impl From<u64> for DomainId {
    fn from(value: u64) -> Self {
        DomainId::Uint(value)
    }
}

impl From<usize> for DomainId {
    fn from(value: usize) -> Self {
        DomainId::Uint(value as u64)
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        DomainId::Text(Arc::from(value))
    }
}

impl From<String> for DomainId {
    fn from(value: String) -> Self {
        DomainId::Text(Arc::from(value))
    }
}

/// Capability implemented by objects that can be locked through the coordinator.
///
/// Objects that return `None` are ordered by reference identity instead.
pub trait Identity: Send + Sync + 'static {
    fn identity(&self) -> Option<DomainId> {
        None
    }
}

/// Ordering key of a single object lock.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityKey {
    Domain(DomainId),
    Reference(usize),
}

impl IdentityKey {
    pub fn is_domain(&self) -> bool {
        matches!(self, IdentityKey::Domain(_))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Domain(id) => write!(f, "{id}"),
            IdentityKey::Reference(address) => write!(f, "@{address:#x}"),
        }
    }
}

/// Runtime class of a lockable object. Equality and order follow the `TypeId`.
#[derive(Debug, Clone, Copy)]
pub struct ClassId {
    type_id: TypeId,
    name: &'static str,
}

impl ClassId {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path or generic arguments.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ClassId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account;
    struct Wrapper<T>(T);

    #[test]
    fn domain_ids_order_within_variant() {
        assert!(DomainId::from(3) < DomainId::from(5));
        assert!(DomainId::from("alpha") < DomainId::from("beta"));
        assert_eq!(DomainId::from(7u64), DomainId::Uint(7));
    }

    #[test]
    fn domain_keys_sort_before_reference_keys() {
        let domain = IdentityKey::Domain(DomainId::from(i64::MAX));
        let reference = IdentityKey::Reference(0);
        assert!(domain < reference);
        assert!(domain.is_domain());
        assert!(!reference.is_domain());
    }

    #[test]
    fn key_display_marks_reference_identity() {
        assert_eq!(IdentityKey::Domain(DomainId::from(5)).to_string(), "5");
        assert_eq!(IdentityKey::Reference(0x10).to_string(), "@0x10");
    }

    #[test]
    fn class_short_name_strips_path_and_generics() {
        assert_eq!(ClassId::of::<Account>().short_name(), "Account");
        assert_eq!(ClassId::of::<Wrapper<Account>>().short_name(), "Wrapper");
        assert_eq!(ClassId::of::<Account>(), ClassId::of::<Account>());
        assert_ne!(ClassId::of::<Account>(), ClassId::of::<Wrapper<Account>>());
    }
}
