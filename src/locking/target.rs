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

use crate::locking::identity::{ClassId, Identity, IdentityKey};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Type-erased reference to one object that should be locked.
///
/// Holds the object strongly for as long as the target itself lives, so an
/// object cannot disappear between resolving its lock and building a chain.
#[derive(Clone)]
pub struct LockTarget {
    class: ClassId,
    address: usize,
    key: IdentityKey,
    object: Arc<dyn Any + Send + Sync>,
}

impl LockTarget {
    pub fn new<T: Identity>(object: &Arc<T>) -> Self {
        let address = Arc::as_ptr(object) as *const () as usize;
        let key = match object.identity() {
            Some(id) => IdentityKey::Domain(id),
            None => IdentityKey::Reference(address),
        };
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(object) as Arc<dyn Any + Send + Sync>;
        Self {
            class: ClassId::of::<T>(),
            address,
            key,
            object: erased,
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Address of the shared allocation; the reference identity of the object.
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Arc::downgrade(&self.object)
    }
}

impl<T: Identity> From<&Arc<T>> for LockTarget {
    fn from(object: &Arc<T>) -> Self {
        LockTarget::new(object)
    }
}

impl fmt::Debug for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTarget")
            .field("class", &self.class.name())
            .field("address", &format_args!("{:#x}", self.address))
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::identity::DomainId;

    struct Keyed(i64);

    impl Identity for Keyed {
        fn identity(&self) -> Option<DomainId> {
            Some(DomainId::from(self.0))
        }
    }

    struct Anonymous;

    impl Identity for Anonymous {}

    #[test]
    fn declared_identity_becomes_domain_key() {
        let object = Arc::new(Keyed(42));
        let target = LockTarget::new(&object);
        assert_eq!(target.key(), &IdentityKey::Domain(DomainId::Int(42)));
        assert_eq!(target.class(), ClassId::of::<Keyed>());
    }

    #[test]
    fn missing_identity_falls_back_to_address() {
        let object = Arc::new(Anonymous);
        let target = LockTarget::from(&object);
        let address = Arc::as_ptr(&object) as *const () as usize;
        assert_eq!(target.address(), address);
        assert_eq!(target.key(), &IdentityKey::Reference(address));
    }

    #[test]
    fn clones_of_one_arc_share_reference_identity() {
        let object = Arc::new(Anonymous);
        let other = Arc::clone(&object);
        assert_eq!(
            LockTarget::new(&object).address(),
            LockTarget::new(&other).address()
        );
    }
}
