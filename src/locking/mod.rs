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

pub mod chain;
pub mod coordinator;
pub mod guard;
pub mod identity;
pub mod policy;
pub mod primitive;
pub mod registry;
pub mod target;

pub use chain::ChainLock;
pub use coordinator::{LockCoordinator, PlanStep};
pub use guard::ChainGuard;
pub use identity::{ClassId, DomainId, Identity, IdentityKey};
pub use policy::AcquirePolicy;
pub use primitive::{MonitorLock, RawLock};
pub use registry::{LockRegistry, ObjectLock};
pub use target::LockTarget;
