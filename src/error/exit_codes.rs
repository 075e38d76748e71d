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

use crate::error::LockError;

pub fn get_exit_code(error: &LockError) -> i32 {
    match error {
        LockError::EmptyChain | LockError::InvalidArgument(_) => 2,

        LockError::ConfigError(_)
        | LockError::Config(_)
        | LockError::TomlDe(_)
        | LockError::TomlSer(_) => 3,

        LockError::ExclusionViolated(_) => 4,

        LockError::AcquireFailed { .. } => 5,

        LockError::WorkerPanicked(_) => 6,

        _ => 1,
    }
}
