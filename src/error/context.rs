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
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a LockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a LockError) -> Self {
        let (suggestion, details) = match error {
            LockError::EmptyChain => {
                let suggestion = Some(
                    "Pass at least one object to the coordinator. Absent entries are skipped, \
                     so a list made only of absent entries is also empty."
                        .to_string(),
                );
                (suggestion, None)
            }
            LockError::NotOwner { lock } => {
                let details = Some(format!(
                    "'{lock}' was released by a thread that does not hold it."
                ));
                (None, details)
            }
            LockError::ConfigError(msg) => {
                let suggestion = Some(
                    "Check config.toml or the CHAINLOCK_* environment variables (use '__' \
                     between sections, e.g. CHAINLOCK_LOCKING__RETRY_ATTEMPTS=3)."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            LockError::Config(err) => {
                let suggestion = Some(
                    "Check config.toml or the CHAINLOCK_* environment variables.".to_string(),
                );
                let details = Some(err.to_string());
                (suggestion, details)
            }
            LockError::TomlDe(err) => {
                let suggestion = Some("Fix the TOML syntax in config.toml.".to_string());
                let details = Some(err.to_string());
                (suggestion, details)
            }
            LockError::InvalidArgument(msg) => {
                let suggestion = Some("Run with --help to see accepted values.".to_string());
                let details = Some(msg.clone());
                (suggestion, details)
            }
            LockError::ExclusionViolated(msg) => {
                let details = Some(format!(
                    "Two threads held locks covering the same object at once: {msg}"
                ));
                (None, details)
            }
            LockError::WorkerPanicked(msg) => {
                let suggestion = Some(
                    "Run again with -vvv to trace the chain passes leading up to the panic."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }

}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
