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

use crate::error::*;

#[test]
fn test_error_context_empty_chain() {
    let error = LockError::EmptyChain;
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.is_some());
    assert!(context.suggestion.unwrap().contains("at least one object"));
    assert!(context.details.is_none());
}

#[test]
fn test_error_context_not_owner() {
    let error = LockError::NotOwner {
        lock: "tie-break lock for Account".to_string(),
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.is_none());
    assert!(context.details.unwrap().contains("tie-break lock for Account"));
}

#[test]
fn test_error_context_config_error() {
    let error = LockError::ConfigError("retry_attempts must be at least 1".to_string());
    let context = ErrorContext::new(&error);

    let suggestion = context.suggestion.unwrap();
    assert!(suggestion.contains("CHAINLOCK_LOCKING__RETRY_ATTEMPTS"));
    assert_eq!(
        context.details,
        Some("retry_attempts must be at least 1".to_string())
    );
}

#[test]
fn test_error_context_worker_panicked() {
    let error = LockError::WorkerPanicked("index out of bounds".to_string());
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("-vvv"));
    assert_eq!(context.details, Some("index out of bounds".to_string()));
}

#[test]
fn test_error_context_display() {
    let error = LockError::InvalidArgument("threads must be positive".to_string());
    let context = ErrorContext::new(&error);
    let output = context.to_string();

    assert!(output.contains("Error:"));
    assert!(output.contains("Details:"));
    assert!(output.contains("Suggestion:"));
}

#[test]
fn test_exit_codes() {
    assert_eq!(get_exit_code(&LockError::EmptyChain), 2);
    assert_eq!(
        get_exit_code(&LockError::InvalidArgument("test".to_string())),
        2
    );
    assert_eq!(get_exit_code(&LockError::ConfigError("test".to_string())), 3);
    assert_eq!(
        get_exit_code(&LockError::ExclusionViolated("test".to_string())),
        4
    );
    assert_eq!(
        get_exit_code(&LockError::AcquireFailed {
            lock: "a".to_string(),
            details: "b".to_string(),
        }),
        5
    );
    assert_eq!(
        get_exit_code(&LockError::WorkerPanicked("boom".to_string())),
        6
    );
    assert_eq!(
        get_exit_code(&LockError::NotOwner {
            lock: "a".to_string()
        }),
        1
    );
}

#[test]
fn test_format_error_chain() {
    let error = LockError::EmptyChain;
    let formatted = format_error_chain(&error);

    assert!(formatted.contains("Error:"));
    assert!(formatted.contains("at least one lock"));
}
