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

use crate::config::ChainLockConfig;
use crate::error::{LockError, Result};
use crate::locking::{DomainId, Identity, LockCoordinator, LockTarget, PlanStep};
use comfy_table::{Cell, Table};
use std::str::FromStr;
use std::sync::Arc;

/// Object class accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Account,
    Ledger,
}

/// `[class:]id` where `id` is an integer, text, or `_` for reference identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectArg {
    pub class: ObjectClass,
    pub id: Option<DomainId>,
}

impl FromStr for ObjectArg {
    type Err = LockError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (class, id) = match value.split_once(':') {
            Some((class, id)) => {
                let class = match class.to_ascii_lowercase().as_str() {
                    "account" => ObjectClass::Account,
                    "ledger" => ObjectClass::Ledger,
                    other => {
                        return Err(LockError::InvalidArgument(format!(
                            "Unknown object class '{other}'; expected 'account' or 'ledger'"
                        )));
                    }
                };
                (class, id)
            }
            None => (ObjectClass::Account, value),
        };

        if id.is_empty() {
            return Err(LockError::InvalidArgument(format!(
                "Object '{value}' has no identity; use '_' for reference identity"
            )));
        }

        let id = match id {
            "_" => None,
            id => Some(
                id.parse::<i64>()
                    .map(DomainId::from)
                    .unwrap_or_else(|_| DomainId::from(id)),
            ),
        };
        Ok(Self { class, id })
    }
}

struct Account {
    id: Option<DomainId>,
}

impl Identity for Account {
    fn identity(&self) -> Option<DomainId> {
        self.id.clone()
    }
}

struct Ledger {
    id: Option<DomainId>,
}

impl Identity for Ledger {
    fn identity(&self) -> Option<DomainId> {
        self.id.clone()
    }
}

/// Keeps the objects alive while their plan is computed.
enum PlannedObject {
    Account(Arc<Account>),
    Ledger(Arc<Ledger>),
}

impl PlannedObject {
    fn new(arg: &ObjectArg) -> Self {
        let id = arg.id.clone();
        match arg.class {
            ObjectClass::Account => PlannedObject::Account(Arc::new(Account { id })),
            ObjectClass::Ledger => PlannedObject::Ledger(Arc::new(Ledger { id })),
        }
    }

    fn target(&self) -> LockTarget {
        match self {
            PlannedObject::Account(object) => LockTarget::new(object),
            PlannedObject::Ledger(object) => LockTarget::new(object),
        }
    }
}

pub struct PlanCommand<'a> {
    config: &'a ChainLockConfig,
}

impl<'a> PlanCommand<'a> {
    pub fn new(config: &'a ChainLockConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, objects: &[String]) -> Result<()> {
        let args = objects
            .iter()
            .map(|value| value.parse::<ObjectArg>())
            .collect::<Result<Vec<_>>>()?;

        let steps = plan_for(self.config, &args)?;
        println!("{}", render_plan(&steps));
        Ok(())
    }
}

/// Computes the acquisition order for objects built from `args`.
pub fn plan_for(config: &ChainLockConfig, args: &[ObjectArg]) -> Result<Vec<PlanStep>> {
    let coordinator = LockCoordinator::from_config(config);
    let objects: Vec<PlannedObject> = args.iter().map(PlannedObject::new).collect();
    let targets: Vec<LockTarget> = objects.iter().map(PlannedObject::target).collect();

    let steps = coordinator.plan(&targets);
    if steps.is_empty() {
        return Err(LockError::EmptyChain);
    }
    log::debug!("Planned {} locks for {} objects", steps.len(), args.len());
    Ok(steps)
}

fn render_plan(steps: &[PlanStep]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(vec![
        Cell::new("Step"),
        Cell::new("Lock"),
        Cell::new("Class"),
        Cell::new("Kind"),
    ]);

    for (index, step) in steps.iter().enumerate() {
        let kind = if step.is_tie_break() {
            "tie-break"
        } else {
            "object"
        };
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(step.label()),
            Cell::new(step.class().short_name()),
            Cell::new(kind),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_class_prefix_and_identity() {
        assert_eq!(
            "ledger:7".parse::<ObjectArg>().unwrap(),
            ObjectArg {
                class: ObjectClass::Ledger,
                id: Some(DomainId::Int(7)),
            }
        );
        assert_eq!(
            "abc".parse::<ObjectArg>().unwrap(),
            ObjectArg {
                class: ObjectClass::Account,
                id: Some(DomainId::from("abc")),
            }
        );
        assert_eq!("account:_".parse::<ObjectArg>().unwrap().id, None);
    }

    #[test]
    fn rejects_unknown_class_and_empty_id() {
        assert!(matches!(
            "vault:1".parse::<ObjectArg>(),
            Err(LockError::InvalidArgument(_))
        ));
        assert!(matches!(
            "ledger:".parse::<ObjectArg>(),
            Err(LockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn plan_inserts_tie_break_before_tied_run() {
        let args: Vec<ObjectArg> = ["5", "3", "3"].iter().map(|s| s.parse().unwrap()).collect();
        let steps = plan_for(&ChainLockConfig::default(), &args).unwrap();
        let labels: Vec<String> = steps.iter().map(PlanStep::label).collect();
        assert_eq!(
            labels,
            ["tie-break:Account", "Account#3", "Account#3", "Account#5"]
        );
        assert!(steps[0].is_tie_break());
        assert!(steps[1..].iter().all(|step| !step.is_tie_break()));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let err = plan_for(&ChainLockConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, LockError::EmptyChain));
    }

    #[test]
    fn rendered_plan_marks_tie_breaks() {
        let args: Vec<ObjectArg> = ["3", "3", "ledger:1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let steps = plan_for(&ChainLockConfig::default(), &args).unwrap();
        let rendered = render_plan(&steps).to_string();

        let tie_row = rendered
            .lines()
            .find(|line| line.contains("tie-break:Account"))
            .unwrap();
        assert!(tie_row.contains("tie-break"));
        assert!(!tie_row.contains("object"));

        let ledger_row = rendered.lines().find(|line| line.contains("Ledger#1")).unwrap();
        assert!(ledger_row.contains("Ledger"));
        assert!(ledger_row.contains("object"));
    }
}
