//! Simulation scenarios
//!
//! A scenario is a JSON document describing who creates an application and
//! which transaction groups call it afterwards:
//!
//! ```json
//! {
//!   "creator": "alice",
//!   "round": 10,
//!   "calls": [
//!     {
//!       "label": "pay the router",
//!       "txns": [
//!         { "sender": "alice", "type": "application_call", "app_id": 1 },
//!         { "sender": "alice", "type": "payment", "receiver": "bob", "amount": 2500 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Addresses are 64 hex characters or labels hashed into an address.

use crate::contract::{ApplicationError, ApplicationManager, CallOutcome, CompiledProgram};
use crate::core::state::StateSchema;
use crate::core::transaction::{Address, OnComplete, Transaction, TransactionGroup};
use crate::samples::Template;
use crate::storage::StorageError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

fn default_round() -> u64 {
    1
}

/// A creation followed by a list of calls
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub creator: Address,
    /// Defaults to the template's schemas
    #[serde(default)]
    pub global_schema: Option<StateSchema>,
    #[serde(default)]
    pub local_schema: Option<StateSchema>,
    #[serde(default = "default_round")]
    pub round: u64,
    /// Defaults to the current wall-clock time
    #[serde(default)]
    pub latest_timestamp: Option<u64>,
    /// On-completion action of the creation call; defaults per template
    #[serde(default)]
    pub create_action: Option<OnComplete>,
    #[serde(default)]
    pub calls: Vec<ScenarioCall>,
}

/// One transaction group submitted to the application
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCall {
    #[serde(default)]
    pub label: Option<String>,
    /// Round to advance to before this call
    #[serde(default)]
    pub round: Option<u64>,
    /// Position of the application call within the group
    #[serde(default)]
    pub index: usize,
    pub txns: Vec<Transaction>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Outcome of one scenario call
#[derive(Debug)]
pub struct CallRecord {
    pub label: String,
    /// Id of the submitted group, when the group was well formed
    pub group_id: Option<[u8; 32]>,
    pub result: Result<CallOutcome, ApplicationError>,
}

/// Everything a simulation produced
#[derive(Debug)]
pub struct Simulation {
    pub manager: ApplicationManager,
    pub creation: CallOutcome,
    pub calls: Vec<CallRecord>,
}

impl Simulation {
    /// Id of the created application, if creation approved
    pub fn app_id(&self) -> Option<u64> {
        self.creation.approved.then_some(self.creation.app_id)
    }
}

/// Create the application, then run every call in order
pub fn simulate(
    scenario: &Scenario,
    template: Template,
    compiled: &CompiledProgram,
    now: u64,
) -> Result<Simulation, ApplicationError> {
    let (default_global, default_local) = template.schemas();
    let mut manager = ApplicationManager::new();
    manager.set_round(scenario.round);
    manager.set_latest_timestamp(scenario.latest_timestamp.unwrap_or(now));

    let action = scenario
        .create_action
        .unwrap_or_else(|| template.create_action());
    let create = TransactionGroup::single(Transaction::app_call(scenario.creator, 0, action));
    let creation = manager.create(
        compiled,
        scenario.global_schema.unwrap_or(default_global),
        scenario.local_schema.unwrap_or(default_local),
        &create,
        0,
    )?;

    let mut calls = Vec::with_capacity(scenario.calls.len());
    for (i, call) in scenario.calls.iter().enumerate() {
        if let Some(round) = call.round {
            manager.set_round(round);
        }
        let label = call
            .label
            .clone()
            .unwrap_or_else(|| format!("call #{}", i + 1));
        let record = match TransactionGroup::new(call.txns.clone()) {
            Ok(group) => CallRecord {
                label,
                group_id: Some(group.group_id()),
                result: manager.call(&group, call.index),
            },
            Err(e) => CallRecord {
                label,
                group_id: None,
                result: Err(e.into()),
            },
        };
        calls.push(record);
    }

    Ok(Simulation {
        manager,
        creation,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::StateValue;
    use crate::samples::DEFAULT_VERSION;

    fn compiled(template: Template) -> CompiledProgram {
        template.program(DEFAULT_VERSION).unwrap().compile().unwrap()
    }

    #[test]
    fn test_router_scenario() {
        let json = r#"{
            "creator": "alice",
            "round": 10,
            "calls": [
                {
                    "label": "pay",
                    "txns": [
                        { "sender": "alice", "type": "application_call", "app_id": 1 },
                        { "sender": "alice", "type": "payment", "receiver": "bob", "amount": 2500 }
                    ]
                },
                {
                    "txns": [
                        { "sender": "alice", "type": "application_call", "app_id": 1 }
                    ]
                },
                { "txns": [] }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let sim = simulate(&scenario, Template::Router, &compiled(Template::Router), 0).unwrap();

        assert_eq!(sim.app_id(), Some(1));
        assert_eq!(sim.calls.len(), 3);
        assert_eq!(sim.calls[0].label, "pay");
        assert!(sim.calls[0].result.as_ref().unwrap().approved);
        assert_eq!(sim.calls[1].label, "call #2");
        assert!(!sim.calls[1].result.as_ref().unwrap().approved);
        assert!(sim.calls[2].result.is_err());
        assert!(sim.calls[2].group_id.is_none());

        let expected = TransactionGroup::new(scenario.calls[0].txns.clone()).unwrap();
        assert_eq!(sim.calls[0].group_id, Some(expected.group_id()));

        let app = sim.manager.get(1).unwrap();
        assert_eq!(app.state.global().get(b"Amount"), Some(&StateValue::Int(2500)));
    }

    #[test]
    fn test_timestamp_defaults_to_now() {
        let json = r#"{ "creator": "alice" }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.round, 1);
        assert!(scenario.latest_timestamp.is_none());

        let sim = simulate(&scenario, Template::Echo, &compiled(Template::Echo), 1_700_000_000)
            .unwrap();
        assert!(sim.creation.approved);
        let creator = Address::derive("alice");
        let local = sim.manager.get(1).unwrap().state.local(&creator).cloned();
        assert_eq!(
            local.and_then(|s| s.get(b"localRound").cloned()),
            Some(StateValue::Int(1))
        );
    }
}
