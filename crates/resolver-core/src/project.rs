//! Whole-project resolution.
//!
//! The dispatcher's procedures fail fast on a missing reference. This layer
//! sits above them: it walks a [`ProjectConfig`] in dependency order and
//! retries PDAs, instructions and bundles that failed with
//! `UnresolvedReference` once other entities have landed in the table.

use std::collections::BTreeMap;

use chain_sol::{Address, Instruction, Keypair};
use tracing::{debug, warn};

use crate::codec::AccountDecoderHandle;
use crate::config::ProjectConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ErrorKind, Result};
use crate::session::WalletSession;
use crate::value::{AccountDeclSyntax, ResolvedInstructionBundle};

/// Everything a project resolved to, by label.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub accounts: Vec<(String, AccountDeclSyntax)>,
    pub test_wallets: BTreeMap<String, Keypair>,
    pub decoders: BTreeMap<String, AccountDecoderHandle>,
    pub pdas: BTreeMap<String, Address>,
    pub instructions: BTreeMap<String, Instruction>,
    pub bundles: BTreeMap<String, ResolvedInstructionBundle>,
    /// Passes the retry loop needed.
    pub passes: usize,
}

#[derive(Debug, Clone, Copy)]
enum Entity<'a> {
    Pda(&'a str),
    Instruction(&'a str),
    Bundle(&'a str),
}

impl Entity<'_> {
    fn label(&self) -> &str {
        match self {
            Entity::Pda(label) | Entity::Instruction(label) | Entity::Bundle(label) => label,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    config: ProjectConfig,
}

impl Project {
    pub fn new(config: ProjectConfig) -> Self {
        Project { config }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::new(ProjectConfig::from_json_str(json)?))
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Resolve every entity in the project into `dispatcher`'s table.
    ///
    /// Accounts, test wallets and decoders have no cross references and go
    /// first. PDAs, instructions and bundles then run in passes; an entity
    /// failing with `UnresolvedReference` is deferred to the next pass. A
    /// pass that resolves nothing ends the loop with the first deferred
    /// error. Any other error aborts immediately.
    pub fn resolve_all(
        &self,
        dispatcher: &mut Dispatcher,
        session: &WalletSession,
    ) -> Result<ResolutionReport> {
        let mut report = ResolutionReport {
            accounts: dispatcher.declare_accounts(&self.config.accounts)?,
            ..ResolutionReport::default()
        };

        for (label, pattern) in &self.config.test_wallets {
            let keypair = dispatcher.declare_test_wallet(label, pattern)?;
            report.test_wallets.insert(label.clone(), keypair);
        }
        for (name, fields) in &self.config.decoders {
            let handle = dispatcher.declare_decoder(name, fields)?;
            report.decoders.insert(name.clone(), handle);
        }

        let mut pending: Vec<Entity<'_>> = self
            .config
            .pdas
            .keys()
            .map(|l| Entity::Pda(l.as_str()))
            .chain(self.config.instructions.keys().map(|l| Entity::Instruction(l.as_str())))
            .chain(self.config.bundles.keys().map(|l| Entity::Bundle(l.as_str())))
            .collect();

        while !pending.is_empty() {
            report.passes += 1;
            let attempted = pending.len();
            let mut deferred = Vec::new();
            let mut first_error = None;

            for entity in pending {
                match self.resolve_entity(entity, dispatcher, session, &mut report) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::UnresolvedReference => {
                        warn!(entity = entity.label(), pass = report.passes, %err, "deferred");
                        first_error.get_or_insert(err);
                        deferred.push(entity);
                    }
                    Err(err) => return Err(err),
                }
            }

            if let Some(err) = first_error {
                if deferred.len() == attempted {
                    return Err(err);
                }
            }
            pending = deferred;
        }

        debug!(
            symbols = dispatcher.symbols().len(),
            passes = report.passes,
            "project resolved"
        );
        Ok(report)
    }

    fn resolve_entity(
        &self,
        entity: Entity<'_>,
        dispatcher: &mut Dispatcher,
        session: &WalletSession,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        match entity {
            Entity::Pda(label) => {
                let address = dispatcher.resolve_pda(label, &self.config.pdas[label])?;
                report.pdas.insert(label.to_string(), address);
            }
            Entity::Instruction(label) => {
                let ix = dispatcher.resolve_instruction(label, &self.config.instructions[label])?;
                report.instructions.insert(label.to_string(), ix);
            }
            Entity::Bundle(label) => {
                let bundle = dispatcher.resolve_bundle(
                    label,
                    &self.config.bundles[label],
                    &self.config.instructions,
                    session,
                )?;
                report.bundles.insert(label.to_string(), bundle);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    #[test]
    fn out_of_order_pdas_resolve_in_later_passes() {
        // `a_child` sorts first but seeds from `z_parent`.
        let project = Project::from_json_str(
            r#"{
                "pdas": {
                    "a_child": { "programId": "$system_program", "seeds": ["child", "$z_parent"] },
                    "z_parent": { "programId": "$system_program", "seeds": ["parent"] }
                }
            }"#,
        )
        .unwrap();
        let mut d = Dispatcher::new("/p");
        let report = project.resolve_all(&mut d, &WalletSession::new()).unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.pdas.len(), 2);
        assert_eq!(
            d.symbols().get("a_child"),
            Some(&TypedValue::Address(report.pdas["a_child"]))
        );
    }

    #[test]
    fn stalled_loop_reports_first_unresolved_reference() {
        let project = Project::from_json_str(
            r#"{ "pdas": { "x": { "programId": "$system_program", "seeds": ["$ghost"] } } }"#,
        )
        .unwrap();
        let mut d = Dispatcher::new("/p");
        let err = project.resolve_all(&mut d, &WalletSession::new()).unwrap_err();
        assert_eq!(err.to_string(), "unresolved reference: $ghost");
    }

    #[test]
    fn other_errors_abort_immediately() {
        let project = Project::from_json_str(
            r#"{ "instructions": { "ix": { "programId": "$system_program", "data": ["bytes(999)"] } } }"#,
        )
        .unwrap();
        let mut d = Dispatcher::new("/p");
        let err = project.resolve_all(&mut d, &WalletSession::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);
    }

    #[test]
    fn empty_project_resolves_in_no_passes() {
        let mut d = Dispatcher::new("/p");
        let report = Project::default()
            .resolve_all(&mut d, &WalletSession::new())
            .unwrap();
        assert_eq!(report.passes, 0);
    }
}
