//! Declarative procedures: resolve a whole entity, then commit it.
//!
//! Each procedure resolves every pattern of its entity before touching the
//! symbol table, so a failure leaves no partial entity behind. Bundle
//! variables are the exception: they are bound one by one as the bundle
//! resolves and stay bound if a later step fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use chain_sol::{find_program_address, Address, Instruction, Keypair};
use serde_json::Value;
use tracing::debug;

use crate::codec::{AccountDecoder, AccountDecoderHandle};
use crate::config::{BundleDecl, BundleVariable, InstructionDecl, PdaDecl};
use crate::context::ResolutionContext;
use crate::dispatcher::Dispatcher;
use crate::dynamic::{DynamicInstructionHandle, InstructionGenerator};
use crate::error::{ResolveError, Result};
use crate::session::WalletSession;
use crate::value::{classify, AccountDeclSyntax, ResolvedInstructionBundle, TypedValue};

impl Dispatcher {
    // -- Accounts -----------------------------------------------------------

    /// Resolve every account declaration, then store each address under its
    /// label. Returns the declarations so the caller can load their files.
    pub fn declare_accounts(
        &mut self,
        accounts: &BTreeMap<String, String>,
    ) -> Result<Vec<(String, AccountDeclSyntax)>> {
        let resolved = accounts
            .iter()
            .map(|(label, pattern)| Ok((label.clone(), self.account_decl(pattern)?)))
            .collect::<Result<Vec<_>>>()?;

        for (label, decl) in &resolved {
            self.symbols
                .set(label.as_str(), TypedValue::Address(decl.address));
        }
        Ok(resolved)
    }

    pub fn declare_account(&mut self, label: &str, pattern: &str) -> Result<AccountDeclSyntax> {
        let decl = self.account_decl(pattern)?;
        self.symbols.set(label, TypedValue::Address(decl.address));
        Ok(decl)
    }

    fn account_decl(&self, pattern: &str) -> Result<AccountDeclSyntax> {
        match self.resolve(pattern, ResolutionContext::AccountDeclaration)? {
            TypedValue::AccountDecl(decl) => Ok(decl),
            other => Err(ResolveError::mismatch("account declaration", other.tag_name())),
        }
    }

    // -- PDAs ---------------------------------------------------------------

    /// Derive the PDA declared under `label` and store its address.
    pub fn resolve_pda(&mut self, label: &str, decl: &PdaDecl) -> Result<Address> {
        let program_id = self.resolve_address(&decl.program_id)?;
        let seeds = decl
            .seeds
            .iter()
            .enumerate()
            .map(|(index, seed)| self.seed_bytes(seed, index))
            .collect::<Result<Vec<_>>>()?;
        let seed_refs: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();

        let (address, bump) = find_program_address(&seed_refs, &program_id)?;
        debug!(pda = label, %address, bump, "derived program address");
        self.symbols.set(label, TypedValue::Address(address));
        Ok(address)
    }

    // -- Instructions -------------------------------------------------------

    /// Assemble the instruction declared under `label` and store it.
    pub fn resolve_instruction(
        &mut self,
        label: &str,
        decl: &InstructionDecl,
    ) -> Result<Instruction> {
        let instruction = self.build_instruction(decl)?;
        self.symbols
            .set(label, TypedValue::Instruction(instruction.clone()));
        Ok(instruction)
    }

    fn build_instruction(&self, decl: &InstructionDecl) -> Result<Instruction> {
        let program_id = self.resolve_address(&decl.program_id)?;

        let mut data = Vec::new();
        for pattern in &decl.data {
            data.extend(self.data_bytes(pattern, None)?);
        }

        let accounts = decl
            .accounts
            .iter()
            .map(|pattern| match self.resolve(pattern, ResolutionContext::MetaResolution)? {
                TypedValue::AccountMeta(meta) => Ok(meta),
                other => Err(ResolveError::mismatch("account meta", other.tag_name())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Instruction::new(program_id, accounts, data))
    }

    // -- Decoders, test wallets, dynamic instructions -----------------------

    /// Build a decoder with an empty buffer from its field descriptors and
    /// store the handle under `name`.
    pub fn declare_decoder(
        &mut self,
        name: &str,
        fields: &[String],
    ) -> Result<AccountDecoderHandle> {
        let descriptors = fields
            .iter()
            .map(|pattern| {
                match self.resolve(pattern, ResolutionContext::AccountDecoderDeclaration)? {
                    TypedValue::AccountDecoderDecl(field) => Ok(field),
                    other => Err(ResolveError::mismatch(
                        "account decoder field",
                        other.tag_name(),
                    )),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let handle = AccountDecoderHandle::new(name, AccountDecoder::new(descriptors)?);
        self.symbols
            .set(name, TypedValue::AccountDecoder(handle.clone()));
        Ok(handle)
    }

    pub fn declare_test_wallet(&mut self, label: &str, pattern: &str) -> Result<Keypair> {
        match self.resolve(pattern, ResolutionContext::TestWalletDeclaration)? {
            TypedValue::Keypair(keypair) => {
                self.symbols.set(label, TypedValue::Keypair(keypair.clone()));
                Ok(keypair)
            }
            other => Err(ResolveError::mismatch("keypair", other.tag_name())),
        }
    }

    pub fn register_dynamic_instruction(
        &mut self,
        label: &str,
        generator: Arc<dyn InstructionGenerator>,
    ) -> DynamicInstructionHandle {
        let handle = DynamicInstructionHandle::new(label, generator);
        self.symbols
            .set(label, TypedValue::DynamicInstruction(handle.clone()));
        handle
    }

    // -- Bundles ------------------------------------------------------------

    /// Resolve the bundle declared under `label` and store it, replacing any
    /// previous value.
    ///
    /// Variables are bound first; static instructions are then resolved from
    /// `instructions` (or taken from the table when already resolved), and
    /// dynamic ones are generated against the freshly bound variables.
    pub fn resolve_bundle(
        &mut self,
        label: &str,
        decl: &BundleDecl,
        instructions: &BTreeMap<String, InstructionDecl>,
        session: &WalletSession,
    ) -> Result<ResolvedInstructionBundle> {
        for variable in &decl.variables {
            let value = self.bind_value(variable)?;
            self.symbols.set(variable.name.as_str(), value);
        }

        let labels = decl
            .instructions
            .iter()
            .map(|reference| {
                let name = reference.trim();
                name.strip_prefix('$').unwrap_or(name).to_string()
            })
            .collect::<Vec<_>>();

        for name in &labels {
            if matches!(self.symbols.get(name), Some(TypedValue::DynamicInstruction(_))) {
                continue;
            }
            match instructions.get(name) {
                Some(ix_decl) => {
                    self.resolve_instruction(name, ix_decl)?;
                }
                None => {
                    self.resolve(name, ResolutionContext::InstructionResolution)?;
                }
            }
        }

        let mut resolved = Vec::new();
        for name in &labels {
            match self.symbols.lookup(name)? {
                TypedValue::DynamicInstruction(handle) => {
                    handle.extend(&self.symbols, &mut resolved)?;
                }
                TypedValue::Instruction(ix) => resolved.push(ix.clone()),
                other => return Err(ResolveError::mismatch("instruction", other.tag_name())),
            }
        }

        let lookup_tables = decl
            .lookup_tables
            .iter()
            .map(|pattern| self.resolve_address(pattern))
            .collect::<Result<Vec<_>>>()?;

        let payer = match &decl.payer {
            Some(pattern) => {
                match self.resolve(pattern, ResolutionContext::TestWalletDeclaration)? {
                    TypedValue::Keypair(keypair) => keypair,
                    other => return Err(ResolveError::mismatch("keypair", other.tag_name())),
                }
            }
            None => session
                .signer()
                .cloned()
                .ok_or_else(|| ResolveError::UnresolvedReference("payer".into()))?,
        };

        let bundle = ResolvedInstructionBundle {
            lookup_tables,
            payer,
            instructions: resolved,
        };
        debug!(
            bundle = label,
            instructions = bundle.instructions.len(),
            payer = %bundle.payer.pubkey(),
            "instruction bundle resolved"
        );
        self.symbols
            .set(label, TypedValue::InstructionBundle(bundle.clone()));
        Ok(bundle)
    }

    fn bind_value(&self, variable: &BundleVariable) -> Result<TypedValue> {
        let target = variable.data_type;
        match &variable.value {
            Value::String(pattern) => {
                self.resolve_with_hint(pattern, ResolutionContext::VariableResolution, Some(target))
            }
            raw => classify(raw, target.int_width())?.coerce(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use crate::ErrorKind;
    use chain_sol::programs::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
    use chain_sol::AccountMeta;
    use serde_json::json;

    const MINT: &str = "So11111111111111111111111111111111111111112";

    fn pda(program_id: &str, seeds: &[&str]) -> PdaDecl {
        PdaDecl {
            program_id: program_id.into(),
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn instruction(program_id: &str, data: &[&str], accounts: &[&str]) -> InstructionDecl {
        InstructionDecl {
            program_id: program_id.into(),
            data: data.iter().map(|s| s.to_string()).collect(),
            accounts: accounts.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn variable(name: &str, data_type: DataType, value: Value) -> BundleVariable {
        BundleVariable {
            name: name.into(),
            data_type,
            value,
        }
    }

    // -- Accounts -----------------------------------------------------------

    #[test]
    fn accounts_commit_all_or_nothing() {
        let mut d = Dispatcher::new("/p");
        let before = d.symbols().len();

        let mut accounts = BTreeMap::new();
        accounts.insert("a_good".to_string(), MINT.to_string());
        accounts.insert("b_bad".to_string(), "nope".to_string());
        assert!(d.declare_accounts(&accounts).is_err());
        assert_eq!(d.symbols().len(), before);
        assert!(!d.symbols().contains("a_good"));

        accounts.remove("b_bad");
        let declared = d.declare_accounts(&accounts).unwrap();
        assert_eq!(declared.len(), 1);
        assert_eq!(
            d.symbols().get("a_good"),
            Some(&TypedValue::Address(MINT.parse().unwrap()))
        );
    }

    // -- PDAs ---------------------------------------------------------------

    #[test]
    fn associated_token_account_derivation() {
        let mut d = Dispatcher::new("/p");
        let owner = Keypair::from_seed(&[5; 32]).pubkey();
        d.symbols_mut().set("owner", TypedValue::Address(owner));
        d.declare_account("mint", MINT).unwrap();

        let address = d
            .resolve_pda(
                "ata",
                &pda("$associated_token_program", &["$owner", "$token_program", "$mint"]),
            )
            .unwrap();

        let mint: Address = MINT.parse().unwrap();
        let (expected, _) = find_program_address(
            &[
                &owner.as_bytes()[..],
                &TOKEN_PROGRAM_ID.as_bytes()[..],
                &mint.as_bytes()[..],
            ],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        )
        .unwrap();
        assert_eq!(address, expected);
        assert_eq!(d.symbols().get("ata"), Some(&TypedValue::Address(expected)));
    }

    #[test]
    fn pda_failure_commits_nothing() {
        let mut d = Dispatcher::new("/p");
        let long = "x".repeat(33);
        let err = d
            .resolve_pda("vault", &pda("$system_program", &["ok", &long]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSeedLength { index: 1, len: 33 }));
        assert!(!d.symbols().contains("vault"));
    }

    #[test]
    fn pda_with_unknown_seed_reference() {
        let mut d = Dispatcher::new("/p");
        let err = d.resolve_pda("vault", &pda("$system_program", &["$ghost"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    // -- Instructions -------------------------------------------------------

    #[test]
    fn instruction_concatenates_data_in_order() {
        let mut d = Dispatcher::new("/p");
        d.symbols_mut().set("amount", TypedValue::U64(1_000_000));
        d.declare_account("mint", MINT).unwrap();

        let ix = d
            .resolve_instruction(
                "init",
                &instruction(
                    "$token_program",
                    &["bytes(7)", "$amount:u64", "u32(1)"],
                    &["$mint,mut", "$system_program"],
                ),
            )
            .unwrap();

        assert_eq!(ix.program_id, TOKEN_PROGRAM_ID);
        assert_eq!(
            ix.data,
            vec![7, 0x40, 0x42, 0x0f, 0, 0, 0, 0, 0, 1, 0, 0, 0]
        );
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(MINT.parse().unwrap(), false, true),
                AccountMeta::new(Address::new([0; 32]), false, false),
            ]
        );
        assert_eq!(d.symbols().get("init"), Some(&TypedValue::Instruction(ix)));
    }

    // -- Decoders and wallets -----------------------------------------------

    #[test]
    fn decoder_declaration_stores_empty_handle() {
        let mut d = Dispatcher::new("/p");
        let handle = d
            .declare_decoder("state", &["$amount:u64,8".into(), "$flag:bool,16".into()])
            .unwrap();
        assert!(handle.data().is_empty());
        assert_eq!(d.decoder("state").unwrap(), handle);

        handle.load(vec![0; 24]);
        d.write_decoder_field("state", "flag", "true").unwrap();
        assert_eq!(handle.get("flag").unwrap(), TypedValue::Boolean(true));
    }

    #[test]
    fn decoder_with_duplicate_labels_is_rejected() {
        let mut d = Dispatcher::new("/p");
        let err = d
            .declare_decoder("state", &["$a:u8,0".into(), "$a:u16,1".into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxInvalid);
        assert!(!d.symbols().contains("state"));
    }

    #[test]
    fn test_wallet_from_reference() {
        let mut d = Dispatcher::new("/p");
        let kp = Keypair::from_seed(&[2; 32]);
        d.declare_test_wallet("alice", &kp.to_base64()).unwrap();
        let copy = d.declare_test_wallet("alias", "$alice").unwrap();
        assert_eq!(copy, kp);
    }

    // -- Bundles ------------------------------------------------------------

    #[test]
    fn bundle_binds_variables_and_generates_dynamic_instructions() {
        let mut d = Dispatcher::new("/p");
        let signer = Keypair::from_seed(&[6; 32]);
        let session = WalletSession::unlocked(signer.clone());

        d.register_dynamic_instruction(
            "memo",
            Arc::new(|symbols: &crate::SymbolTable| -> Result<Vec<Instruction>> {
                let data = symbols.lookup("note")?.to_data_bytes()?;
                Ok(vec![Instruction::new(chain_sol::programs::MEMO_PROGRAM_ID, vec![], data)])
            }),
        );

        let mut instructions = BTreeMap::new();
        instructions.insert(
            "transfer".to_string(),
            instruction("$system_program", &["u32(2)", "$lamports:u64"], &[]),
        );
        let decl = BundleDecl {
            variables: vec![
                variable("lamports", DataType::U64, json!(5000)),
                variable("note", DataType::String, json!("hi")),
            ],
            instructions: vec!["transfer".into(), "$memo".into()],
            lookup_tables: vec![],
            payer: None,
        };

        let bundle = d.resolve_bundle("send", &decl, &instructions, &session).unwrap();
        assert_eq!(bundle.payer, signer);
        assert_eq!(bundle.instructions.len(), 2);
        assert_eq!(bundle.instructions[0].data, vec![2, 0, 0, 0, 0x88, 0x13, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bundle.instructions[1].data, vec![2, 0, 0, 0, b'h', b'i']);
        assert_eq!(d.symbols().get("lamports"), Some(&TypedValue::U64(5000)));
    }

    #[test]
    fn bundle_rerun_replaces_previous_value() {
        let mut d = Dispatcher::new("/p");
        let session = WalletSession::unlocked(Keypair::from_seed(&[6; 32]));
        let mut instructions = BTreeMap::new();
        instructions.insert("ix".to_string(), instruction("$system_program", &["$n:u8"], &[]));

        let mut decl = BundleDecl {
            variables: vec![variable("n", DataType::U8, json!(1))],
            instructions: vec!["ix".into()],
            ..BundleDecl::default()
        };
        d.resolve_bundle("b", &decl, &instructions, &session).unwrap();
        let size = d.symbols().len();

        decl.variables[0].value = json!("2");
        let bundle = d.resolve_bundle("b", &decl, &instructions, &session).unwrap();
        assert_eq!(bundle.instructions.len(), 1);
        assert_eq!(bundle.instructions[0].data, vec![2]);
        assert_eq!(d.symbols().len(), size);
    }

    #[test]
    fn bundle_keeps_variables_bound_before_a_failure() {
        let mut d = Dispatcher::new("/p");
        let session = WalletSession::new();
        let decl = BundleDecl {
            variables: vec![
                variable("first", DataType::U16, json!(7)),
                variable("second", DataType::U8, json!(300)),
            ],
            ..BundleDecl::default()
        };

        let err = d
            .resolve_bundle("b", &decl, &BTreeMap::new(), &session)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);
        assert_eq!(d.symbols().get("first"), Some(&TypedValue::U16(7)));
        assert!(!d.symbols().contains("b"));
    }

    #[test]
    fn bundle_without_payer_needs_an_unlocked_session() {
        let mut d = Dispatcher::new("/p");
        let decl = BundleDecl::default();
        let err = d
            .resolve_bundle("b", &decl, &BTreeMap::new(), &WalletSession::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);

        let kp = Keypair::from_seed(&[1; 32]);
        d.declare_test_wallet("payer", &kp.to_base64()).unwrap();
        let decl = BundleDecl {
            payer: Some("$payer".into()),
            lookup_tables: vec!["$system_program".into()],
            ..BundleDecl::default()
        };
        let bundle = d
            .resolve_bundle("b", &decl, &BTreeMap::new(), &WalletSession::new())
            .unwrap();
        assert_eq!(bundle.payer, kp);
        assert_eq!(bundle.lookup_tables, vec![Address::new([0; 32])]);
    }

    #[test]
    fn bundle_with_unknown_instruction_is_unresolved() {
        let mut d = Dispatcher::new("/p");
        let session = WalletSession::unlocked(Keypair::from_seed(&[6; 32]));
        let decl = BundleDecl {
            instructions: vec!["ghost".into()],
            ..BundleDecl::default()
        };
        let err = d
            .resolve_bundle("b", &decl, &BTreeMap::new(), &session)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }
}
