//! Routes a pattern and its resolution context to the right resolver.

use std::path::{Path, PathBuf};

use chain_sol::{AccountMeta, Address, Keypair, MAX_SEED_LEN};
use tracing::debug;

use crate::codec::{AccountDecoderHandle, FieldDescriptor};
use crate::context::ResolutionContext;
use crate::error::{ResolveError, Result};
use crate::pattern::{is_identifier, parse_account_decl, MetaPattern, Pattern};
use crate::symbols::SymbolTable;
use crate::types::DataType;
use crate::value::{
    classify_literal, FunctionDeclaration, TypedValue, TypedVariableDeclaration,
};

/// The resolution engine.
///
/// Owns the symbol table. [`resolve`](Self::resolve) is a pure read of the
/// table; the declarative procedures (accounts, PDAs, instructions,
/// bundles, decoders) commit their results back into it.
#[derive(Debug)]
pub struct Dispatcher {
    pub(crate) symbols: SymbolTable,
    project_root: PathBuf,
}

impl Dispatcher {
    /// A dispatcher whose table holds the well-known program addresses.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::with_symbols(project_root, SymbolTable::with_well_known())
    }

    pub fn with_symbols(project_root: impl Into<PathBuf>, symbols: SymbolTable) -> Self {
        Dispatcher {
            symbols,
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn resolve(&self, pattern: &str, context: ResolutionContext) -> Result<TypedValue> {
        self.resolve_with_hint(pattern, context, None)
    }

    /// Resolve `pattern` under `context`.
    ///
    /// `hint` is the declared type where the caller has one: bundle
    /// variables coerce to it, literals take its integer width.
    pub fn resolve_with_hint(
        &self,
        pattern: &str,
        context: ResolutionContext,
        hint: Option<DataType>,
    ) -> Result<TypedValue> {
        use ResolutionContext as Ctx;

        match context {
            Ctx::AccountDeclaration => Ok(TypedValue::AccountDecl(parse_account_decl(
                pattern,
                &self.project_root,
            )?)),
            Ctx::PdaSeed => Ok(TypedValue::ByteBuffer(self.seed_bytes(pattern, 0)?)),
            Ctx::AddressResolution => Ok(TypedValue::Address(self.resolve_address(pattern)?)),
            Ctx::DataResolution => Ok(TypedValue::ByteBuffer(self.data_bytes(pattern, hint)?)),
            Ctx::MetaResolution => Ok(TypedValue::AccountMeta(self.resolve_meta(pattern)?)),
            Ctx::VariableResolution => self.resolve_variable(pattern, hint),
            Ctx::AccountDecoderDeclaration => {
                Ok(TypedValue::AccountDecoderDecl(FieldDescriptor::parse(pattern)?))
            }
            Ctx::DynamicInstructionDeclaration => match self.labelled(pattern)? {
                TypedValue::DynamicInstruction(inner) => {
                    Ok(TypedValue::DynamicInstruction(inner.clone()))
                }
                other => Err(ResolveError::mismatch("dynamic instruction", other.tag_name())),
            },
            Ctx::TestWalletDeclaration => Ok(TypedValue::Keypair(self.resolve_keypair(pattern)?)),
            Ctx::InstructionResolution => match self.labelled(pattern)? {
                TypedValue::Instruction(inner) => {
                    Ok(TypedValue::Instruction(inner.clone()))
                }
                other => Err(ResolveError::mismatch("instruction", other.tag_name())),
            },
            Ctx::InstructionBundleResolution => match self.labelled(pattern)? {
                TypedValue::InstructionBundle(inner) => {
                    Ok(TypedValue::InstructionBundle(inner.clone()))
                }
                other => Err(ResolveError::mismatch("instruction bundle", other.tag_name())),
            },
            Ctx::DeclarationSyntax => self.resolve_declaration(pattern),
            Ctx::Literal => classify_literal(pattern.trim(), hint.and_then(|t| t.int_width())),
        }
    }

    // -- Per-context resolvers ----------------------------------------------

    /// An address from `$var` (address or keypair) or a Base58 literal.
    pub fn resolve_address(&self, pattern: &str) -> Result<Address> {
        match Pattern::parse(pattern)? {
            Pattern::Variable(name)
            | Pattern::TypedVariable {
                name,
                data_type: DataType::Pubkey,
            } => self.symbols.lookup(&name)?.as_address(),
            Pattern::Literal(text) => text
                .parse()
                .map_err(|e| ResolveError::syntax(pattern, format!("{e}"))),
            _ => Err(ResolveError::syntax(pattern, "expected an address or $var")),
        }
    }

    fn resolve_meta(&self, pattern: &str) -> Result<AccountMeta> {
        let meta = MetaPattern::parse(pattern)?;
        let pubkey = match meta.target {
            Pattern::Variable(name) => self.symbols.lookup(&name)?.as_address()?,
            Pattern::Literal(text) => text
                .parse()
                .map_err(|e| ResolveError::syntax(pattern, format!("{e}")))?,
            _ => return Err(ResolveError::syntax(pattern, "expected an address or $var")),
        };
        Ok(AccountMeta::new(pubkey, meta.is_signer, meta.is_writable))
    }

    /// Instruction-data bytes for one pattern.
    ///
    /// Typed references serialise at their declared width; bare references
    /// and literals serialise by their own tag.
    pub(crate) fn data_bytes(&self, pattern: &str, hint: Option<DataType>) -> Result<Vec<u8>> {
        match Pattern::parse(pattern)? {
            Pattern::Sighash(name) => Ok(chain_sol::sighash(&name).to_vec()),
            Pattern::Bytes(bytes) | Pattern::FromBase64(bytes) | Pattern::Hex(bytes) => Ok(bytes),
            Pattern::Usize(n) => Ok(n.to_le_bytes().to_vec()),
            Pattern::U32(n) => Ok(n.to_le_bytes().to_vec()),
            Pattern::TypedVariable { name, data_type } => self
                .symbols
                .lookup(&name)?
                .coerce(data_type)?
                .to_data_bytes(),
            Pattern::Variable(name) => {
                let value = self.symbols.lookup(&name)?;
                match hint {
                    Some(target) => value.coerce(target)?.to_data_bytes(),
                    None => value.to_data_bytes(),
                }
            }
            Pattern::Literal(text) => {
                let value = classify_literal(&text, hint.and_then(|t| t.int_width()))?;
                match hint {
                    Some(target) => value.coerce(target)?.to_data_bytes(),
                    None => value.to_data_bytes(),
                }
            }
        }
    }

    /// Seed bytes for the seed at `index` of a PDA declaration.
    pub(crate) fn seed_bytes(&self, pattern: &str, index: usize) -> Result<Vec<u8>> {
        let bytes = match Pattern::parse(pattern)? {
            Pattern::Literal(text) => text.into_bytes(),
            Pattern::Variable(name) => self.symbols.lookup(&name)?.to_seed_bytes()?,
            Pattern::TypedVariable {
                name,
                data_type: data_type @ (DataType::String | DataType::Pubkey),
            } => self
                .symbols
                .lookup(&name)?
                .coerce(data_type)?
                .to_seed_bytes()?,
            _ => self.data_bytes(pattern, None)?,
        };
        if bytes.len() > MAX_SEED_LEN {
            return Err(ResolveError::InvalidSeedLength {
                index,
                len: bytes.len(),
            });
        }
        Ok(bytes)
    }

    fn resolve_variable(&self, pattern: &str, hint: Option<DataType>) -> Result<TypedValue> {
        let value = match Pattern::parse(pattern)? {
            Pattern::Variable(name) => self.symbols.lookup(&name)?.clone(),
            Pattern::TypedVariable { name, data_type } => {
                self.symbols.lookup(&name)?.coerce(data_type)?
            }
            Pattern::Usize(n) => TypedValue::Usize(n),
            Pattern::U32(n) => TypedValue::U32(n),
            Pattern::Sighash(name) => TypedValue::ByteBuffer(chain_sol::sighash(&name).to_vec()),
            Pattern::Bytes(bytes) | Pattern::FromBase64(bytes) | Pattern::Hex(bytes) => {
                TypedValue::ByteBuffer(bytes)
            }
            Pattern::Literal(text) => return literal_as(&text, hint),
        };
        match hint {
            Some(target) => value.coerce(target),
            None => Ok(value),
        }
    }

    fn resolve_keypair(&self, pattern: &str) -> Result<Keypair> {
        match Pattern::parse(pattern)? {
            Pattern::Variable(name) => match self.symbols.lookup(&name)? {
                TypedValue::Keypair(keypair) => Ok(keypair.clone()),
                other => Err(ResolveError::mismatch("keypair", other.tag_name())),
            },
            Pattern::Literal(text) => Keypair::from_base64(&text)
                .map_err(|e| ResolveError::syntax(pattern, format!("{e}"))),
            _ => Err(ResolveError::syntax(pattern, "expected a base64 keypair or $var")),
        }
    }

    fn resolve_declaration(&self, pattern: &str) -> Result<TypedValue> {
        let parsed = Pattern::parse(pattern)?;
        let function = parsed.function_name();
        match parsed {
            Pattern::TypedVariable { name, data_type } => {
                Ok(TypedValue::VariableDecl(TypedVariableDeclaration { data_type, name }))
            }
            Pattern::Usize(n) => Ok(TypedValue::FunctionDecl(FunctionDeclaration {
                data_type: DataType::Usize,
                name: function.unwrap_or("usize").to_string(),
                literal_result: n.to_le_bytes().to_vec(),
            })),
            Pattern::U32(n) => Ok(TypedValue::FunctionDecl(FunctionDeclaration {
                data_type: DataType::U32,
                name: function.unwrap_or("u32").to_string(),
                literal_result: n.to_le_bytes().to_vec(),
            })),
            _ => Err(ResolveError::syntax(
                pattern,
                "expected $name:TYPE, usize(n) or u32(n)",
            )),
        }
    }

    /// Look up a symbol named by `label` or `$label`.
    fn labelled(&self, pattern: &str) -> Result<&TypedValue> {
        let text = pattern.trim();
        let name = text.strip_prefix('$').unwrap_or(text);
        if !is_identifier(name) {
            return Err(ResolveError::syntax(pattern, "expected a label"));
        }
        self.symbols.lookup(name)
    }

    // -- Decoder writes -----------------------------------------------------

    /// Resolve `pattern` and write it into `label` of the decoder stored
    /// under `decoder`.
    ///
    /// Literals are read at the field's width; references are written with
    /// their own tag and range-checked by the codec.
    pub fn write_decoder_field(&self, decoder: &str, label: &str, pattern: &str) -> Result<()> {
        let handle = self.decoder(decoder)?;
        let field = handle.field(label)?;
        let value = match Pattern::parse(pattern)? {
            Pattern::Literal(text) => classify_literal(&text, field.data_type.int_width())?,
            _ => self.resolve_variable(pattern, None)?,
        };
        handle.set(label, &value)?;
        debug!(decoder, field = label, value = %value, "decoder field written");
        Ok(())
    }

    /// The decoder handle stored under `name`.
    pub fn decoder(&self, name: &str) -> Result<AccountDecoderHandle> {
        match self.symbols.lookup(name)? {
            TypedValue::AccountDecoder(handle) => Ok(handle.clone()),
            other => Err(ResolveError::mismatch("account decoder", other.tag_name())),
        }
    }
}

/// A literal read as `hint`, or classified by trial when there is none.
fn literal_as(text: &str, hint: Option<DataType>) -> Result<TypedValue> {
    let Some(target) = hint else {
        return classify_literal(text, None);
    };
    match target {
        DataType::String => Ok(TypedValue::String(text.to_string())),
        DataType::Bool => match text {
            "true" => Ok(TypedValue::Boolean(true)),
            "false" => Ok(TypedValue::Boolean(false)),
            _ => Err(ResolveError::mismatch("bool", text)),
        },
        _ => classify_literal(text, target.int_width())?.coerce(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AccountDecoder;
    use crate::ErrorKind;
    use chain_sol::programs::SYSTEM_PROGRAM_ID;

    fn dispatcher() -> Dispatcher {
        let mut d = Dispatcher::new("/project");
        d.symbols_mut().set("owner", TypedValue::Address(Address::new([9; 32])));
        d.symbols_mut().set("amount", TypedValue::U8(200));
        d.symbols_mut().set("label", TypedValue::String("vault".into()));
        d
    }

    fn bytes(value: TypedValue) -> Vec<u8> {
        match value {
            TypedValue::ByteBuffer(b) => b,
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    // -- Data context -------------------------------------------------------

    #[test]
    fn data_function_forms() {
        let d = dispatcher();
        let data = |p: &str| bytes(d.resolve(p, ResolutionContext::DataResolution).unwrap());

        assert_eq!(hex::encode(data("sighash(initialize)")), "afaf6d1f0d989bed");
        assert_eq!(data("bytes(1,2,3)"), vec![1, 2, 3]);
        assert_eq!(data("hex(ff00)"), vec![0xff, 0]);
        assert_eq!(data("usize(1)"), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(data("u32(258)"), vec![2, 1, 0, 0]);
    }

    #[test]
    fn data_typed_variable_widens() {
        let d = dispatcher();
        let data = d.resolve("$amount:u32", ResolutionContext::DataResolution).unwrap();
        assert_eq!(bytes(data), vec![200, 0, 0, 0]);

        let err = d.resolve("$owner:u32", ResolutionContext::DataResolution).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn data_typed_variable_never_narrows() {
        let mut d = dispatcher();
        d.symbols_mut().set("wide", TypedValue::U32(1));
        let err = d.resolve("$wide:u8", ResolutionContext::DataResolution).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn data_string_is_length_prefixed() {
        let d = dispatcher();
        let data = d.resolve("$label:string", ResolutionContext::DataResolution).unwrap();
        assert_eq!(bytes(data), b"\x05\x00\x00\x00vault".to_vec());
    }

    #[test]
    fn data_missing_variable_is_unresolved() {
        let d = dispatcher();
        let err = d.resolve("$nope:u8", ResolutionContext::DataResolution).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    // -- Address and meta contexts ------------------------------------------

    #[test]
    fn address_from_variable_literal_and_keypair() {
        let mut d = dispatcher();
        let kp = Keypair::from_seed(&[1; 32]);
        d.symbols_mut().set("signer", TypedValue::Keypair(kp.clone()));

        assert_eq!(d.resolve_address("$owner").unwrap(), Address::new([9; 32]));
        assert_eq!(d.resolve_address("$signer").unwrap(), kp.pubkey());
        assert_eq!(
            d.resolve_address("$system_program").unwrap(),
            SYSTEM_PROGRAM_ID
        );
        assert_eq!(
            d.resolve_address("11111111111111111111111111111111").unwrap(),
            SYSTEM_PROGRAM_ID
        );
        assert_eq!(
            d.resolve_address("$label").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            d.resolve_address("not base58!").unwrap_err().kind(),
            ErrorKind::SyntaxInvalid
        );
    }

    #[test]
    fn meta_context() {
        let d = dispatcher();
        let meta = d.resolve("$owner,signer,mut", ResolutionContext::MetaResolution).unwrap();
        assert_eq!(
            meta,
            TypedValue::AccountMeta(AccountMeta::new(Address::new([9; 32]), true, true))
        );
    }

    // -- Seed context -------------------------------------------------------

    #[test]
    fn seed_forms() {
        let d = dispatcher();
        let seed = |p: &str| bytes(d.resolve(p, ResolutionContext::PdaSeed).unwrap());

        assert_eq!(seed("vault"), b"vault".to_vec());
        assert_eq!(seed("$owner"), vec![9; 32]);
        assert_eq!(seed("$label"), b"vault".to_vec());
        assert_eq!(seed("$amount:u64"), vec![200, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn seed_rejects_integers_without_a_type() {
        let d = dispatcher();
        let err = d.resolve("$amount", ResolutionContext::PdaSeed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn seed_length_boundary() {
        let d = dispatcher();
        let ok = "a".repeat(32);
        assert_eq!(d.seed_bytes(&ok, 0).unwrap().len(), 32);

        let err = d.seed_bytes(&"a".repeat(33), 3).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSeedLength { index: 3, len: 33 }));
    }

    #[test]
    fn typed_string_and_pubkey_seeds_are_raw_bytes() {
        let mut d = dispatcher();
        assert_eq!(d.seed_bytes("$label:string", 0).unwrap(), b"vault".to_vec());
        assert_eq!(d.seed_bytes("$owner:pubkey", 0).unwrap(), vec![9; 32]);

        d.symbols_mut().set("long", TypedValue::String("a".repeat(32)));
        assert_eq!(
            d.seed_bytes("$long:string", 0).unwrap(),
            d.seed_bytes("$long", 0).unwrap()
        );
        assert_eq!(d.seed_bytes("$long:string", 0).unwrap().len(), 32);

        d.symbols_mut().set("long", TypedValue::String("a".repeat(33)));
        let err = d.seed_bytes("$long:string", 1).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSeedLength { index: 1, len: 33 }));
    }

    // -- Variable, declaration and literal contexts -------------------------

    #[test]
    fn variable_context_coerces_to_hint() {
        let d = dispatcher();
        let v = d
            .resolve_with_hint("$amount", ResolutionContext::VariableResolution, Some(DataType::U64))
            .unwrap();
        assert_eq!(v, TypedValue::U64(200));

        let v = d
            .resolve_with_hint("70000", ResolutionContext::VariableResolution, Some(DataType::U32))
            .unwrap();
        assert_eq!(v, TypedValue::U32(70_000));

        let err = d
            .resolve_with_hint("70000", ResolutionContext::VariableResolution, Some(DataType::U16))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);

        let v = d
            .resolve_with_hint("hello", ResolutionContext::VariableResolution, Some(DataType::String))
            .unwrap();
        assert_eq!(v, TypedValue::String("hello".into()));
    }

    #[test]
    fn declaration_context() {
        let d = dispatcher();
        assert_eq!(
            d.resolve("$n:u16", ResolutionContext::DeclarationSyntax).unwrap(),
            TypedValue::VariableDecl(TypedVariableDeclaration {
                data_type: DataType::U16,
                name: "n".into()
            })
        );
        assert_eq!(
            d.resolve("u32(5)", ResolutionContext::DeclarationSyntax).unwrap(),
            TypedValue::FunctionDecl(FunctionDeclaration {
                data_type: DataType::U32,
                name: "u32".into(),
                literal_result: vec![5, 0, 0, 0],
            })
        );
        assert_eq!(
            d.resolve("$n", ResolutionContext::DeclarationSyntax).unwrap_err().kind(),
            ErrorKind::SyntaxInvalid
        );
    }

    #[test]
    fn literal_context_classifies() {
        let d = dispatcher();
        assert_eq!(
            d.resolve("12", ResolutionContext::Literal).unwrap(),
            TypedValue::U64(12)
        );
        assert_eq!(
            d.resolve_with_hint("12", ResolutionContext::Literal, Some(DataType::I8))
                .unwrap(),
            TypedValue::I8(12)
        );
    }

    #[test]
    fn labelled_contexts_check_the_tag() {
        let d = dispatcher();
        assert_eq!(
            d.resolve("$owner", ResolutionContext::InstructionResolution)
                .unwrap_err()
                .kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            d.resolve("missing", ResolutionContext::InstructionBundleResolution)
                .unwrap_err()
                .kind(),
            ErrorKind::UnresolvedReference
        );
    }

    #[test]
    fn test_wallet_context() {
        let d = dispatcher();
        let kp = Keypair::from_seed(&[3; 32]);
        assert_eq!(
            d.resolve(&kp.to_base64(), ResolutionContext::TestWalletDeclaration).unwrap(),
            TypedValue::Keypair(kp)
        );
        assert_eq!(
            d.resolve("$owner", ResolutionContext::TestWalletDeclaration)
                .unwrap_err()
                .kind(),
            ErrorKind::TypeMismatch
        );
    }

    // -- Decoder writes -----------------------------------------------------

    #[test]
    fn write_decoder_field_from_patterns() {
        let mut d = dispatcher();
        let fields = vec![
            FieldDescriptor::new("amount", DataType::U64, 0).unwrap(),
            FieldDescriptor::new("small", DataType::U8, 8).unwrap(),
        ];
        let handle = AccountDecoderHandle::new(
            "state",
            AccountDecoder::with_data(fields, vec![0; 9]).unwrap(),
        );
        d.symbols_mut().set("state", TypedValue::AccountDecoder(handle.clone()));

        d.write_decoder_field("state", "amount", "1000000").unwrap();
        d.write_decoder_field("state", "small", "$amount").unwrap();
        assert_eq!(handle.get("amount").unwrap(), TypedValue::U64(1_000_000));
        assert_eq!(handle.get("small").unwrap(), TypedValue::U8(200));

        let err = d.write_decoder_field("state", "small", "256").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);
        assert_eq!(handle.get("small").unwrap(), TypedValue::U8(200));
    }
}
