//! The tagged value model.
//!
//! Every resolved value is a [`TypedValue`]. Resolvers construct the variant
//! they produce directly; [`classify`] and [`classify_literal`] exist only for
//! untagged input coming from configuration documents.

use std::fmt;
use std::path::PathBuf;

use chain_sol::{AccountMeta, Address, Instruction, Keypair};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{AccountDecoderHandle, FieldDescriptor};
use crate::dynamic::DynamicInstructionHandle;
use crate::error::{ResolveError, Result};
use crate::types::{DataType, IntWidth, WideInt};

/// What a declared account file holds, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountFileKind {
    /// A program binary (`.so`).
    Executable,
    /// An account state snapshot (`.json`).
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFile {
    pub path: PathBuf,
    pub kind: AccountFileKind,
}

/// Result of an `ADDRESS[,FILEPATH]` account declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDeclSyntax {
    pub address: Address,
    pub file: Option<AccountFile>,
}

/// `$name:TYPE` seen in declaration context: names a variable without
/// resolving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedVariableDeclaration {
    pub data_type: DataType,
    pub name: String,
}

/// `usize(n)` / `u32(n)` seen in declaration context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub data_type: DataType,
    pub name: String,
    pub literal_result: Vec<u8>,
}

/// Everything needed to build and sign one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstructionBundle {
    pub lookup_tables: Vec<Address>,
    pub payer: Keypair,
    pub instructions: Vec<Instruction>,
}

/// A resolved value. Exactly one tag is active.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Address(Address),
    Keypair(Keypair),
    String(String),
    Boolean(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    U64(u64),
    U128(u128),
    Usize(u64),
    I64(i64),
    I128(i128),
    ByteBuffer(Vec<u8>),
    AccountMeta(AccountMeta),
    AccountDecl(AccountDeclSyntax),
    AccountDecoderDecl(FieldDescriptor),
    AccountDecoder(AccountDecoderHandle),
    DynamicInstruction(DynamicInstructionHandle),
    Instruction(Instruction),
    VariableDecl(TypedVariableDeclaration),
    FunctionDecl(FunctionDeclaration),
    InstructionBundle(ResolvedInstructionBundle),
}

impl TypedValue {
    pub fn tag_name(&self) -> &'static str {
        match self {
            TypedValue::Address(_) => "address",
            TypedValue::Keypair(_) => "keypair",
            TypedValue::String(_) => "string",
            TypedValue::Boolean(_) => "bool",
            TypedValue::U8(_) => "u8",
            TypedValue::U16(_) => "u16",
            TypedValue::U32(_) => "u32",
            TypedValue::I8(_) => "i8",
            TypedValue::I16(_) => "i16",
            TypedValue::I32(_) => "i32",
            TypedValue::U64(_) => "u64",
            TypedValue::U128(_) => "u128",
            TypedValue::Usize(_) => "usize",
            TypedValue::I64(_) => "i64",
            TypedValue::I128(_) => "i128",
            TypedValue::ByteBuffer(_) => "bytes",
            TypedValue::AccountMeta(_) => "account meta",
            TypedValue::AccountDecl(_) => "account declaration",
            TypedValue::AccountDecoderDecl(_) => "account decoder field",
            TypedValue::AccountDecoder(_) => "account decoder",
            TypedValue::DynamicInstruction(_) => "dynamic instruction",
            TypedValue::Instruction(_) => "instruction",
            TypedValue::VariableDecl(_) => "variable declaration",
            TypedValue::FunctionDecl(_) => "function declaration",
            TypedValue::InstructionBundle(_) => "instruction bundle",
        }
    }

    /// Build the integer variant for `width`, range-checked.
    pub fn integer(width: IntWidth, value: WideInt) -> Result<Self> {
        value.check(width)?;
        let overflow = || ResolveError::range(value, width);
        let signed = || value.to_i128().ok_or_else(overflow);
        let unsigned = || value.to_u128().ok_or_else(overflow);
        Ok(match width {
            IntWidth::U8 => TypedValue::U8(unsigned()? as u8),
            IntWidth::U16 => TypedValue::U16(unsigned()? as u16),
            IntWidth::U32 => TypedValue::U32(unsigned()? as u32),
            IntWidth::U64 => TypedValue::U64(unsigned()? as u64),
            IntWidth::U128 => TypedValue::U128(unsigned()?),
            IntWidth::Usize => TypedValue::Usize(unsigned()? as u64),
            IntWidth::I8 => TypedValue::I8(signed()? as i8),
            IntWidth::I16 => TypedValue::I16(signed()? as i16),
            IntWidth::I32 => TypedValue::I32(signed()? as i32),
            IntWidth::I64 => TypedValue::I64(signed()? as i64),
            IntWidth::I128 => TypedValue::I128(signed()?),
        })
    }

    /// The integer width and value, if this is an integer variant.
    pub fn as_int(&self) -> Option<(IntWidth, WideInt)> {
        Some(match *self {
            TypedValue::U8(v) => (IntWidth::U8, WideInt::from_u128(v.into())),
            TypedValue::U16(v) => (IntWidth::U16, WideInt::from_u128(v.into())),
            TypedValue::U32(v) => (IntWidth::U32, WideInt::from_u128(v.into())),
            TypedValue::U64(v) => (IntWidth::U64, WideInt::from_u128(v.into())),
            TypedValue::U128(v) => (IntWidth::U128, WideInt::from_u128(v)),
            TypedValue::Usize(v) => (IntWidth::Usize, WideInt::from_u128(v.into())),
            TypedValue::I8(v) => (IntWidth::I8, WideInt::from_i128(v.into())),
            TypedValue::I16(v) => (IntWidth::I16, WideInt::from_i128(v.into())),
            TypedValue::I32(v) => (IntWidth::I32, WideInt::from_i128(v.into())),
            TypedValue::I64(v) => (IntWidth::I64, WideInt::from_i128(v.into())),
            TypedValue::I128(v) => (IntWidth::I128, WideInt::from_i128(v)),
            _ => return None,
        })
    }

    /// Address for address contexts; a keypair yields its public key.
    pub fn as_address(&self) -> Result<Address> {
        match self {
            TypedValue::Address(address) => Ok(*address),
            TypedValue::Keypair(keypair) => Ok(keypair.pubkey()),
            other => Err(ResolveError::mismatch("address", other.tag_name())),
        }
    }

    /// Raw bytes for a PDA seed.
    pub fn to_seed_bytes(&self) -> Result<Vec<u8>> {
        match self {
            TypedValue::Address(_) | TypedValue::Keypair(_) => {
                Ok(self.as_address()?.to_bytes().to_vec())
            }
            TypedValue::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(ResolveError::mismatch(
                "address, keypair or string",
                other.tag_name(),
            )),
        }
    }

    /// Serialize for instruction data using the value's own tag.
    pub fn to_data_bytes(&self) -> Result<Vec<u8>> {
        if let Some((width, value)) = self.as_int() {
            return value.to_le_bytes(width);
        }
        match self {
            TypedValue::Address(_) | TypedValue::Keypair(_) => {
                Ok(self.as_address()?.to_bytes().to_vec())
            }
            TypedValue::Boolean(b) => Ok(vec![u8::from(*b)]),
            TypedValue::String(s) => {
                let len = u32::try_from(s.len())
                    .map_err(|_| ResolveError::range(s.len(), DataType::U32))?;
                let mut out = Vec::with_capacity(4 + s.len());
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(s.as_bytes());
                Ok(out)
            }
            TypedValue::ByteBuffer(bytes) => Ok(bytes.clone()),
            TypedValue::FunctionDecl(decl) => Ok(decl.literal_result.clone()),
            other => Err(ResolveError::mismatch("serializable value", other.tag_name())),
        }
    }

    /// Retag this value as `target`.
    ///
    /// Integers may widen into a type whose range contains theirs, never
    /// narrow. Keypairs satisfy `pubkey`.
    pub fn coerce(&self, target: DataType) -> Result<TypedValue> {
        if let Some(target_width) = target.int_width() {
            let (width, value) = self
                .as_int()
                .ok_or_else(|| ResolveError::mismatch(target.name(), self.tag_name()))?;
            if !width.widens_to(target_width) {
                return Err(ResolveError::mismatch(target.name(), width.to_string()));
            }
            return TypedValue::integer(target_width, value);
        }
        match (target, self) {
            (DataType::Bool, TypedValue::Boolean(b)) => Ok(TypedValue::Boolean(*b)),
            (DataType::Pubkey, TypedValue::Address(_) | TypedValue::Keypair(_)) => {
                Ok(TypedValue::Address(self.as_address()?))
            }
            (DataType::String, TypedValue::String(s)) => Ok(TypedValue::String(s.clone())),
            _ => Err(ResolveError::mismatch(target.name(), self.tag_name())),
        }
    }

    /// Plain JSON rendering used for display.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Address(a) => Value::String(a.to_string()),
            TypedValue::Keypair(k) => Value::String(k.pubkey().to_string()),
            TypedValue::String(s) => Value::String(s.clone()),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::U128(v) => match u64::try_from(*v) {
                Ok(small) => Value::from(small),
                Err(_) => Value::String(v.to_string()),
            },
            TypedValue::I128(v) => match i64::try_from(*v) {
                Ok(small) => Value::from(small),
                Err(_) => Value::String(v.to_string()),
            },
            TypedValue::ByteBuffer(bytes) => Value::String(hex::encode(bytes)),
            TypedValue::AccountMeta(meta) => serde_json::to_value(meta).unwrap_or(Value::Null),
            TypedValue::Instruction(ix) => serde_json::to_value(ix).unwrap_or(Value::Null),
            other => match other.as_int() {
                Some((_, value)) => match (value.to_i128(), value.to_u128()) {
                    (_, Some(u)) => Value::from(u as u64),
                    (Some(i), None) => Value::from(i as i64),
                    (None, None) => Value::Null,
                },
                None => Value::String(format!("<{}>", other.tag_name())),
            },
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Value::String(s) => f.write_str(&s),
            other => write!(f, "{other}"),
        }
    }
}

macro_rules! impl_from_native {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TypedValue {
                fn from(value: $ty) -> Self {
                    TypedValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_native!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    bool => Boolean,
    Address => Address,
    Keypair => Keypair,
    String => String,
    Vec<u8> => ByteBuffer,
    Instruction => Instruction,
    AccountMeta => AccountMeta,
);

// ---------------------------------------------------------------------------
// Classification of untagged input
// ---------------------------------------------------------------------------

/// Classify a bare literal string by trial construction.
///
/// Order: address, keypair, integer, boolean, string; the first success
/// wins. A decimal string that also decodes to 32 Base58 bytes (such as the
/// system program's `111...1`) is an address.
///
/// Integers take `width_hint` when given, otherwise the narrowest of
/// `u64`/`u128` (non-negative) or `i64`/`i128` (negative) that holds them.
pub fn classify_literal(text: &str, width_hint: Option<IntWidth>) -> Result<TypedValue> {
    if let Ok(address) = text.parse::<Address>() {
        return Ok(TypedValue::Address(address));
    }
    if let Ok(keypair) = Keypair::from_base64(text) {
        return Ok(TypedValue::Keypair(keypair));
    }
    if let Some(value) = WideInt::parse(text) {
        return TypedValue::integer(default_width(value, width_hint), value);
    }
    match text {
        "true" => return Ok(TypedValue::Boolean(true)),
        "false" => return Ok(TypedValue::Boolean(false)),
        _ => {}
    }
    Ok(TypedValue::String(text.to_string()))
}

fn default_width(value: WideInt, hint: Option<IntWidth>) -> IntWidth {
    if let Some(width) = hint {
        return width;
    }
    let candidates = if value.is_negative() {
        [IntWidth::I64, IntWidth::I128]
    } else {
        [IntWidth::U64, IntWidth::U128]
    };
    candidates
        .into_iter()
        .find(|w| value.fits(*w))
        .unwrap_or(candidates[1])
}

/// Object shapes recognised by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    AccountMeta,
    AccountDecl,
    AccountDecoderDecl,
    Instruction,
    VariableDecl,
    FunctionDecl,
}

impl Shape {
    /// Precedence order; also the order shapes are reported in.
    pub const LADDER: [Shape; 6] = [
        Shape::AccountMeta,
        Shape::AccountDecl,
        Shape::AccountDecoderDecl,
        Shape::Instruction,
        Shape::VariableDecl,
        Shape::FunctionDecl,
    ];

    fn accepts(&self, obj: &Map<String, Value>) -> bool {
        let has = |key: &str| obj.contains_key(key);
        let type_is = |name: &str| obj.get("type").and_then(Value::as_str) == Some(name);
        match self {
            Shape::AccountMeta => has("pubkey") && has("isSigner") && has("isWritable"),
            Shape::AccountDecl => has("address") && !has("isSigner") && !has("holder"),
            Shape::AccountDecoderDecl => has("holder") && has("type") && has("offset"),
            Shape::Instruction => has("programId") && has("data") && has("accounts"),
            Shape::VariableDecl => type_is("variable") && has("name") && !has("holder"),
            Shape::FunctionDecl => type_is("function") && has("name") && !has("holder"),
        }
    }
}

/// All shapes whose recogniser accepts `obj`, in ladder order.
pub fn matching_shapes(obj: &Map<String, Value>) -> Vec<Shape> {
    Shape::LADDER
        .iter()
        .copied()
        .filter(|shape| shape.accepts(obj))
        .collect()
}

/// Classify an untagged JSON value.
///
/// Strings go through [`classify_literal`]; booleans, whole numbers, byte
/// arrays and the object shapes of [`Shape`] map to their tags. An object
/// accepted by more than one shape is rejected rather than resolved by
/// check order. Handles and bundles have no untagged form.
pub fn classify(raw: &Value, width_hint: Option<IntWidth>) -> Result<TypedValue> {
    match raw {
        Value::String(text) => classify_literal(text, width_hint),
        Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
        Value::Number(n) => {
            let value = if let Some(u) = n.as_u64() {
                WideInt::from_u128(u.into())
            } else if let Some(i) = n.as_i64() {
                WideInt::from_i128(i.into())
            } else {
                // Past 2^53 a JSON number has already lost precision; wide
                // integers have to come in as strings.
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 2f64.powi(53) => {
                        WideInt::from_i128(f as i128)
                    }
                    Some(f) if f.fract() == 0.0 => {
                        return Err(ResolveError::UnsupportedValue(format!(
                            "integer {n} is too wide for a JSON number, give it as a string"
                        )))
                    }
                    _ => return Err(ResolveError::UnsupportedValue(format!("non-integer {n}"))),
                }
            };
            TypedValue::integer(default_width(value, width_hint), value)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| {
                        ResolveError::UnsupportedValue(format!("non-byte element {item}"))
                    })
            })
            .collect::<Result<Vec<u8>>>()
            .map(TypedValue::ByteBuffer),
        Value::Object(obj) => classify_object(obj),
        Value::Null => Err(ResolveError::UnsupportedValue("null".into())),
    }
}

fn classify_object(obj: &Map<String, Value>) -> Result<TypedValue> {
    let shapes = matching_shapes(obj);
    let shape = match shapes.as_slice() {
        [single] => *single,
        [] => {
            return Err(ResolveError::UnsupportedValue(format!(
                "object with keys {:?}",
                obj.keys().collect::<Vec<_>>()
            )))
        }
        many => {
            return Err(ResolveError::UnsupportedValue(format!(
                "object matches several shapes: {many:?}"
            )))
        }
    };

    let text = |key: &str| -> Result<&str> {
        obj.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ResolveError::UnsupportedValue(format!("`{key}` must be a string")))
    };
    let flag = |key: &str| -> Result<bool> {
        obj.get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| ResolveError::UnsupportedValue(format!("`{key}` must be a boolean")))
    };
    let data_type = |key: &str| -> Result<DataType> {
        text(key)?
            .parse()
            .map_err(|_| ResolveError::UnsupportedValue(format!("unknown data type in `{key}`")))
    };

    match shape {
        Shape::AccountMeta => Ok(TypedValue::AccountMeta(AccountMeta::new(
            text("pubkey")?.parse()?,
            flag("isSigner")?,
            flag("isWritable")?,
        ))),
        Shape::AccountDecl => {
            let address: Address = text("address")?.parse()?;
            let file = match obj.get("path").and_then(Value::as_str) {
                Some(path) => Some(crate::pattern::account_file(path, None, path)?),
                None => None,
            };
            Ok(TypedValue::AccountDecl(AccountDeclSyntax { address, file }))
        }
        Shape::AccountDecoderDecl => {
            let offset = obj
                .get("offset")
                .and_then(Value::as_u64)
                .and_then(|o| usize::try_from(o).ok())
                .ok_or_else(|| {
                    ResolveError::UnsupportedValue("`offset` must be a non-negative integer".into())
                })?;
            let descriptor = FieldDescriptor::new(text("holder")?, data_type("type")?, offset)?;
            Ok(TypedValue::AccountDecoderDecl(descriptor))
        }
        Shape::Instruction => {
            let program_id: Address = text("programId")?.parse()?;
            let data = match classify(&obj["data"], None)? {
                TypedValue::ByteBuffer(bytes) => bytes,
                other => return Err(ResolveError::mismatch("bytes", other.tag_name())),
            };
            let accounts = match &obj["accounts"] {
                Value::Array(items) => items
                    .iter()
                    .map(|item| match classify(item, None)? {
                        TypedValue::AccountMeta(meta) => Ok(meta),
                        other => Err(ResolveError::mismatch("account meta", other.tag_name())),
                    })
                    .collect::<Result<Vec<_>>>()?,
                _ => {
                    return Err(ResolveError::UnsupportedValue(
                        "`accounts` must be an array".into(),
                    ))
                }
            };
            Ok(TypedValue::Instruction(Instruction::new(program_id, accounts, data)))
        }
        Shape::VariableDecl => Ok(TypedValue::VariableDecl(TypedVariableDeclaration {
            data_type: data_type("dataType")?,
            name: text("name")?.to_string(),
        })),
        Shape::FunctionDecl => {
            let literal_result = match obj.get("literalResult") {
                Some(raw) => match classify(raw, None)? {
                    TypedValue::ByteBuffer(bytes) => bytes,
                    other => return Err(ResolveError::mismatch("bytes", other.tag_name())),
                },
                None => Vec::new(),
            };
            Ok(TypedValue::FunctionDecl(FunctionDeclaration {
                data_type: data_type("dataType")?,
                name: text("name")?.to_string(),
                literal_result,
            }))
        }
    }
}
