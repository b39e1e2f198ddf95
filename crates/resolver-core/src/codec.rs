//! Binary account codec.
//!
//! An [`AccountDecoder`] reads and writes fixed-offset, fixed-width fields
//! inside a raw account buffer. Layout per field:
//!
//! ```text
//! u8/i8/bool      1 byte
//! u16/i16         2 bytes, little-endian
//! u32/i32         4 bytes, little-endian
//! u64/i64/usize   8 bytes, little-endian
//! u128/i128      16 bytes, little-endian
//! pubkey         32 raw bytes
//! ```
//!
//! Signed fields are two's complement. Offsets are independent of each other
//! and may overlap; only the buffer bound is checked.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chain_sol::Address;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{ResolveError, Result};
use crate::types::DataType;
use crate::value::TypedValue;

/// One field of an account layout: `$holder:type,offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// The holder name; unique within one decoder.
    pub label: String,
    pub data_type: DataType,
    pub offset: usize,
}

impl FieldDescriptor {
    pub fn new(label: impl Into<String>, data_type: DataType, offset: usize) -> Result<Self> {
        let label = label.into();
        if !data_type.is_field_type() {
            return Err(ResolveError::mismatch("fixed-width field type", data_type.name()));
        }
        Ok(FieldDescriptor {
            label,
            data_type,
            offset,
        })
    }

    pub fn width(&self) -> usize {
        // Field types are fixed-width by construction.
        self.data_type.byte_width().unwrap_or(0)
    }

    /// The byte range this field occupies, if it lies inside `len` bytes.
    fn span(&self, len: usize) -> Result<std::ops::Range<usize>> {
        let width = self.width();
        match self.offset.checked_add(width) {
            Some(end) if end <= len => Ok(self.offset..end),
            _ => Err(ResolveError::OffsetOutOfBounds {
                label: self.label.clone(),
                offset: self.offset,
                width,
                len,
            }),
        }
    }
}

/// A set of field descriptors over a mutable raw buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDecoder {
    fields: Vec<FieldDescriptor>,
    data: Vec<u8>,
}

impl AccountDecoder {
    /// Build a decoder with an empty buffer. Labels must be unique.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        Self::with_data(fields, Vec::new())
    }

    pub fn with_data(fields: Vec<FieldDescriptor>, data: Vec<u8>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.label == field.label) {
                return Err(ResolveError::syntax(
                    &field.label,
                    "duplicate field label in decoder",
                ));
            }
        }
        Ok(AccountDecoder { fields, data })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, label: &str) -> Result<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .ok_or_else(|| ResolveError::UnresolvedReference(label.to_string()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the buffer, e.g. with a cached account snapshot.
    pub fn load(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Decode one field.
    pub fn get(&self, label: &str) -> Result<TypedValue> {
        let field = self.field(label)?;
        let bytes = &self.data[field.span(self.data.len())?];

        Ok(match field.data_type {
            DataType::U8 => TypedValue::U8(bytes[0]),
            DataType::I8 => TypedValue::I8(i8::from_le_bytes(le(bytes))),
            DataType::U16 => TypedValue::U16(u16::from_le_bytes(le(bytes))),
            DataType::I16 => TypedValue::I16(i16::from_le_bytes(le(bytes))),
            DataType::U32 => TypedValue::U32(u32::from_le_bytes(le(bytes))),
            DataType::I32 => TypedValue::I32(i32::from_le_bytes(le(bytes))),
            DataType::U64 => TypedValue::U64(u64::from_le_bytes(le(bytes))),
            DataType::Usize => TypedValue::Usize(u64::from_le_bytes(le(bytes))),
            DataType::I64 => TypedValue::I64(i64::from_le_bytes(le(bytes))),
            DataType::U128 => TypedValue::U128(u128::from_le_bytes(le(bytes))),
            DataType::I128 => TypedValue::I128(i128::from_le_bytes(le(bytes))),
            DataType::Bool => TypedValue::Boolean(bytes[0] != 0),
            DataType::Pubkey => TypedValue::Address(Address::try_from_slice(bytes)?),
            DataType::String => {
                return Err(ResolveError::mismatch("fixed-width field type", "string"))
            }
        })
    }

    /// Encode one field in place.
    ///
    /// Integer fields accept any integer tag whose value fits the field's
    /// range. Pubkey fields accept an address, a keypair, a Base58 string or
    /// a byte buffer, each of which must come to exactly 32 bytes.
    pub fn set(&mut self, label: &str, value: &TypedValue) -> Result<()> {
        let field = self.field(label)?.clone();
        let span = field.span(self.data.len())?;
        let encoded = encode_field(&field, value)?;
        self.data[span].copy_from_slice(&encoded);
        Ok(())
    }

    /// Decode every field, keyed by label.
    pub fn values(&self) -> Result<BTreeMap<String, TypedValue>> {
        self.fields
            .iter()
            .map(|f| Ok((f.label.clone(), self.get(&f.label)?)))
            .collect()
    }
}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn encode_field(field: &FieldDescriptor, value: &TypedValue) -> Result<Vec<u8>> {
    if let Some(width) = field.data_type.int_width() {
        let (_, wide) = value
            .as_int()
            .ok_or_else(|| ResolveError::mismatch(field.data_type.name(), value.tag_name()))?;
        return wide.to_le_bytes(width);
    }

    match (field.data_type, value) {
        (DataType::Bool, TypedValue::Boolean(b)) => Ok(vec![u8::from(*b)]),
        (DataType::Pubkey, TypedValue::Address(_) | TypedValue::Keypair(_)) => {
            Ok(value.as_address()?.to_bytes().to_vec())
        }
        (DataType::Pubkey, TypedValue::String(text)) => {
            let bytes = bs58::decode(text)
                .into_vec()
                .map_err(|e| ResolveError::syntax(text, format!("base58 decode failed: {e}")))?;
            exact_address_bytes(bytes)
        }
        (DataType::Pubkey, TypedValue::ByteBuffer(bytes)) => exact_address_bytes(bytes.clone()),
        _ => Err(ResolveError::mismatch(field.data_type.name(), value.tag_name())),
    }
}

fn exact_address_bytes(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() != chain_sol::ADDRESS_LEN {
        return Err(ResolveError::mismatch(
            "32-byte address",
            format!("{} bytes", bytes.len()),
        ));
    }
    Ok(bytes)
}

/// Shared handle to a decoder whose buffer is read and rewritten in place.
///
/// Clones share the same decoder, so a handle stored in the symbol table
/// sees writes made through any other clone.
#[derive(Clone)]
pub struct AccountDecoderHandle {
    name: String,
    inner: Arc<RwLock<AccountDecoder>>,
}

impl AccountDecoderHandle {
    pub fn new(name: impl Into<String>, decoder: AccountDecoder) -> Self {
        AccountDecoderHandle {
            name: name.into(),
            inner: Arc::new(RwLock::new(decoder)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, label: &str) -> Result<TypedValue> {
        self.inner.read().get(label)
    }

    pub fn set(&self, label: &str, value: &TypedValue) -> Result<()> {
        self.inner.write().set(label, value)
    }

    pub fn values(&self) -> Result<BTreeMap<String, TypedValue>> {
        self.inner.read().values()
    }

    pub fn field(&self, label: &str) -> Result<FieldDescriptor> {
        self.inner.read().field(label).cloned()
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.inner.read().fields().to_vec()
    }

    pub fn data(&self) -> Vec<u8> {
        self.inner.read().data().to_vec()
    }

    pub fn load(&self, data: Vec<u8>) {
        self.inner.write().load(data);
    }

    /// Load a Base64 account snapshot, the encoding RPC nodes return.
    pub fn load_base64(&self, encoded: &str) -> Result<()> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ResolveError::syntax(encoded, format!("base64 decode failed: {e}")))?;
        self.load(data);
        Ok(())
    }
}

impl PartialEq for AccountDecoderHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AccountDecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoder = self.inner.read();
        f.debug_struct("AccountDecoderHandle")
            .field("name", &self.name)
            .field("fields", &decoder.fields().len())
            .field("len", &decoder.data().len())
            .finish()
    }
}
