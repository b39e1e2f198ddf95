//! Lexical classification of pattern strings.
//!
//! [`Pattern::parse`] recognises the value micro-syntaxes in a fixed order,
//! first match wins:
//!
//! ```text
//! sighash(name)            8-byte instruction discriminator
//! bytes(n, n, ...)         literal byte list, each 0..=255
//! fromBase64(s) | hex(s)   decoded byte buffer
//! usize(n) | u32(n)        little-endian literal, 8 or 4 bytes
//! $name:TYPE               typed variable reference
//! $name                    untyped variable reference
//! anything else            bare literal
//! ```
//!
//! The declaration syntaxes (`ADDRESS[,FILE]`, `TARGET[,signer][,mut]` and
//! `$holder:TYPE,OFFSET`) are only meaningful in their own contexts and have
//! their own parsers here.

use std::path::{Path, PathBuf};

use base64::Engine;
use chain_sol::Address;

use crate::codec::FieldDescriptor;
use crate::error::{ResolveError, Result};
use crate::types::{DataType, IntWidth, WideInt};
use crate::value::{AccountDeclSyntax, AccountFile, AccountFileKind};

const FUNCTIONS: [&str; 6] = ["sighash", "bytes", "fromBase64", "hex", "usize", "u32"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Sighash(String),
    Bytes(Vec<u8>),
    FromBase64(Vec<u8>),
    Hex(Vec<u8>),
    Usize(u64),
    U32(u32),
    TypedVariable { name: String, data_type: DataType },
    Variable(String),
    Literal(String),
}

impl Pattern {
    pub fn parse(input: &str) -> Result<Pattern> {
        let text = input.trim();

        if let Some((name, args)) = split_call(text) {
            match name {
                "sighash" => return parse_sighash(text, args),
                "bytes" => return parse_bytes(text, args),
                "fromBase64" => {
                    return base64::engine::general_purpose::STANDARD
                        .decode(args.trim())
                        .map(Pattern::FromBase64)
                        .map_err(|e| ResolveError::syntax(text, format!("invalid base64: {e}")))
                }
                "hex" => {
                    let digits = args.trim();
                    let digits = digits.strip_prefix("0x").unwrap_or(digits);
                    return hex::decode(digits)
                        .map(Pattern::Hex)
                        .map_err(|e| ResolveError::syntax(text, format!("invalid hex: {e}")));
                }
                "usize" => {
                    let value = parse_number(text, args, IntWidth::Usize)?;
                    return Ok(Pattern::Usize(value as u64));
                }
                "u32" => {
                    let value = parse_number(text, args, IntWidth::U32)?;
                    return Ok(Pattern::U32(value as u32));
                }
                _ => {}
            }
        }

        if FUNCTIONS
            .iter()
            .any(|f| text.strip_prefix(f).is_some_and(|rest| rest.starts_with('(')))
        {
            return Err(ResolveError::syntax(text, "unterminated call"));
        }

        if let Some(reference) = text.strip_prefix('$') {
            return parse_reference(text, reference);
        }

        Ok(Pattern::Literal(text.to_string()))
    }

    /// Name of the function form, if this is one.
    pub fn function_name(&self) -> Option<&'static str> {
        Some(match self {
            Pattern::Sighash(_) => "sighash",
            Pattern::Bytes(_) => "bytes",
            Pattern::FromBase64(_) => "fromBase64",
            Pattern::Hex(_) => "hex",
            Pattern::Usize(_) => "usize",
            Pattern::U32(_) => "u32",
            _ => return None,
        })
    }
}

/// Split `name(args)` into its parts.
fn split_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let inner = text.strip_suffix(')')?;
    let name = &text[..open];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((name, &inner[open + 1..]))
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_sighash(text: &str, args: &str) -> Result<Pattern> {
    let name = args.trim();
    if !is_identifier(name) {
        return Err(ResolveError::syntax(text, "sighash expects an instruction name"));
    }
    Ok(Pattern::Sighash(name.to_string()))
}

fn parse_bytes(text: &str, args: &str) -> Result<Pattern> {
    if args.trim().is_empty() {
        return Ok(Pattern::Bytes(Vec::new()));
    }
    args.split(',')
        .map(|item| {
            let item = item.trim();
            let value = WideInt::parse(item)
                .ok_or_else(|| ResolveError::syntax(text, format!("`{item}` is not a number")))?;
            value.check(IntWidth::U8)?;
            value
                .to_u128()
                .map(|v| v as u8)
                .ok_or_else(|| ResolveError::range(value, IntWidth::U8))
        })
        .collect::<Result<Vec<u8>>>()
        .map(Pattern::Bytes)
}

fn parse_number(text: &str, args: &str, width: IntWidth) -> Result<u128> {
    let item = args.trim();
    let value = WideInt::parse(item)
        .ok_or_else(|| ResolveError::syntax(text, format!("`{item}` is not a decimal integer")))?;
    value.check(width)?;
    value
        .to_u128()
        .ok_or_else(|| ResolveError::range(value, width))
}

fn parse_reference(text: &str, reference: &str) -> Result<Pattern> {
    match reference.split_once(':') {
        Some((name, ty)) => {
            if !is_identifier(name) {
                return Err(ResolveError::syntax(text, "invalid variable name"));
            }
            let data_type = ty
                .trim()
                .parse::<DataType>()
                .ok()
                .filter(DataType::is_variable_type)
                .ok_or_else(|| ResolveError::syntax(text, format!("unknown type `{ty}`")))?;
            Ok(Pattern::TypedVariable {
                name: name.to_string(),
                data_type,
            })
        }
        None => {
            if !is_identifier(reference) {
                return Err(ResolveError::syntax(text, "invalid variable name"));
            }
            Ok(Pattern::Variable(reference.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Account declarations: ADDRESS[,FILEPATH]
// ---------------------------------------------------------------------------

/// Parse an account declaration, resolving a relative file path against
/// `project_root`.
pub fn parse_account_decl(input: &str, project_root: &Path) -> Result<AccountDeclSyntax> {
    let text = input.trim();
    let (address, path) = match text.split_once(',') {
        Some((address, path)) => (address.trim(), Some(path.trim())),
        None => (text, None),
    };

    let address: Address = address
        .parse()
        .map_err(|e| ResolveError::syntax(text, format!("{e}")))?;
    let file = match path {
        Some(path) => Some(account_file(path, Some(project_root), text)?),
        None => None,
    };
    Ok(AccountDeclSyntax { address, file })
}

/// Classify a declared account file by its extension.
pub(crate) fn account_file(
    path: &str,
    project_root: Option<&Path>,
    pattern: &str,
) -> Result<AccountFile> {
    let path = PathBuf::from(path);
    let kind = match path.extension().and_then(|e| e.to_str()) {
        Some("so") => AccountFileKind::Executable,
        Some("json") => AccountFileKind::Json,
        _ => {
            return Err(ResolveError::syntax(
                pattern,
                "account file must end in .so or .json",
            ))
        }
    };
    let path = match project_root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path,
    };
    Ok(AccountFile { path, kind })
}

// ---------------------------------------------------------------------------
// Account metas: TARGET[,signer][,mut]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaPattern {
    /// `Variable` or `Literal`; resolved in address context.
    pub target: Pattern,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl MetaPattern {
    pub fn parse(input: &str) -> Result<MetaPattern> {
        let text = input.trim();
        let mut segments = text.split(',').map(str::trim);
        let head = segments.next().unwrap_or_default();
        if head.is_empty() {
            return Err(ResolveError::syntax(text, "missing account"));
        }

        let target = match Pattern::parse(head)? {
            target @ (Pattern::Variable(_) | Pattern::Literal(_)) => target,
            Pattern::TypedVariable {
                name,
                data_type: DataType::Pubkey,
            } => Pattern::Variable(name),
            _ => return Err(ResolveError::syntax(text, "account must be an address or $var")),
        };

        let mut is_signer = false;
        let mut is_writable = false;
        for token in segments {
            match token {
                "signer" => is_signer = true,
                "mut" => is_writable = true,
                "" => {}
                other => {
                    return Err(ResolveError::syntax(text, format!("unknown flag `{other}`")))
                }
            }
        }

        Ok(MetaPattern {
            target,
            is_signer,
            is_writable,
        })
    }
}

// ---------------------------------------------------------------------------
// Decoder fields: $HOLDER:TYPE,OFFSET
// ---------------------------------------------------------------------------

impl FieldDescriptor {
    pub fn parse(input: &str) -> Result<FieldDescriptor> {
        let text = input.trim();
        let body = text
            .strip_prefix('$')
            .ok_or_else(|| ResolveError::syntax(text, "field must start with `$`"))?;
        let (head, offset) = body
            .split_once(',')
            .ok_or_else(|| ResolveError::syntax(text, "missing `,OFFSET`"))?;
        let (holder, ty) = head
            .split_once(':')
            .ok_or_else(|| ResolveError::syntax(text, "missing `:TYPE`"))?;

        if !is_identifier(holder) {
            return Err(ResolveError::syntax(text, "invalid holder name"));
        }
        let data_type = ty
            .trim()
            .parse::<DataType>()
            .ok()
            .filter(DataType::is_field_type)
            .ok_or_else(|| ResolveError::syntax(text, format!("unknown field type `{ty}`")))?;
        let offset = offset.trim();
        if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ResolveError::syntax(text, "offset must be a non-negative integer"));
        }
        let offset: usize = offset
            .parse()
            .map_err(|_| ResolveError::range(offset, "usize"))?;

        FieldDescriptor::new(holder, data_type, offset)
    }
}
