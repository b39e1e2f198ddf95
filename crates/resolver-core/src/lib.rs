//! Pattern resolution engine for declarative Solana transactions.
//!
//! Configuration documents describe accounts, PDAs, instruction layouts and
//! account layouts as short pattern strings (`$amount:u64`,
//! `sighash(initialize)`, `$vault,mut`, `$owner:pubkey,8`). The
//! [`Dispatcher`] resolves each pattern under a [`ResolutionContext`] into a
//! [`TypedValue`], and its declarative procedures commit whole entities into
//! the [`SymbolTable`]. [`AccountDecoder`] reads and writes fixed-offset
//! fields of raw account buffers.

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod dynamic;
pub mod error;
pub mod pattern;
mod procedures;
pub mod project;
pub mod session;
pub mod symbols;
pub mod types;
pub mod value;

// ─── Re-exports ──────────────────────────────────────────────────────

pub use codec::{AccountDecoder, AccountDecoderHandle, FieldDescriptor};
pub use config::{BundleDecl, BundleVariable, InstructionDecl, PdaDecl, ProjectConfig};
pub use context::ResolutionContext;
pub use dispatcher::Dispatcher;
pub use dynamic::{DynamicInstructionHandle, InstructionGenerator};
pub use error::{ErrorKind, ResolveError, Result};
pub use pattern::{parse_account_decl, MetaPattern, Pattern};
pub use project::{Project, ResolutionReport};
pub use session::WalletSession;
pub use symbols::SymbolTable;
pub use types::{DataType, IntWidth, WideInt};
pub use value::{
    classify, classify_literal, AccountDeclSyntax, AccountFile, AccountFileKind,
    FunctionDeclaration, ResolvedInstructionBundle, TypedValue, TypedVariableDeclaration,
};
