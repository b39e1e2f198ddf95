//! The project configuration document.
//!
//! Every value is a pattern string resolved later by the dispatcher; this
//! module only gives the document its shape. Sections are `BTreeMap`s so
//! resolution order follows label order.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::DataType;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// label -> `ADDRESS[,FILEPATH]`
    pub accounts: BTreeMap<String, String>,
    pub pdas: BTreeMap<String, PdaDecl>,
    pub instructions: BTreeMap<String, InstructionDecl>,
    pub bundles: BTreeMap<String, BundleDecl>,
    /// decoder name -> `$HOLDER:TYPE,OFFSET` field list
    pub decoders: BTreeMap<String, Vec<String>>,
    /// label -> Base64 keypair or `$ref`
    pub test_wallets: BTreeMap<String, String>,
}

impl ProjectConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdaDecl {
    pub program_id: String,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionDecl {
    pub program_id: String,
    /// Data patterns, concatenated in order.
    #[serde(default)]
    pub data: Vec<String>,
    /// Account-meta patterns.
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleDecl {
    pub variables: Vec<BundleVariable>,
    /// Instruction labels (`name` or `$name`), static or dynamic.
    pub instructions: Vec<String>,
    pub lookup_tables: Vec<String>,
    /// Keypair pattern; the session signer when absent.
    pub payer: Option<String>,
}

/// One variable bound before a bundle's instructions resolve.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleVariable {
    pub name: String,
    pub data_type: DataType,
    /// A pattern string, or an untagged JSON value.
    pub value: Value,
}
