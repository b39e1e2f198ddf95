//! Instruction and account-meta types.

use serde::Serialize;

use crate::address::Address;

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Address, is_signer: bool, is_writable: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable,
        }
    }
}

/// A Solana instruction (before it is compiled into a transaction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Address, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Instruction {
            program_id,
            accounts,
            data,
        }
    }

    /// Accounts that must sign a transaction carrying this instruction.
    pub fn signers(&self) -> impl Iterator<Item = &Address> {
        self.accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| &meta.pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signers_filters_by_flag() {
        let a = Address::new([1; 32]);
        let b = Address::new([2; 32]);
        let ix = Instruction::new(
            Address::new([9; 32]),
            vec![AccountMeta::new(a, true, true), AccountMeta::new(b, false, true)],
            vec![],
        );
        let signers: Vec<_> = ix.signers().collect();
        assert_eq!(signers, vec![&a]);
    }

    #[test]
    fn equality_covers_account_order() {
        let a = AccountMeta::new(Address::new([1; 32]), false, false);
        let b = AccountMeta::new(Address::new([2; 32]), false, false);
        let program = Address::new([3; 32]);
        let ab = Instruction::new(program, vec![a.clone(), b.clone()], vec![0]);
        let ba = Instruction::new(program, vec![b, a], vec![0]);
        assert_ne!(ab, ba);
    }
}
