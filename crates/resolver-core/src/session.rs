//! The unlocked-wallet session.
//!
//! Decrypting a wallet file happens outside this crate. Once the caller has
//! a keypair it unlocks a session and passes the session to every procedure
//! that may need a signer; the signer stays available until `lock` or drop.

use chain_sol::{Address, Keypair};
use tracing::debug;

#[derive(Debug, Default)]
pub struct WalletSession {
    signer: Option<Keypair>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unlocked(keypair: Keypair) -> Self {
        let mut session = Self::new();
        session.unlock(keypair);
        session
    }

    pub fn unlock(&mut self, keypair: Keypair) {
        debug!(wallet = %keypair.pubkey(), "wallet unlocked");
        self.signer = Some(keypair);
    }

    pub fn lock(&mut self) {
        if self.signer.take().is_some() {
            debug!("wallet locked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer(&self) -> Option<&Keypair> {
        self.signer.as_ref()
    }

    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(Keypair::pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_then_lock() {
        let kp = Keypair::from_seed(&[8u8; 32]);
        let mut session = WalletSession::unlocked(kp.clone());
        assert!(session.is_unlocked());
        assert_eq!(session.address(), Some(kp.pubkey()));

        session.lock();
        assert!(!session.is_unlocked());
        assert!(session.signer().is_none());
    }

    #[test]
    fn new_session_is_locked() {
        assert!(WalletSession::new().signer().is_none());
    }
}
