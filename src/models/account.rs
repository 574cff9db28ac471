use starknet::core::types::Felt;
use std::collections::HashMap;
use std::fmt;

use crate::error::{HarnessError, HarnessResult};

/// Privileged identities the harness acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Operator,
    AppGovernor,
    UpgradeGovernor,
    Deployer,
    /// Funds test accounts with collateral on the fork
    RichUsdcHolder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::AppGovernor => "app_governor",
            Role::UpgradeGovernor => "upgrade_governor",
            Role::Deployer => "deployer",
            Role::RichUsdcHolder => "rich_usdc_holder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key pair of a signing account.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: Felt,
    pub private_key: Felt,
}

impl KeyPair {
    /// Derive the public key from a private scalar.
    pub fn from_private_key(private_key: Felt) -> Self {
        Self {
            public_key: starknet_crypto::get_public_key(&private_key),
            private_key,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &format_args!("{:#x}", self.public_key))
            .finish_non_exhaustive()
    }
}

/// An account on the devnet.
///
/// Impersonated accounts have no key pair: devnet skips signature
/// validation for them. Accounts drawn from the predeployed pool carry
/// their keys so the harness can sign orders and withdrawals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevnetAccount {
    pub address: Felt,
    pub keys: Option<KeyPair>,
}

impl DevnetAccount {
    pub fn impersonated(address: Felt) -> Self {
        Self {
            address,
            keys: None,
        }
    }

    pub fn with_keys(address: Felt, keys: KeyPair) -> Self {
        Self {
            address,
            keys: Some(keys),
        }
    }

    pub fn key_pair(&self) -> HarnessResult<&KeyPair> {
        self.keys
            .as_ref()
            .ok_or(HarnessError::MissingKey(self.address))
    }

    pub fn public_key(&self) -> HarnessResult<Felt> {
        Ok(self.key_pair()?.public_key)
    }
}

/// Registry of the privileged accounts of a session.
#[derive(Debug, Clone, Default)]
pub struct KnownAccounts {
    accounts: HashMap<Role, DevnetAccount>,
}

impl KnownAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: Role, account: DevnetAccount) {
        self.accounts.insert(role, account);
    }

    pub fn with(mut self, role: Role, account: DevnetAccount) -> Self {
        self.insert(role, account);
        self
    }

    pub fn get(&self, role: Role) -> HarnessResult<&DevnetAccount> {
        self.accounts.get(&role).ok_or(HarnessError::MissingRole(role))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.accounts.contains_key(&role)
    }

    pub fn addresses(&self) -> Vec<(Role, Felt)> {
        self.accounts
            .iter()
            .map(|(role, account)| (*role, account.address))
            .collect()
    }
}
