//! Role registry
//!
//! One owner fixed at construction, exactly one worker (initially the
//! owner) and a set of declared callers allowed to report accruals.

use crate::errors::{LedgerError, Result};
use loyalty_types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role required by a guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Configuration changes, toggles, caller declarations.
    Owner,
    /// Affiliate assignment.
    Worker,
    /// Game modules that report stakes.
    DeclaredCaller,
}

impl Role {
    /// Error returned when a caller lacks this role.
    pub fn denial(self) -> LedgerError {
        match self {
            Role::Owner => LedgerError::OwnerAccessDenied,
            Role::Worker => LedgerError::WorkerAccessDenied,
            Role::DeclaredCaller => LedgerError::UndeclaredCaller,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owner: AccountId,
    worker: AccountId,
    declared_callers: BTreeSet<AccountId>,
}

impl AccessControl {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            worker: owner,
            declared_callers: BTreeSet::new(),
        }
    }

    /// Rebuild from persisted parts.
    pub fn restore(
        owner: AccountId,
        worker: AccountId,
        declared_callers: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            owner,
            worker,
            declared_callers: declared_callers.into_iter().collect(),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn worker(&self) -> AccountId {
        self.worker
    }

    pub fn declared_callers(&self) -> impl Iterator<Item = &AccountId> {
        self.declared_callers.iter()
    }

    /// Check if an account holds a role
    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        match role {
            Role::Owner => *account == self.owner,
            Role::Worker => *account == self.worker,
            Role::DeclaredCaller => self.declared_callers.contains(account),
        }
    }

    /// Guard placed at the top of every role-gated operation.
    pub fn authorize(&self, role: Role, caller: &AccountId) -> Result<()> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            Err(role.denial())
        }
    }

    /// Replace the worker. Returns the previous worker.
    pub(crate) fn set_worker(&mut self, worker: AccountId) -> AccountId {
        std::mem::replace(&mut self.worker, worker)
    }

    /// Returns false if the caller was already declared.
    pub(crate) fn declare(&mut self, caller: AccountId) -> bool {
        self.declared_callers.insert(caller)
    }

    /// Returns false if the caller was not declared.
    pub(crate) fn undeclare(&mut self, caller: &AccountId) -> bool {
        self.declared_callers.remove(caller)
    }
}
