//! # Transaction Facts
//!
//! The parsed, encoding-independent view of a finalized transaction. Every
//! index in the raw payload is resolved to an [`Address`] here, so nothing
//! downstream ever touches `accountIndex` or `programIdIndex` again.
//!
//! Balance deltas are `i128`: base-unit balances are `u64`, and the
//! difference of two of them always fits.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::btree_map::{BTreeMap, Entry};

use super::raw::{RawInstruction, RawTokenBalance, RawTransaction};
use super::LedgerError;
use crate::crypto::Address;

/// Native balance of one account before and after the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBalanceChange {
    pub account: Address,
    pub pre: u64,
    pub post: u64,
}

/// Token balance of one token account before and after the transaction.
/// A side that the rail didn't report is an implicit zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceChange {
    pub account: Address,
    pub mint: Address,
    pub owner: Option<Address>,
    pub pre: u64,
    pub post: u64,
}

/// One executed instruction, top-level or inner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionFacts {
    pub program_id: Address,
    pub accounts: Vec<Address>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFacts {
    pub reference: String,
    pub slot: u64,
    pub block_time: Option<DateTime<Utc>>,
    /// False when the transaction landed but its execution failed.
    pub succeeded: bool,
    /// Accounts that signed: the first `signatures.len()` static keys, fee
    /// payer first.
    pub signers: Vec<Address>,
    /// Static account keys followed by lookup-table addresses
    /// (writable, then readonly), in the order balances are reported.
    pub accounts: Vec<Address>,
    pub native_changes: Vec<NativeBalanceChange>,
    pub token_changes: Vec<TokenBalanceChange>,
    pub instructions: Vec<InstructionFacts>,
}

fn malformed(msg: impl Into<String>) -> LedgerError {
    LedgerError::Malformed(msg.into())
}

fn parse_address(s: &str, what: &str) -> Result<Address, LedgerError> {
    s.parse()
        .map_err(|e| malformed(format!("{what} {s:?} is not an address: {e}")))
}

fn account_at(accounts: &[Address], index: u16) -> Result<Address, LedgerError> {
    accounts
        .get(usize::from(index))
        .copied()
        .ok_or_else(|| malformed(format!("account index {index} out of range")))
}

impl TransactionFacts {
    /// Resolve a raw `getTransaction` payload.
    pub fn from_raw(reference: &str, raw: RawTransaction) -> Result<Self, LedgerError> {
        let meta = raw
            .meta
            .ok_or_else(|| malformed("transaction has no status metadata"))?;

        let mut accounts = raw
            .transaction
            .message
            .account_keys
            .iter()
            .map(|k| parse_address(k, "account key"))
            .collect::<Result<Vec<_>, _>>()?;
        let signer_count = raw.transaction.signatures.len();
        if signer_count == 0 || signer_count > accounts.len() {
            return Err(malformed(format!(
                "{signer_count} signatures for {} static account keys",
                accounts.len()
            )));
        }
        let signers = accounts[..signer_count].to_vec();
        if let Some(loaded) = &meta.loaded_addresses {
            for key in loaded.writable.iter().chain(&loaded.readonly) {
                accounts.push(parse_address(key, "loaded address")?);
            }
        }

        if meta.pre_balances.len() != accounts.len() || meta.post_balances.len() != accounts.len() {
            return Err(malformed(format!(
                "{} accounts but {} pre / {} post balances",
                accounts.len(),
                meta.pre_balances.len(),
                meta.post_balances.len()
            )));
        }
        let native_changes = accounts
            .iter()
            .zip(meta.pre_balances.iter().zip(&meta.post_balances))
            .map(|(account, (pre, post))| NativeBalanceChange {
                account: *account,
                pre: *pre,
                post: *post,
            })
            .collect();

        let token_changes = Self::token_changes(
            &accounts,
            meta.pre_token_balances.as_deref().unwrap_or_default(),
            meta.post_token_balances.as_deref().unwrap_or_default(),
        )?;

        let inner = meta
            .inner_instructions
            .iter()
            .flatten()
            .flat_map(|group| group.instructions.iter());
        let instructions = raw
            .transaction
            .message
            .instructions
            .iter()
            .chain(inner)
            .map(|ix| Self::instruction(&accounts, ix))
            .collect::<Result<Vec<_>, _>>()?;

        let block_time = raw
            .block_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(Self {
            reference: reference.to_string(),
            slot: raw.slot,
            block_time,
            succeeded: meta.err.is_none(),
            signers,
            accounts,
            native_changes,
            token_changes,
            instructions,
        })
    }

    fn token_changes(
        accounts: &[Address],
        pre: &[RawTokenBalance],
        post: &[RawTokenBalance],
    ) -> Result<Vec<TokenBalanceChange>, LedgerError> {
        // (account index, mint) -> change; BTreeMap keeps output ordered.
        let mut changes: BTreeMap<(u16, String), TokenBalanceChange> = BTreeMap::new();

        for (balances, is_post) in [(pre, false), (post, true)] {
            for balance in balances {
                let amount: u64 = balance.ui_token_amount.amount.parse().map_err(|_| {
                    malformed(format!(
                        "token amount {:?} is not an integer",
                        balance.ui_token_amount.amount
                    ))
                })?;
                let owner = balance
                    .owner
                    .as_deref()
                    .map(|o| parse_address(o, "token owner"))
                    .transpose()?;

                let key = (balance.account_index, balance.mint.clone());
                let change = match changes.entry(key) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(TokenBalanceChange {
                        account: account_at(accounts, balance.account_index)?,
                        mint: parse_address(&balance.mint, "mint")?,
                        owner,
                        pre: 0,
                        post: 0,
                    }),
                };
                if change.owner.is_none() {
                    change.owner = owner;
                }
                if is_post {
                    change.post = amount;
                } else {
                    change.pre = amount;
                }
            }
        }

        Ok(changes.into_values().collect())
    }

    fn instruction(accounts: &[Address], ix: &RawInstruction) -> Result<InstructionFacts, LedgerError> {
        Ok(InstructionFacts {
            program_id: account_at(accounts, ix.program_id_index)?,
            accounts: ix
                .accounts
                .iter()
                .map(|i| account_at(accounts, *i))
                .collect::<Result<_, _>>()?,
            data: bs58::decode(&ix.data)
                .into_vec()
                .map_err(|_| malformed("instruction data is not base58"))?,
        })
    }

    /// Whether `account` signed the transaction.
    pub fn is_signer(&self, account: &Address) -> bool {
        self.signers.contains(account)
    }

    /// Whether `account` appears anywhere in the transaction's account set.
    pub fn contains_account(&self, account: &Address) -> bool {
        self.accounts.contains(account)
    }

    /// Net native balance change of `account`. Zero if it isn't present.
    pub fn native_delta(&self, account: &Address) -> i128 {
        self.native_changes
            .iter()
            .filter(|c| &c.account == account)
            .map(|c| i128::from(c.post) - i128::from(c.pre))
            .sum()
    }

    /// Net balance change of token account `account` in `mint`.
    pub fn token_delta(&self, account: &Address, mint: &Address) -> i128 {
        self.token_changes
            .iter()
            .filter(|c| &c.account == account && &c.mint == mint)
            .map(|c| i128::from(c.post) - i128::from(c.pre))
            .sum()
    }

    /// Whether any instruction, top-level or inner, executed `program_id`.
    pub fn invokes(&self, program_id: &Address) -> bool {
        self.instructions.iter().any(|ix| &ix.program_id == program_id)
    }
}
