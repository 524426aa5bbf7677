//! # In-Memory Ledger
//!
//! A [`Ledger`] that serves transactions out of a `HashMap`, plus
//! [`TransferBuilder`] to fabricate realistic `getTransaction` payloads.
//! The observer and verifier can't tell the difference.

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::time::Duration;

use super::raw::{
    RawEnvelope, RawInstruction, RawMessage, RawMeta, RawTokenBalance, RawTransaction,
    RawUiTokenAmount,
};
use super::{Ledger, LedgerError};
use crate::config::{SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::crypto::{associated_token_address, Address, DerivationError};

/// Starting native balance of a fabricated payer.
const PAYER_NATIVE_BALANCE: u64 = 10_000_000_000;

/// Starting token balance of a fabricated payer's token account.
const PAYER_TOKEN_BALANCE: u64 = 1_000_000_000_000;

/// Rent-exempt minimum of a token account, for realism.
const TOKEN_ACCOUNT_RENT: u64 = 2_039_280;

const FEE: u64 = 5_000;

/// A fresh random transaction signature, base58.
pub fn random_reference() -> String {
    let mut sig = [0u8; 64];
    OsRng.fill_bytes(&mut sig);
    bs58::encode(sig).into_string()
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    transactions: RwLock<HashMap<String, RawTransaction>>,
    latency: RwLock<Option<Duration>>,
    unreachable: RwLock<bool>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a transaction under its first signature and return that
    /// signature.
    pub fn insert(&self, raw: RawTransaction) -> String {
        let reference = raw
            .transaction
            .signatures
            .first()
            .cloned()
            .unwrap_or_else(random_reference);
        self.insert_as(&reference, raw);
        reference
    }

    pub fn insert_as(&self, reference: &str, raw: RawTransaction) {
        self.transactions.write().insert(reference.to_string(), raw);
    }

    /// Delay every lookup by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Make every lookup fail as if the cluster were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write() = unreachable;
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_finalized_transaction(
        &self,
        reference: &str,
    ) -> Result<Option<RawTransaction>, LedgerError> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if *self.unreachable.read() {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(self.transactions.read().get(reference).cloned())
    }
}

// ---------------------------------------------------------------------------
// TransferBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TokenSlot {
    index: u16,
    mint: Address,
    owner: Address,
    pre: Option<u64>,
    post: u64,
}

/// Fabricates a finalized transaction in which `payer` sends funds.
///
/// ```
/// use quill_engine::crypto::Address;
/// use quill_engine::ledger::TransferBuilder;
///
/// let payer = Address::new([1u8; 32]);
/// let author = Address::new([2u8; 32]);
/// let raw = TransferBuilder::new(payer).native(author, 1_000).build();
/// assert_eq!(raw.transaction.message.account_keys.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TransferBuilder {
    reference: String,
    keys: Vec<Address>,
    pre: Vec<u64>,
    post: Vec<u64>,
    tokens: Vec<TokenSlot>,
    instructions: Vec<RawInstruction>,
    failed: bool,
    slot: u64,
}

impl TransferBuilder {
    pub fn new(payer: Address) -> Self {
        Self {
            reference: random_reference(),
            keys: vec![payer],
            pre: vec![PAYER_NATIVE_BALANCE],
            post: vec![PAYER_NATIVE_BALANCE - FEE],
            tokens: Vec::new(),
            instructions: Vec::new(),
            failed: false,
            slot: 250_000_000,
        }
    }

    fn payer(&self) -> Address {
        self.keys[0]
    }

    fn index_of(&mut self, account: Address, balance: u64) -> u16 {
        let index = match self.keys.iter().position(|k| *k == account) {
            Some(index) => index,
            None => {
                self.keys.push(account);
                self.pre.push(balance);
                self.post.push(balance);
                self.keys.len() - 1
            }
        };
        index as u16
    }

    fn push_instruction(&mut self, program_id: Address, accounts: &[Address], data: &[u8]) {
        let program_id_index = self.index_of(program_id, 1);
        let accounts = accounts.iter().map(|a| self.index_of(*a, 0)).collect();
        self.instructions.push(RawInstruction {
            program_id_index,
            accounts,
            data: bs58::encode(data).into_string(),
        });
    }

    /// Move `amount` native base units from the payer to `to`.
    pub fn native(mut self, to: Address, amount: u64) -> Self {
        let payer = self.payer();
        let index = usize::from(self.index_of(to, 0));
        self.post[index] += amount;
        self.post[0] -= amount;
        let mut data = vec![2, 0, 0, 0];
        data.extend_from_slice(&amount.to_le_bytes());
        self.push_instruction(SYSTEM_PROGRAM_ID, &[payer, to], &data);
        self
    }

    fn token_slot(&mut self, account: Address, mint: Address, owner: Address, start: Option<u64>) -> usize {
        let index = self.index_of(account, TOKEN_ACCOUNT_RENT);
        match self.tokens.iter().position(|t| t.index == index && t.mint == mint) {
            Some(slot) => slot,
            None => {
                self.tokens.push(TokenSlot {
                    index,
                    mint,
                    owner,
                    pre: start,
                    post: start.unwrap_or(0),
                });
                self.tokens.len() - 1
            }
        }
    }

    /// Move `amount` base units of `mint` from the payer's associated token
    /// account to `owner`'s. The recipient account is created on the fly,
    /// so its pre-balance is missing from the payload, as on the real rail.
    pub fn token(mut self, mint: Address, owner: Address, amount: u64) -> Result<Self, DerivationError> {
        let payer = self.payer();
        let from = associated_token_address(&payer, &mint)?;
        let to = associated_token_address(&owner, &mint)?;

        let from_slot = self.token_slot(from, mint, payer, Some(PAYER_TOKEN_BALANCE));
        let to_slot = self.token_slot(to, mint, owner, None);
        self.tokens[from_slot].post -= amount;
        self.tokens[to_slot].post += amount;

        self.index_of(owner, 0);
        self.index_of(mint, 1);
        let mut data = vec![3];
        data.extend_from_slice(&amount.to_le_bytes());
        self.push_instruction(TOKEN_PROGRAM_ID, &[from, to, payer], &data);
        Ok(self)
    }

    /// Record an invocation of `program_id`, e.g. the fund-split program.
    pub fn invoke(mut self, program_id: Address) -> Self {
        let payer = self.payer();
        self.push_instruction(program_id, &[payer], &[]);
        self
    }

    /// Mark the transaction as landed-but-failed.
    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn build(self) -> RawTransaction {
        let balance = |slot: &TokenSlot, amount: u64| RawTokenBalance {
            account_index: slot.index,
            mint: slot.mint.to_base58(),
            owner: Some(slot.owner.to_base58()),
            ui_token_amount: RawUiTokenAmount {
                amount: amount.to_string(),
                decimals: 6,
            },
        };
        let pre_tokens = self
            .tokens
            .iter()
            .filter_map(|slot| slot.pre.map(|pre| balance(slot, pre)))
            .collect();
        let post_tokens = self.tokens.iter().map(|slot| balance(slot, slot.post)).collect();

        RawTransaction {
            slot: self.slot,
            block_time: Some(chrono::Utc::now().timestamp()),
            meta: Some(RawMeta {
                err: self
                    .failed
                    .then(|| serde_json::json!({ "InstructionError": [0, { "Custom": 1 }] })),
                fee: FEE,
                pre_balances: self.pre,
                post_balances: self.post,
                pre_token_balances: Some(pre_tokens),
                post_token_balances: Some(post_tokens),
                inner_instructions: Some(Vec::new()),
                loaded_addresses: None,
            }),
            transaction: RawEnvelope {
                signatures: vec![self.reference],
                message: RawMessage {
                    account_keys: self.keys.iter().map(Address::to_base58).collect(),
                    instructions: self.instructions,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USDT_MINT;
    use crate::ledger::TransactionFacts;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    #[test]
    fn native_transfer_parses_back() {
        let builder = TransferBuilder::new(addr(1)).native(addr(2), 1_000);
        let reference = builder.reference().to_string();
        let facts = TransactionFacts::from_raw(&reference, builder.build()).unwrap();
        assert_eq!(facts.native_delta(&addr(2)), 1_000);
        assert_eq!(facts.native_delta(&addr(1)), -(1_000 + FEE as i128));
        assert!(facts.invokes(&SYSTEM_PROGRAM_ID));
    }

    #[test]
    fn token_transfer_credits_the_associated_account() {
        let raw = TransferBuilder::new(addr(1))
            .token(USDT_MINT, addr(2), 900)
            .unwrap()
            .token(USDT_MINT, addr(3), 100)
            .unwrap()
            .build();
        let facts = TransactionFacts::from_raw("r", raw).unwrap();

        let author_ata = associated_token_address(&addr(2), &USDT_MINT).unwrap();
        let platform_ata = associated_token_address(&addr(3), &USDT_MINT).unwrap();
        let payer_ata = associated_token_address(&addr(1), &USDT_MINT).unwrap();
        assert_eq!(facts.token_delta(&author_ata, &USDT_MINT), 900);
        assert_eq!(facts.token_delta(&platform_ata, &USDT_MINT), 100);
        assert_eq!(facts.token_delta(&payer_ata, &USDT_MINT), -1_000);
    }

    #[tokio::test]
    async fn serves_inserted_transactions() {
        let ledger = InMemoryLedger::new();
        let reference = ledger.insert(TransferBuilder::new(addr(1)).native(addr(2), 5).build());
        assert!(ledger.get_finalized_transaction(&reference).await.unwrap().is_some());
        assert!(ledger
            .get_finalized_transaction(&random_reference())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unreachable_ledger_fails() {
        let ledger = InMemoryLedger::new();
        ledger.set_unreachable(true);
        assert!(matches!(
            ledger.get_finalized_transaction("x").await,
            Err(LedgerError::Transport(_))
        ));
    }

    #[test]
    fn references_are_64_byte_signatures() {
        let reference = random_reference();
        assert_eq!(bs58::decode(reference).into_vec().unwrap().len(), 64);
    }
}
