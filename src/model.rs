use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Wire types for the Up API (JSON:API shaped). Only the single page we
// request is consumed; pagination links are carried but not followed.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResource {
    pub id: String,
    pub attributes: AccountAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAttributes {
    pub display_name: String,
    pub account_type: AccountType,
    pub ownership_type: OwnershipType,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Transactional,
    Saver,
    HomeLoan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    Individual,
    Joint,
}

/// A monetary amount as Up reports it. `value` is the exact decimal
/// string from the wire; `value_in_base_units` is the same amount in
/// cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    pub value: Decimal,
    pub value_in_base_units: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResource {
    pub id: String,
    pub attributes: TransactionAttributes,
    #[serde(default)]
    pub relationships: TransactionRelationships,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAttributes {
    pub status: TransactionStatus,
    pub description: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Held,
    Settled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRelationships {
    #[serde(default)]
    pub category: Relation,
    #[serde(default)]
    pub tags: Relations,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relation {
    #[serde(default)]
    pub data: Option<RelationData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default)]
    pub data: Vec<RelationData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationData {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub meta: PingMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMeta {
    pub id: String,
    pub status_emoji: String,
}

// Domain types assembled from a successful poll. A snapshot is built
// whole and never mutated; the next poll replaces it outright.

#[derive(Debug, Clone, Serialize)]
pub struct AccountRecord {
    pub id: String,
    pub display_name: String,
    pub account_type: AccountType,
    pub ownership: OwnershipType,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub status: TransactionStatus,
    pub description: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub accounts: Vec<AccountRecord>,
    pub transactions: Vec<TransactionRecord>,
    /// Exact balance totals keyed by currency code.
    pub totals: BTreeMap<String, Decimal>,
}

impl Snapshot {
    pub fn assemble(
        accounts: Vec<AccountResource>,
        transactions: Vec<TransactionResource>,
        fetched_at: DateTime<Utc>,
    ) -> Snapshot {
        let accounts = accounts
            .into_iter()
            .map(|account| AccountRecord {
                id: account.id,
                display_name: account.attributes.display_name,
                account_type: account.attributes.account_type,
                ownership: account.attributes.ownership_type,
                balance: account.attributes.balance,
                created_at: account.attributes.created_at,
                refreshed_at: fetched_at,
            })
            .collect::<Vec<_>>();

        let transactions = transactions
            .into_iter()
            .map(|tx| TransactionRecord {
                id: tx.id,
                status: tx.attributes.status,
                description: tx.attributes.description,
                amount: tx.attributes.amount,
                created_at: tx.attributes.created_at,
                settled_at: tx.attributes.settled_at,
                category: tx.relationships.category.data.map(|c| c.id),
                tags: tx.relationships.tags.data.into_iter().map(|t| t.id).collect(),
            })
            .collect::<Vec<_>>();

        let mut totals = BTreeMap::new();
        for account in accounts.iter() {
            *totals
                .entry(account.balance.currency_code.clone())
                .or_insert_with(Decimal::default) += account.balance.value;
        }

        Snapshot {
            fetched_at,
            accounts,
            transactions,
            totals,
        }
    }

    pub fn account(&self, id: &str) -> Option<&AccountRecord> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn latest_transaction(&self) -> Option<&TransactionRecord> {
        // The API returns transactions newest first.
        self.transactions.first()
    }
}
