use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::coordinator::{Availability, Published};
use crate::model::Snapshot;

/// One Home-Assistant-style sensor state, as served over `/entities`.
#[derive(Debug, Clone, Serialize)]
pub struct SensorEntity {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub state: SensorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    pub icon: &'static str,
    pub available: bool,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SensorState {
    Amount(Decimal),
    Count(usize),
    Text(String),
    Timestamp(DateTime<Utc>),
    None,
}

/// Render the published snapshot as sensor entities. Nothing is
/// rendered before the first successful poll.
pub fn entities(published: &Published) -> Vec<SensorEntity> {
    let Some(snapshot) = published.snapshot.as_deref() else {
        return Vec::new();
    };
    let available = published.availability == Availability::Available;

    let mut out = Vec::new();

    for account in snapshot.accounts.iter() {
        let mut slug = slugify(&account.display_name);
        if slug.is_empty() {
            slug = slugify(&account.id);
        }
        out.push(SensorEntity {
            entity_id: format!("sensor.{slug}_balance"),
            unique_id: format!("up_{}_balance", account.id),
            name: format!("{} Balance", account.display_name),
            state: SensorState::Amount(account.balance.value),
            unit_of_measurement: Some(account.balance.currency_code.clone()),
            icon: "mdi:bank",
            available,
            attributes: json!({
                "account_id": account.id,
                "account_type": account.account_type,
                "ownership": account.ownership,
                "created_at": account.created_at,
                "last_refreshed": account.refreshed_at,
            }),
        });
    }

    for (currency, total) in snapshot.totals.iter() {
        out.push(SensorEntity {
            entity_id: format!("sensor.up_total_balance_{}", currency.to_lowercase()),
            unique_id: format!("up_total_balance_{}", currency.to_lowercase()),
            name: format!("Up Total Balance ({currency})"),
            state: SensorState::Amount(*total),
            unit_of_measurement: Some(currency.clone()),
            icon: "mdi:cash-multiple",
            available,
            attributes: json!({ "last_refreshed": snapshot.fetched_at }),
        });
    }

    out.push(count_sensor(
        "up_account_count",
        "Up Account Count",
        snapshot.accounts.len(),
        available,
        snapshot,
    ));
    out.push(count_sensor(
        "up_transaction_count",
        "Up Transaction Count",
        snapshot.transactions.len(),
        available,
        snapshot,
    ));

    out.extend(latest_transaction_sensors(snapshot, available));

    out
}

fn count_sensor(
    id: &str,
    name: &str,
    count: usize,
    available: bool,
    snapshot: &Snapshot,
) -> SensorEntity {
    SensorEntity {
        entity_id: format!("sensor.{id}"),
        unique_id: id.to_string(),
        name: name.to_string(),
        state: SensorState::Count(count),
        unit_of_measurement: None,
        icon: "mdi:counter",
        available,
        attributes: json!({ "last_refreshed": snapshot.fetched_at }),
    }
}

fn latest_transaction_sensors(snapshot: &Snapshot, available: bool) -> Vec<SensorEntity> {
    let latest = snapshot.latest_transaction();

    let sensor = |suffix: &str, name: &str, icon: &'static str, state: SensorState, unit: Option<String>| {
        SensorEntity {
            entity_id: format!("sensor.up_latest_transaction_{suffix}"),
            unique_id: format!("up_latest_txn_{suffix}"),
            name: format!("Up Latest Transaction {name}"),
            state,
            unit_of_measurement: unit,
            icon,
            available,
            attributes: json!({
                "transaction_id": latest.map(|tx| tx.id.clone()),
                "last_refreshed": snapshot.fetched_at,
            }),
        }
    };

    vec![
        sensor(
            "description",
            "Description",
            "mdi:text",
            latest
                .map(|tx| SensorState::Text(tx.description.clone()))
                .unwrap_or(SensorState::None),
            None,
        ),
        sensor(
            "amount",
            "Amount",
            "mdi:cash",
            latest
                .map(|tx| SensorState::Amount(tx.amount.value))
                .unwrap_or(SensorState::None),
            latest.map(|tx| tx.amount.currency_code.clone()),
        ),
        sensor(
            "time",
            "Time",
            "mdi:clock-outline",
            latest
                .map(|tx| SensorState::Timestamp(tx.created_at))
                .unwrap_or(SensorState::None),
            None,
        ),
        sensor(
            "category",
            "Category",
            "mdi:shape-outline",
            latest
                .and_then(|tx| tx.category.clone())
                .map(SensorState::Text)
                .unwrap_or(SensorState::None),
            None,
        ),
        sensor(
            "tags",
            "Tags",
            "mdi:tag-multiple",
            latest
                .map(|tx| SensorState::Text(tx.tags.join(", ")))
                .unwrap_or(SensorState::None),
            None,
        ),
    ]
}

/// Lowercase ASCII letters and digits, everything else collapsed to a
/// single underscore.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
