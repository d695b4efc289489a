//! Remote order records and the per-run order index

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::annotation::ReconciliationStatus;

/// Campaign and date window a validation run reconciles against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub campaign_id: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

impl CampaignContext {
    pub fn new(campaign_id: impl Into<String>, from_date: NaiveDate, to_date: NaiveDate) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            from_date,
            to_date,
        }
    }

    /// Campaign id must be non-blank and the window must not be inverted
    pub fn is_valid(&self) -> bool {
        !self.campaign_id.trim().is_empty() && self.from_date <= self.to_date
    }
}

/// Payment status as reported by the network
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Open,
    Confirmed,
    Canceled,
    PaidOut,
    /// Anything else, kept verbatim (trimmed)
    Unrecognized(String),
}

impl PaymentStatus {
    /// Parse symbolic (`open`, `confirmed`, `canceled`, `paidout`) or legacy
    /// numeric (`0`..`3`) encodings
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "open" | "0" => PaymentStatus::Open,
            "confirmed" | "1" => PaymentStatus::Confirmed,
            "canceled" | "2" => PaymentStatus::Canceled,
            "paidout" | "3" => PaymentStatus::PaidOut,
            _ => PaymentStatus::Unrecognized(trimmed.to_string()),
        }
    }

    /// Local vocabulary; `None` for unrecognized values, never guessed
    pub fn reconciliation_status(&self) -> Option<ReconciliationStatus> {
        match self {
            PaymentStatus::Open => Some(ReconciliationStatus::Offen),
            PaymentStatus::Confirmed => Some(ReconciliationStatus::Bestaetigt),
            PaymentStatus::Canceled => Some(ReconciliationStatus::Storniert),
            PaymentStatus::PaidOut => Some(ReconciliationStatus::Ausgezahlt),
            PaymentStatus::Unrecognized(_) => None,
        }
    }

    /// Raw text for display in an invalid status cell
    pub fn raw(&self) -> &str {
        match self {
            PaymentStatus::Open => "open",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::PaidOut => "paidout",
            PaymentStatus::Unrecognized(raw) => raw,
        }
    }
}

/// One order as known to the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrderRecord {
    pub order_token: String,
    pub payment_status: PaymentStatus,
    /// Opaque scalar fields of the remote record
    pub raw: BTreeMap<String, String>,
}

impl RemoteOrderRecord {
    pub fn new(
        order_token: impl Into<String>,
        payment_status: PaymentStatus,
        raw: BTreeMap<String, String>,
    ) -> Self {
        Self {
            order_token: order_token.into(),
            payment_status,
            raw,
        }
    }

    /// Remote field matching a local header name
    ///
    /// Names compare on lowercase alphanumerics only, so `SubID` matches
    /// `sub_id` and `subid`. Blank remote values count as missing.
    pub fn field(&self, name: &str) -> Option<&str> {
        let wanted = field_key(name);
        if wanted.is_empty() {
            return None;
        }
        self.raw
            .iter()
            .filter(|(key, _)| field_key(key) == wanted)
            .map(|(_, value)| value.as_str())
            .find(|value| !value.trim().is_empty())
    }
}

/// Loose comparison key for field names across local and remote schemas
pub fn field_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Remote field carrying the publisher's sub id
const SUB_ID_FIELD: &str = "SubID";

/// Remote orders keyed by order token
///
/// Built once per validation run; lookups are O(1).
#[derive(Debug, Clone, Default)]
pub struct RemoteOrderIndex {
    records: HashMap<String, RemoteOrderRecord>,
    /// Every sub id the network knows for the window, across all orders
    sub_ids: HashSet<String>,
}

impl RemoteOrderIndex {
    /// Index records by trimmed token; blank tokens are dropped and the later
    /// record wins on duplicates
    pub fn from_records(records: impl IntoIterator<Item = RemoteOrderRecord>) -> Self {
        let mut index = HashMap::new();
        let mut sub_ids = HashSet::new();
        for record in records {
            if let Some(sub_id) = record.field(SUB_ID_FIELD) {
                sub_ids.insert(sub_id.trim().to_string());
            }
            let token = record.order_token.trim().to_string();
            if token.is_empty() {
                continue;
            }
            if index.insert(token.clone(), record).is_some() {
                tracing::debug!(token = %token, "Duplicate remote order token, later record wins");
            }
        }
        Self {
            records: index,
            sub_ids,
        }
    }

    pub fn find(&self, order_token: &str) -> Option<&RemoteOrderRecord> {
        self.records.get(order_token.trim())
    }

    /// Whether any remote order, matched or not, carries this sub id
    pub fn contains_sub_id(&self, sub_id: &str) -> bool {
        self.sub_ids.contains(sub_id.trim())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
