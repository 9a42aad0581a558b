use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Campaign lifecycle status as stored by the campaign collaborator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Matching,
    Active,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Matching => "MATCHING",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(CampaignStatus::Draft),
            "MATCHING" => Some(CampaignStatus::Matching),
            "ACTIVE" => Some(CampaignStatus::Active),
            "COMPLETED" => Some(CampaignStatus::Completed),
            "CANCELLED" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }
}

/// Advertiser category the campaign originates from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCategory {
    Government,
    Business,
    Nonprofit,
    Foundation,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Government => "GOVERNMENT",
            SourceCategory::Business => "BUSINESS",
            SourceCategory::Nonprofit => "NONPROFIT",
            SourceCategory::Foundation => "FOUNDATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOVERNMENT" => Some(SourceCategory::Government),
            "BUSINESS" => Some(SourceCategory::Business),
            "NONPROFIT" => Some(SourceCategory::Nonprofit),
            "FOUNDATION" => Some(SourceCategory::Foundation),
            _ => None,
        }
    }
}

/// An advertiser's outreach request. Owned by the campaign collaborator;
/// the fulfillment engine only reads it to validate references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub advertiser_id: Uuid,
    pub title: String,
    pub budget_min_cents: i64,
    pub budget_max_cents: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub targeting: serde_json::Value,
    pub source_category: SourceCategory,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

/// A community media outlet fulfilling orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Proposed campaign/publisher pairing produced by the external matching
/// process. The engine never creates or scores matches; it only flips
/// `is_selected` when an order is placed against one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMatch {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub publisher_id: Uuid,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}
