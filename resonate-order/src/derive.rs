use resonate_core::CampaignStatus;

/// Display-only projection of a campaign's status for dashboards.
///
/// A campaign "looks active" as soon as real engagement exists, without any
/// intermediate system writing the status back: matches promote a draft to
/// MATCHING, orders promote a draft or matching campaign to ACTIVE. The raw
/// stored status is never mutated here and this label is never persisted.
pub fn campaign_display_status(
    raw: CampaignStatus,
    match_count: u64,
    order_count: u64,
) -> CampaignStatus {
    if order_count > 0
        && matches!(raw, CampaignStatus::Draft | CampaignStatus::Matching)
    {
        return CampaignStatus::Active;
    }
    if match_count > 0 && raw == CampaignStatus::Draft {
        return CampaignStatus::Matching;
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignStatus::*;

    #[test]
    fn test_draft_with_matches_reads_matching() {
        assert_eq!(campaign_display_status(Draft, 3, 0), Matching);
    }

    #[test]
    fn test_orders_read_active() {
        assert_eq!(campaign_display_status(Draft, 3, 1), Active);
        assert_eq!(campaign_display_status(Matching, 0, 2), Active);
    }

    #[test]
    fn test_raw_status_passes_through() {
        assert_eq!(campaign_display_status(Draft, 0, 0), Draft);
        assert_eq!(campaign_display_status(Active, 5, 5), Active);
        assert_eq!(campaign_display_status(Completed, 5, 5), Completed);
        assert_eq!(campaign_display_status(Cancelled, 2, 1), Cancelled);
    }
}
