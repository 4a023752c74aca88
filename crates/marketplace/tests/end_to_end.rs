//! End-to-end coverage across selection, impression tracking, click
//! validation, and budget accounting, wired through the in-memory store the
//! way the HTTP layer wires them.

use std::sync::Arc;

use campaign_core::config::AppConfig;
use campaign_core::types::{Ad, Campaign, CampaignStatus, ClickStatus, RejectReason, Targeting};
use campaign_core::Money;
use campaign_delivery::{ClickRateLimiter, ClickValidator};
use campaign_marketplace::selection::{SelectionOutcome, SelectionRequest};
use campaign_marketplace::{BudgetAccountant, ImpressionTracker, InMemoryStore, SelectionOrchestrator};
use chrono::Utc;

fn seed_campaign(store: &InMemoryStore, id: i64, budget_total: f64, buyer_cpc: f64) {
    store.put_campaign(Campaign {
        id,
        buyer_id: 1,
        name: format!("campaign-{id}"),
        status: CampaignStatus::Active,
        budget_total: Money::from_dollars(budget_total),
        budget_spent: Money::ZERO,
        buyer_cpc: Money::from_dollars(buyer_cpc),
        partner_payout: Money::from_dollars(buyer_cpc * 0.7),
        targeting: Targeting::default(),
        start_date: None,
        end_date: None,
        created_at: Utc::now(),
    });
    store.put_ad(Ad {
        id,
        campaign_id: id,
        active: true,
        title: "title".into(),
        body: "body".into(),
        image_url: "https://example.com/img.png".into(),
        destination_url: format!("https://example.com/landing/{id}"),
        created_at: Utc::now(),
    });
}

#[tokio::test]
async fn request_click_and_accounting_round_trip() {
    let store = Arc::new(InMemoryStore::new());
    seed_campaign(&store, 1, 100.0, 2.50);

    let config = AppConfig::default();
    let orchestrator = SelectionOrchestrator::new(store.clone());
    let now = Utc::now();

    let result = orchestrator
        .select(
            &config,
            SelectionRequest {
                partner_id: 42,
                targeting: Targeting::default(),
            },
            now,
        )
        .await
        .unwrap();

    let assignment_code = match result.outcome {
        SelectionOutcome::Filled { assignment_code, .. } => assignment_code,
        SelectionOutcome::Unfilled { reason } => panic!("expected a fill, got {reason:?}"),
    };

    let impressions = ImpressionTracker::new(store.clone());
    let first_impression = impressions
        .record(&config.click, &assignment_code, None, "203.0.113.5", now)
        .await
        .unwrap();
    assert_eq!(first_impression, Some(false));

    let limiter = Arc::new(ClickRateLimiter::new());
    let validator = ClickValidator::new(store.clone(), limiter);
    let accountant = BudgetAccountant::new(store.clone());

    let decision = validator
        .validate(
            &config.click,
            &assignment_code,
            None,
            "203.0.113.5",
            "Mozilla/5.0",
            now,
        )
        .await
        .unwrap();
    assert_eq!(decision.status, ClickStatus::Accepted);

    let settlement = accountant.settle(decision, now).await.unwrap();
    assert_eq!(settlement.event.status, ClickStatus::Accepted);
    assert_eq!(settlement.event.spend_delta, Money::from_dollars(2.50));
    assert_eq!(settlement.destination, "https://example.com/landing/1");

    let campaign = store.campaign(1).await.unwrap().unwrap();
    assert_eq!(campaign.budget_spent, Money::from_dollars(2.50));
    assert_eq!(campaign.status, CampaignStatus::Active);

    // A second click from the same IP within the duplicate window is rejected
    // and must not debit the budget again.
    let duplicate_decision = validator
        .validate(
            &config.click,
            &assignment_code,
            None,
            "203.0.113.5",
            "Mozilla/5.0",
            now,
        )
        .await
        .unwrap();
    assert_eq!(duplicate_decision.reject_reason, Some(RejectReason::DuplicateClick));

    let duplicate_settlement = accountant.settle(duplicate_decision, now).await.unwrap();
    assert_eq!(duplicate_settlement.event.status, ClickStatus::Rejected);
    assert_eq!(duplicate_settlement.event.spend_delta, Money::ZERO);

    let campaign_after_duplicate = store.campaign(1).await.unwrap().unwrap();
    assert_eq!(campaign_after_duplicate.budget_spent, Money::from_dollars(2.50));
}

#[tokio::test]
async fn budget_exhaustion_auto_pauses_the_campaign() {
    let store = Arc::new(InMemoryStore::new());
    seed_campaign(&store, 7, 2.50, 2.50);

    let config = AppConfig::default();
    let orchestrator = SelectionOrchestrator::new(store.clone());
    let now = Utc::now();

    let result = orchestrator
        .select(
            &config,
            SelectionRequest {
                partner_id: 9,
                targeting: Targeting::default(),
            },
            now,
        )
        .await
        .unwrap();
    let assignment_code = match result.outcome {
        SelectionOutcome::Filled { assignment_code, .. } => assignment_code,
        SelectionOutcome::Unfilled { reason } => panic!("expected a fill, got {reason:?}"),
    };

    let limiter = Arc::new(ClickRateLimiter::new());
    let validator = ClickValidator::new(store.clone(), limiter);
    let accountant = BudgetAccountant::new(store.clone());

    let decision = validator
        .validate(&config.click, &assignment_code, None, "203.0.113.9", "Mozilla/5.0", now)
        .await
        .unwrap();
    let settlement = accountant.settle(decision, now).await.unwrap();
    assert_eq!(settlement.event.status, ClickStatus::Accepted);

    let campaign = store.campaign(7).await.unwrap().unwrap();
    assert_eq!(campaign.budget_spent, campaign.budget_total);
    assert_eq!(campaign.status, CampaignStatus::Paused);

    // A follow-on request against the now-exhausted-and-paused campaign
    // should no longer be eligible.
    let second_result = orchestrator
        .select(
            &config,
            SelectionRequest {
                partner_id: 10,
                targeting: Targeting::default(),
            },
            now,
        )
        .await
        .unwrap();
    assert!(matches!(
        second_result.outcome,
        SelectionOutcome::Unfilled { .. }
    ));
}
