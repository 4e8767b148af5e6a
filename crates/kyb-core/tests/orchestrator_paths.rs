//! End-to-end orchestrator paths against scripted providers and the sample fixture registry.

mod common;

use common::{
    hit, orchestrator, Call, ScriptedProviders, ScriptedScheduler, SlowScheduler, StuckScheduler,
};
use kyb_core::{
    BusinessStatus, DecisionStore, FetchFailure, FixtureRegistry, KybDecision, KybError,
    KybOrchestrator, PolicyAssembler, Provider, ProviderSet, RiskRating, RunLimits,
    SchedulerError, StepChoice,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn dissolved_business_rejects_after_one_provider_call() {
    let mut script = ScriptedProviders::clean();
    script.business.status = BusinessStatus::Dissolved;
    let providers = Arc::new(script);

    let record = orchestrator(&providers).run("01234567").await.unwrap();

    assert_eq!(providers.calls(), [Call::Verify("01234567".to_string())]);
    assert_eq!(record.kyb_decision, KybDecision::Reject);
    assert!(record.requires_human_review);
    assert!(record.directors.as_ref().unwrap().is_skipped());
    let risk = record.risk.as_ref().unwrap();
    assert_eq!((risk.rating, risk.score), (RiskRating::High, 100));
    assert_eq!(risk.factors[0].description, "Business is not active");
    assert_eq!(
        record.reasoning_log,
        [
            "REASON: Starting KYB. Must verify business first.",
            "OBSERVE: Business status = DISSOLVED, legal name = HARBOUR LANE SUPPLIES LIMITED",
            "REASON: Business is not active. Early REJECT, no further checks needed.",
            "OBSERVE: Directors skipped, sanctions not screened, risk = HIGH / 100 (Business is not active)",
            "REASON: Early exit reached. Making final decision.",
            "OBSERVE: Decision = REJECT, risk rating = HIGH",
        ]
    );
}

#[tokio::test]
async fn every_inactive_status_rejects_after_one_provider_call() {
    for status in [BusinessStatus::NotFound, BusinessStatus::Other] {
        let mut script = ScriptedProviders::clean();
        script.business.status = status;
        let providers = Arc::new(script);

        let record = orchestrator(&providers).run("00445790").await.unwrap();

        assert_eq!(providers.calls(), [Call::Verify("00445790".to_string())], "{status}");
        assert_eq!(record.kyb_decision, KybDecision::Reject, "{status}");
        assert!(record.directors.as_ref().unwrap().is_skipped(), "{status}");
        assert!(record.sanctions.as_ref().unwrap().synthetic, "{status}");
        assert_eq!(record.risk_rating, Some(RiskRating::High), "{status}");
        assert_eq!(
            record.reasoning_log[1],
            format!("OBSERVE: Business status = {status}, legal name = HARBOUR LANE SUPPLIES LIMITED")
        );
    }
}

#[tokio::test]
async fn zero_directors_with_low_risk_is_approved() {
    let mut script = ScriptedProviders::clean();
    script.directors = Ok(common::directors(&[], &["Quietwater Group PLC"]));
    let providers = Arc::new(script);

    let record = orchestrator(&providers).run("09876543").await.unwrap();

    assert_eq!(record.kyb_decision, KybDecision::Approve);
    assert_eq!(record.risk_rating, Some(RiskRating::Low));
    assert_eq!(record.directors.as_ref().unwrap().director_count(), 0);
    assert!(!record.directors.as_ref().unwrap().is_skipped());
    assert!(record
        .next_actions
        .contains(&"Confirm who is authorised to act for the business".to_string()));
    assert_eq!(
        providers.calls()[2],
        Call::Screen {
            business: "HARBOUR LANE SUPPLIES LIMITED".to_string(),
            directors: Vec::new(),
        }
    );
    assert_eq!(providers.calls().len(), 4);
}

#[tokio::test]
async fn sanctions_hit_rejects_without_scoring() {
    let mut script = ScriptedProviders::clean();
    script.directors = Ok(common::directors(&["Morag Innes", "Viktor Orlov"], &[]));
    script.sanctions = hit("Viktor Orlov");
    let providers = Arc::new(script);

    let record = orchestrator(&providers).run("SC654321").await.unwrap();

    assert!(!providers.calls().contains(&Call::Score));
    assert_eq!(
        providers.calls()[2],
        Call::Screen {
            business: "HARBOUR LANE SUPPLIES LIMITED".to_string(),
            directors: vec!["Morag Innes".to_string(), "Viktor Orlov".to_string()],
        }
    );
    assert_eq!(record.kyb_decision, KybDecision::Reject);
    assert!(record.requires_human_review);
    let risk = record.risk.as_ref().unwrap();
    assert!(risk.synthetic);
    assert_eq!(risk.score, 100);
    assert_eq!(risk.factors[0].severity, kyb_core::Severity::Critical);
    assert!(record
        .reasoning_log
        .contains(&"REASON: Sanctions hit found. Early REJECT, no further checks needed.".to_string()));
}

#[tokio::test]
async fn risk_scored_path_uses_four_real_records() {
    let mut script = ScriptedProviders::clean();
    script.risk = common::risk(RiskRating::High, 70);
    let providers = Arc::new(script);

    let record = orchestrator(&providers).run("00445790").await.unwrap();

    assert_eq!(record.kyb_decision, KybDecision::Refer);
    assert!(record.requires_human_review);
    assert!(!record.risk.as_ref().unwrap().synthetic);
    assert!(!record.sanctions.as_ref().unwrap().synthetic);
    assert!(!record.directors.as_ref().unwrap().is_skipped());
    assert_eq!(record.reasoning_log.len(), 10);
    assert_eq!(
        record.reasoning_log.last().map(String::as_str),
        Some("OBSERVE: Decision = REFER, risk rating = HIGH")
    );
}

#[tokio::test]
async fn director_fetch_failure_aborts_the_run() {
    let mut script = ScriptedProviders::clean();
    script.directors = Err(FetchFailure::unreachable(
        Provider::DirectorRetriever,
        "connection refused",
    ));
    let providers = Arc::new(script);

    let err = orchestrator(&providers).run("00445790").await.unwrap_err();

    match err {
        KybError::Provider(failure) => assert_eq!(failure.provider(), Provider::DirectorRetriever),
        other => panic!("expected provider failure, got {other:?}"),
    }
    assert_eq!(providers.calls().len(), 2);
}

#[tokio::test]
async fn inconsistent_sanctions_result_is_a_fetch_failure() {
    let mut script = ScriptedProviders::clean();
    script.sanctions.hit_count = 2;
    let providers = Arc::new(script);

    let err = orchestrator(&providers).run("00445790").await.unwrap_err();

    assert!(matches!(
        err,
        KybError::Provider(FetchFailure::Malformed { provider: Provider::SanctionsScreener, .. })
    ));
    assert!(!providers.calls().contains(&Call::Score));
}

#[tokio::test]
async fn identical_inputs_give_identical_records_except_timestamp() {
    let providers = Arc::new(ScriptedProviders::clean());
    let orch = orchestrator(&providers);

    let mut first = orch.run("00445790").await.unwrap();
    let second = orch.run("00445790").await.unwrap();
    first.timestamp = second.timestamp;

    assert_eq!(first, second);
}

#[tokio::test]
async fn reasoning_log_does_not_depend_on_the_scheduler() {
    let providers = Arc::new(ScriptedProviders::clean());
    let fixed = orchestrator(&providers).run("00445790").await.unwrap();

    let wandering = Arc::new(ScriptedScheduler::new(vec![
        Ok(StepChoice::ScoreRisk),
        Ok(StepChoice::Finalize),
    ]));
    let driven = orchestrator(&providers)
        .with_scheduler(wandering.clone())
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(fixed.reasoning_log, driven.reasoning_log);
    assert_eq!(fixed.kyb_decision, driven.kyb_decision);
    assert_eq!(wandering.consultations(), 7);
}

#[tokio::test]
async fn illegal_proposals_are_never_executed_and_exhaust_the_budget() {
    let providers = Arc::new(ScriptedProviders::clean());
    let limits = RunLimits {
        max_steps: 4,
        ..RunLimits::default()
    };

    let err = orchestrator(&providers)
        .with_scheduler(Arc::new(StuckScheduler(StepChoice::ScoreRisk)))
        .with_limits(limits)
        .run("00445790")
        .await
        .unwrap_err();

    assert!(matches!(err, KybError::StepBudgetExhausted { steps: 4 }));
    assert!(err.is_orchestration_failure());
    assert!(providers.calls().is_empty());
}

#[tokio::test]
async fn budget_too_small_for_a_clean_run_is_exhausted() {
    let providers = Arc::new(ScriptedProviders::clean());
    let limits = RunLimits {
        max_steps: 3,
        ..RunLimits::default()
    };

    let err = orchestrator(&providers)
        .with_limits(limits)
        .run("00445790")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "step_budget_exhausted");
    assert_eq!(providers.calls().len(), 3);
}

#[tokio::test]
async fn unparseable_scheduler_output_refers_with_raw_text_in_the_log() {
    let providers = Arc::new(ScriptedProviders::clean());
    let raw = "Let me think about which check matters most here...";
    let scheduler = Arc::new(ScriptedScheduler::new(vec![
        Ok(StepChoice::VerifyBusiness),
        Err(SchedulerError::Unparseable { raw: raw.to_string() }),
    ]));

    let record = orchestrator(&providers)
        .with_scheduler(scheduler)
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(record.kyb_decision, KybDecision::Refer);
    assert!(record.requires_human_review);
    assert!(record.business.is_some());
    assert!(record.directors.is_none());
    assert!(record.risk_rating.is_none());
    assert_eq!(
        record.reasoning_log.last().map(String::as_str),
        Some(format!("OBSERVE: Raw scheduler output: {raw}").as_str())
    );
    assert_eq!(providers.calls().len(), 1);
}

#[tokio::test]
async fn unparseable_output_after_a_sanctions_hit_still_rejects() {
    let mut script = ScriptedProviders::clean();
    script.sanctions = hit("Tomas Brennan");
    let providers = Arc::new(script);
    let scheduler = Arc::new(ScriptedScheduler::new(vec![
        Ok(StepChoice::VerifyBusiness),
        Ok(StepChoice::FetchDirectors),
        Ok(StepChoice::ScreenSanctions),
        Err(SchedulerError::Unparseable {
            raw: "The company looks risky.".to_string(),
        }),
    ]));

    let record = orchestrator(&providers)
        .with_scheduler(scheduler)
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(record.kyb_decision, KybDecision::Reject);
    assert_eq!(record.sanctions.as_ref().map(|s| s.clear), Some(false));
    assert_eq!(providers.calls().len(), 3);
    assert_eq!(
        record.reasoning_log.last().map(String::as_str),
        Some("OBSERVE: Decision = REJECT, risk rating = HIGH")
    );
}

#[tokio::test]
async fn unparseable_output_after_risk_scoring_still_finalizes() {
    let providers = Arc::new(ScriptedProviders::clean());
    let reference = orchestrator(&providers).run("00445790").await.unwrap();
    let scheduler = Arc::new(ScriptedScheduler::new(vec![
        Ok(StepChoice::VerifyBusiness),
        Ok(StepChoice::FetchDirectors),
        Ok(StepChoice::ScreenSanctions),
        Ok(StepChoice::ScoreRisk),
        Err(SchedulerError::Unparseable {
            raw: "done?".to_string(),
        }),
    ]));

    let record = orchestrator(&providers)
        .with_scheduler(scheduler)
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(record.kyb_decision, KybDecision::Approve);
    assert_eq!(record.reasoning_log, reference.reasoning_log);
}

#[tokio::test]
async fn unavailable_scheduler_is_replaced_by_the_fixed_one() {
    let providers = Arc::new(ScriptedProviders::clean());
    let reference = orchestrator(&providers).run("00445790").await.unwrap();

    let flaky = Arc::new(ScriptedScheduler::new(vec![
        Ok(StepChoice::VerifyBusiness),
        Err(SchedulerError::Unavailable("connection refused".to_string())),
    ]));
    let record = orchestrator(&providers)
        .with_scheduler(flaky.clone())
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(flaky.consultations(), 2);
    assert_eq!(record.kyb_decision, reference.kyb_decision);
    assert_eq!(record.reasoning_log, reference.reasoning_log);
}

#[tokio::test]
async fn hung_scheduler_is_replaced_by_the_fixed_one() {
    let providers = Arc::new(ScriptedProviders::clean());
    let reference = orchestrator(&providers).run("00445790").await.unwrap();
    let limits = RunLimits {
        scheduler_timeout: Duration::from_millis(20),
        run_timeout: Duration::from_secs(2),
        ..RunLimits::default()
    };

    let record = orchestrator(&providers)
        .with_scheduler(Arc::new(SlowScheduler {
            delay: Duration::from_secs(5),
        }))
        .with_limits(limits)
        .run("00445790")
        .await
        .unwrap();

    assert_eq!(record.kyb_decision, reference.kyb_decision);
    assert_eq!(record.reasoning_log, reference.reasoning_log);
}

#[tokio::test]
async fn slow_provider_times_out_as_a_fetch_failure() {
    let mut script = ScriptedProviders::clean();
    script.verify_delay = Some(Duration::from_millis(500));
    let providers = Arc::new(script);
    let limits = RunLimits {
        provider_timeout: Duration::from_millis(20),
        ..RunLimits::default()
    };

    let err = orchestrator(&providers)
        .with_limits(limits)
        .run("00445790")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KybError::Provider(FetchFailure::Timeout {
            provider: Provider::BusinessVerifier,
            after_ms: 20
        })
    ));
}

#[tokio::test]
async fn run_timeout_is_distinct_from_provider_failure() {
    let mut script = ScriptedProviders::clean();
    script.verify_delay = Some(Duration::from_millis(500));
    let providers = Arc::new(script);
    let limits = RunLimits {
        provider_timeout: Duration::from_secs(5),
        run_timeout: Duration::from_millis(20),
        ..RunLimits::default()
    };

    let err = orchestrator(&providers)
        .with_limits(limits)
        .run("00445790")
        .await
        .unwrap_err();

    assert!(matches!(err, KybError::RunTimedOut { budget_ms: 20 }));
}

#[tokio::test]
async fn blank_registration_number_is_rejected_before_any_call() {
    let providers = Arc::new(ScriptedProviders::clean());
    let err = orchestrator(&providers).run("   ").await.unwrap_err();
    assert!(matches!(err, KybError::EmptyRegistrationNumber));
    assert!(providers.calls().is_empty());
}

#[tokio::test]
async fn registration_number_is_trimmed() {
    let providers = Arc::new(ScriptedProviders::clean());
    orchestrator(&providers).run("  00445790 ").await.unwrap();
    assert_eq!(providers.calls()[0], Call::Verify("00445790".to_string()));
}

fn sample_orchestrator() -> KybOrchestrator {
    KybOrchestrator::new(
        ProviderSet::from_single(Arc::new(FixtureRegistry::sample())),
        Arc::new(PolicyAssembler),
    )
}

#[tokio::test]
async fn sample_registry_covers_each_outcome() {
    let orch = sample_orchestrator();
    for (number, decision, rating) in [
        ("00445790", KybDecision::Approve, RiskRating::Low),
        ("07654321", KybDecision::Approve, RiskRating::Medium),
        ("11223344", KybDecision::Refer, RiskRating::High),
        ("01234567", KybDecision::Reject, RiskRating::High),
        ("SC654321", KybDecision::Reject, RiskRating::High),
        ("99999999", KybDecision::Reject, RiskRating::High),
    ] {
        let record = orch.run(number).await.unwrap();
        assert_eq!(record.kyb_decision, decision, "{number}");
        assert_eq!(record.risk_rating, Some(rating), "{number}");
    }
}

#[tokio::test]
async fn attached_store_records_every_decision() {
    let store = Arc::new(DecisionStore::open_temporary().unwrap());
    let orch = sample_orchestrator().with_store(store.clone());

    orch.run("445790").await.unwrap();
    orch.run("01234567").await.unwrap();

    let latest = store.latest("00445790").unwrap().unwrap();
    assert_eq!(latest.kyb_decision, KybDecision::Approve);
    assert_eq!(store.len(), 2);
}
