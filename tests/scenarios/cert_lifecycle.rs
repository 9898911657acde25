use std::sync::Arc;
use std::time::Duration;

use certplane::platform::{MockFailure, MockOperation, MockPlatformClient};
use certplane::reconciler::RetryConfig;
use certplane::{
    verify_absent, AppRef, CertError, DesiredCertificate, EndpointState, OperationContext,
    Reconciler,
};

use super::harness::{
    random_app_name, Applied, Check, Scenario, ScenarioRunner, Step, FIXTURE_CHAIN,
    FIXTURE_INTERMEDIATE, FIXTURE_KEY, FIXTURE_KEY_ROTATED,
};

const SCENARIO_APP: &str = "tftest-abc1234567";

fn heroku_mock() -> Arc<MockPlatformClient> {
    Arc::new(MockPlatformClient::new("herokuapp.com"))
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        backoff_multiplier: 2.0,
    }
}

fn basic_scenario(app: &str) -> Scenario {
    let app_ref = AppRef::parse(app).unwrap();
    let canonical = format!("{}.herokuapp.com", app);

    Scenario {
        name: "ssl_endpoint_basic",
        steps: vec![
            Step {
                name: "create",
                desired: DesiredCertificate::new(app_ref.clone(), FIXTURE_CHAIN, FIXTURE_KEY),
                checks: vec![
                    Check::Exists,
                    Check::CanonicalName(canonical.clone()),
                    Check::ObservedChain(FIXTURE_CHAIN.to_string()),
                ],
            },
            Step {
                name: "rotate_key",
                desired: DesiredCertificate::new(app_ref, FIXTURE_CHAIN, FIXTURE_KEY_ROTATED),
                checks: vec![
                    Check::Exists,
                    Check::CanonicalName(canonical),
                    Check::ObservedChain(FIXTURE_CHAIN.to_string()),
                ],
            },
        ],
    }
}

#[tokio::test(start_paused = true)]
async fn test_basic_endpoint_scenario() {
    let mock = heroku_mock();
    mock.set_delete_lag(2).await;
    let runner = ScenarioRunner::new(mock.clone()).with_retry(fast_retry());

    let report = runner.run(&basic_scenario(SCENARIO_APP)).await.unwrap();

    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].applied, Applied::Created);
    assert_eq!(report.steps[1].applied, Applied::Updated);

    let created = &report.steps[0].descriptor;
    let rotated = &report.steps[1].descriptor;
    assert_eq!(created.canonical_name(), "tftest-abc1234567.herokuapp.com");
    assert_eq!(rotated.id(), created.id());
    assert_eq!(rotated.canonical_name(), created.canonical_name());

    assert_eq!(report.destroyed, vec![created.id().clone()]);
    assert_eq!(mock.endpoint_count().await, 0);

    let calls = mock.calls().await;
    assert_eq!(calls.create, 1);
    assert_eq!(calls.update, 1);
    assert_eq!(calls.delete, 1);
}

#[tokio::test]
async fn test_rotated_key_reaches_platform() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let ctx = OperationContext::new();
    let app = AppRef::parse(SCENARIO_APP).unwrap();

    let created = reconciler
        .create(&ctx, &DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY))
        .await
        .unwrap();
    assert_eq!(
        mock.private_key(&app, created.id()).await.unwrap().expose_secret(),
        FIXTURE_KEY
    );

    let rotated = DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY_ROTATED);

    // Same chain: reconcile sees no drift and leaves the old key in place.
    let outcome = reconciler.reconcile(&ctx, created.id(), &rotated).await.unwrap();
    assert!(!outcome.was_updated());
    assert_eq!(
        mock.private_key(&app, created.id()).await.unwrap().expose_secret(),
        FIXTURE_KEY
    );

    reconciler.update(&ctx, outcome.descriptor(), &rotated).await.unwrap();
    assert_eq!(
        mock.private_key(&app, created.id()).await.unwrap().expose_secret(),
        FIXTURE_KEY_ROTATED
    );
}

#[tokio::test]
async fn test_chain_change_goes_through_reconcile() {
    let mock = heroku_mock();
    let runner = ScenarioRunner::new(mock.clone()).with_retry(fast_retry());
    let app = AppRef::parse(random_app_name()).unwrap();

    let scenario = Scenario {
        name: "chain_swap",
        steps: vec![
            Step {
                name: "create",
                desired: DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY),
                checks: vec![Check::Exists],
            },
            Step {
                name: "same_again",
                desired: DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY),
                checks: vec![Check::ObservedChain(FIXTURE_CHAIN.to_string())],
            },
            Step {
                name: "swap_chain",
                desired: DesiredCertificate::new(app, FIXTURE_INTERMEDIATE, FIXTURE_KEY),
                checks: vec![Check::Exists, Check::ObservedChain(FIXTURE_INTERMEDIATE.to_string())],
            },
        ],
    };

    let report = runner.run(&scenario).await.unwrap();
    let applied: Vec<Applied> = report.steps.iter().map(|s| s.applied).collect();
    assert_eq!(applied, vec![Applied::Created, Applied::Unchanged, Applied::Updated]);
    assert_eq!(mock.calls().await.update, 1);
}

#[tokio::test]
async fn test_failed_step_still_tears_down() {
    let mock = heroku_mock();
    let runner = ScenarioRunner::new(mock.clone()).with_retry(fast_retry());

    let mut scenario = basic_scenario(SCENARIO_APP);
    scenario.steps[1].checks.push(Check::CanonicalName("wrong.herokuapp.com".to_string()));

    let err = runner.run(&scenario).await.unwrap_err();
    assert!(format!("{:#}", err).contains("rotate_key"));
    assert_eq!(mock.endpoint_count().await, 0);
    assert_eq!(mock.calls().await.delete, 1);
}

#[tokio::test]
async fn test_create_with_empty_key_makes_no_remote_call() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let desired = DesiredCertificate::new(AppRef::parse(SCENARIO_APP).unwrap(), FIXTURE_CHAIN, "");

    let err = reconciler.create(&OperationContext::new(), &desired).await.unwrap_err();

    assert!(
        matches!(err, CertError::Validation { field: Some(ref f), .. } if f == "private_key"),
        "unexpected error: {err:?}"
    );
    assert_eq!(mock.calls().await.total(), 0);
}

#[tokio::test]
async fn test_key_in_chain_slot_is_rejected_locally() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let desired =
        DesiredCertificate::new(AppRef::parse(SCENARIO_APP).unwrap(), FIXTURE_KEY, FIXTURE_KEY);

    let err = reconciler.create(&OperationContext::new(), &desired).await.unwrap_err();

    assert!(matches!(err, CertError::Validation { field: Some(ref f), .. } if f == "certificate_chain"));
    assert_eq!(mock.calls().await.total(), 0);
}

#[tokio::test]
async fn test_out_of_band_delete_is_recreated() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let ctx = OperationContext::new();
    let app = AppRef::parse(SCENARIO_APP).unwrap();
    let desired = DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY);

    let original = reconciler.create(&ctx, &desired).await.unwrap();
    reconciler.delete(&ctx, &app, original.id()).await.unwrap();

    // The stale descriptor is never refreshed into a present one.
    let state = reconciler.read(&ctx, &app, original.id()).await.unwrap();
    assert_eq!(state, EndpointState::Absent);

    let err = reconciler.reconcile(&ctx, original.id(), &desired).await.unwrap_err();
    assert!(matches!(err, CertError::NotFound { .. }));

    let resolved = reconciler.resolve(&ctx, &app, original.canonical_name()).await.unwrap();
    assert_eq!(resolved, EndpointState::Absent);

    let recreated = reconciler.create(&ctx, &desired).await.unwrap();
    assert_ne!(recreated.id(), original.id());
    assert_eq!(recreated.canonical_name(), original.canonical_name());
}

#[tokio::test]
async fn test_resolve_rebinds_by_canonical_name() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let ctx = OperationContext::new();
    let app = AppRef::parse(SCENARIO_APP).unwrap();

    let created = reconciler
        .create(&ctx, &DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY))
        .await
        .unwrap();

    let resolved = reconciler
        .resolve(&ctx, &app, "tftest-abc1234567.herokuapp.com")
        .await
        .unwrap()
        .into_present(&app, created.id())
        .unwrap();

    assert_eq!(resolved.id(), created.id());
    assert_eq!(resolved.observed_chain(), FIXTURE_CHAIN);
    assert_eq!(mock.calls().await.list, 1);
}

#[tokio::test]
async fn test_transient_read_failure_surfaces_as_retryable() {
    let mock = heroku_mock();
    let reconciler = Reconciler::new(mock.clone());
    let ctx = OperationContext::new();
    let app = AppRef::parse(SCENARIO_APP).unwrap();

    let created = reconciler
        .create(&ctx, &DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY))
        .await
        .unwrap();

    mock.fail_next(
        MockOperation::Get,
        MockFailure::Api { status: 429, message: "rate limited".to_string() },
    )
    .await;

    let err = verify_absent(&reconciler, &ctx, &app, created.id()).await.unwrap_err();
    assert!(matches!(err, CertError::Remote { .. }));
    assert!(err.is_retryable());

    // No local retry happened; the next call succeeds on its own.
    assert_eq!(mock.calls().await.get, 1);
    let err = verify_absent(&reconciler, &ctx, &app, created.id()).await.unwrap_err();
    assert!(matches!(err, CertError::StillExists { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_update_leaves_descriptor_untouched() {
    let mock = Arc::new(
        MockPlatformClient::new("herokuapp.com").with_latency(Duration::from_millis(100)),
    );
    let reconciler = Reconciler::new(mock.clone());
    let app = AppRef::parse(SCENARIO_APP).unwrap();

    let created = reconciler
        .create(
            &OperationContext::new(),
            &DesiredCertificate::new(app.clone(), FIXTURE_CHAIN, FIXTURE_KEY),
        )
        .await
        .unwrap();

    let ctx = OperationContext::new();
    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let err = reconciler
        .update(&ctx, &created, &DesiredCertificate::new(app.clone(), FIXTURE_INTERMEDIATE, FIXTURE_KEY))
        .await
        .unwrap_err();

    assert!(matches!(err, CertError::Canceled { .. }));
    assert_eq!(created.observed_chain(), FIXTURE_CHAIN);
    let remote = mock.endpoint(&app, created.id()).await.unwrap();
    assert_eq!(remote.certificate_chain, FIXTURE_CHAIN);
}
