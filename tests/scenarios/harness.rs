//! Scenario harness: named sequences of desired configurations applied the
//! way a configuration engine applies them, with assertions after each step.

use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use certplane::platform::PlatformClient;
use certplane::reconciler::{verify_absent_with_retry, RetryConfig};
use certplane::{
    AppRef, CertificateDescriptor, DesiredCertificate, EndpointId, OperationContext, Reconciler,
};

pub const FIXTURE_CHAIN: &str = include_str!("../fixtures/terraform.cert");
pub const FIXTURE_KEY: &str = include_str!("../fixtures/terraform.key");
pub const FIXTURE_KEY_ROTATED: &str = include_str!("../fixtures/terraform2.key");
pub const FIXTURE_INTERMEDIATE: &str = include_str!("../fixtures/intermediate.cert");

/// Acceptance-test style app name: `tftest-` followed by ten random characters.
pub fn random_app_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("tftest-{}", &suffix[..10])
}

/// Assertion evaluated against the descriptor after a step is applied.
#[derive(Debug, Clone)]
pub enum Check {
    /// The endpoint can be read back by id
    Exists,
    /// Canonical name equals the literal value
    CanonicalName(String),
    /// Observed chain equals the literal value, byte for byte
    ObservedChain(String),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: &'static str,
    pub desired: DesiredCertificate,
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub steps: Vec<Step>,
}

/// How a step reached the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug)]
pub struct StepReport {
    pub step: &'static str,
    pub applied: Applied,
    pub descriptor: CertificateDescriptor,
}

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub destroyed: Vec<EndpointId>,
}

pub struct ScenarioRunner {
    reconciler: Reconciler,
    ctx: OperationContext,
    retry: RetryConfig,
}

impl ScenarioRunner {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            reconciler: Reconciler::new(client),
            ctx: OperationContext::new(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Apply every step, then destroy and verify absence of every endpoint
    /// created along the way. Teardown runs even when a step fails.
    pub async fn run(&self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        let mut report = ScenarioReport::default();
        let mut created: Vec<(AppRef, EndpointId)> = Vec::new();

        let result = self.apply_steps(scenario, &mut report, &mut created).await;
        let teardown = self.teardown(&created, &mut report).await;

        result.with_context(|| format!("scenario '{}' failed", scenario.name))?;
        teardown.with_context(|| format!("scenario '{}' teardown failed", scenario.name))?;
        Ok(report)
    }

    async fn apply_steps(
        &self,
        scenario: &Scenario,
        report: &mut ScenarioReport,
        created: &mut Vec<(AppRef, EndpointId)>,
    ) -> anyhow::Result<()> {
        let mut current: Option<(CertificateDescriptor, DesiredCertificate)> = None;

        for step in &scenario.steps {
            let (applied, descriptor) = match current.take() {
                None => {
                    let descriptor = self.reconciler.create(&self.ctx, &step.desired).await?;
                    created.push((descriptor.app().clone(), descriptor.id().clone()));
                    (Applied::Created, descriptor)
                }
                Some((previous, previous_desired)) => {
                    self.apply_change(&previous, &previous_desired, &step.desired).await?
                }
            };

            check_step(step, &descriptor)
                .with_context(|| format!("step '{}' assertions", step.name))?;
            self.check_remote(step, &descriptor).await?;

            report.steps.push(StepReport { step: step.name, applied, descriptor: descriptor.clone() });
            current = Some((descriptor, step.desired.clone()));
        }

        Ok(())
    }

    /// Key-only changes are invisible to drift detection and are forced
    /// through update; everything else goes through reconcile.
    async fn apply_change(
        &self,
        previous: &CertificateDescriptor,
        previous_desired: &DesiredCertificate,
        desired: &DesiredCertificate,
    ) -> anyhow::Result<(Applied, CertificateDescriptor)> {
        let key_changed = previous_desired.private_key != desired.private_key;
        let chain_changed = previous_desired.certificate_chain != desired.certificate_chain;

        if key_changed && !chain_changed {
            let descriptor = self.reconciler.update(&self.ctx, previous, desired).await?;
            return Ok((Applied::Updated, descriptor));
        }

        let outcome = self.reconciler.reconcile(&self.ctx, previous.id(), desired).await?;
        let applied = if outcome.was_updated() { Applied::Updated } else { Applied::Unchanged };
        Ok((applied, outcome.into_descriptor()))
    }

    async fn check_remote(&self, step: &Step, descriptor: &CertificateDescriptor) -> anyhow::Result<()> {
        if !step.checks.iter().any(|c| matches!(c, Check::Exists)) {
            return Ok(());
        }

        let state = self.reconciler.read(&self.ctx, descriptor.app(), descriptor.id()).await?;
        let Some(remote) = state.as_present() else {
            bail!("step '{}': endpoint {} does not exist", step.name, descriptor.id());
        };

        ensure!(
            remote.canonical_name() == descriptor.canonical_name(),
            "step '{}': remote canonical name '{}' differs from bound '{}'",
            step.name,
            remote.canonical_name(),
            descriptor.canonical_name()
        );
        ensure!(
            remote.observed_chain() == descriptor.observed_chain(),
            "step '{}': remote chain differs from bound chain",
            step.name
        );
        Ok(())
    }

    async fn teardown(
        &self,
        created: &[(AppRef, EndpointId)],
        report: &mut ScenarioReport,
    ) -> anyhow::Result<()> {
        for (app, id) in created {
            self.reconciler.delete(&self.ctx, app, id).await?;
            verify_absent_with_retry(&self.reconciler, &self.ctx, app, id, &self.retry)
                .await
                .with_context(|| format!("endpoint {} still exists after destroy", id))?;
            report.destroyed.push(id.clone());
        }
        Ok(())
    }
}

fn check_step(step: &Step, descriptor: &CertificateDescriptor) -> anyhow::Result<()> {
    for check in &step.checks {
        match check {
            Check::Exists => {}
            Check::CanonicalName(expected) => ensure!(
                descriptor.canonical_name() == expected,
                "canonical name '{}' != '{}'",
                descriptor.canonical_name(),
                expected
            ),
            Check::ObservedChain(expected) => ensure!(
                descriptor.observed_chain() == expected,
                "observed chain does not match expected contents"
            ),
        }
    }
    Ok(())
}
