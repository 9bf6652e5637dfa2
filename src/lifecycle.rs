//! Pod lifecycle orchestration.
//!
//! Drives one run through resolve template, pick the cheapest GPU, create
//! the pod, wait for RUNNING, hand it to the caller, terminate it.
//!
//! Nothing is created before template and GPU resolution succeed. Once a
//! pod exists, every exit path attempts termination, and a failed
//! termination is reported as its own error because the pod keeps billing.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::{LifecycleError, PodrunError, Result, RunPodError};
use crate::runpod::{
    CreatePodRequest, GpuOffer, Pod, PriceCatalog, ResolvedTemplate, RunPodApi, TemplateResolver,
};
use crate::state::TemplateStore;

/// States of a single orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Looking up or creating the launch template.
    ResolvingTemplate,
    /// Selecting the cheapest qualifying GPU.
    ResolvingGpu,
    /// Asking the provider for a pod.
    RequestingPod,
    /// Waiting for the pod to report RUNNING.
    Polling,
    /// Pod is running and handed to the caller.
    Ready,
    /// Termination requested.
    Terminating,
    /// Pod terminated; nothing more may be done with it.
    Terminated,
}

/// Orchestrates one pod from template resolution to termination.
pub struct PodLifecycleOrchestrator<'a, A: RunPodApi + ?Sized, S: TemplateStore + ?Sized> {
    /// Provider API.
    api: &'a A,
    /// Local template store.
    store: &'a S,
    /// Run configuration.
    config: &'a RunConfig,
    /// Delay between status checks.
    poll_interval: Duration,
    /// Maximum wait for RUNNING.
    ready_timeout: Option<Duration>,
    /// Phases entered so far.
    phases: Mutex<Vec<LifecyclePhase>>,
}

/// A running pod handed to the caller.
///
/// Dropping it does not terminate the pod; call [`ReadyPod::terminate`].
#[must_use = "a ready pod keeps billing until terminate() is called"]
pub struct ReadyPod<'o, A: RunPodApi + ?Sized> {
    /// Pod as last observed.
    pod: Pod,
    /// Selected GPU offer.
    gpu: GpuOffer,
    /// Template the pod was launched from.
    template: ResolvedTemplate,
    /// Provider API.
    api: &'o A,
    /// Phase log shared with the orchestrator.
    phases: &'o Mutex<Vec<LifecyclePhase>>,
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunOutcome<T> {
    /// ID of the (now terminated) pod.
    pub pod_id: String,
    /// GPU type the pod ran on.
    pub gpu_type_id: String,
    /// Template the pod was launched from.
    pub template_id: String,
    /// Value produced by the caller's work.
    pub output: T,
}

impl<'a, A: RunPodApi + ?Sized, S: TemplateStore + ?Sized> PodLifecycleOrchestrator<'a, A, S> {
    /// Creates an orchestrator for one run.
    #[must_use]
    pub fn new(api: &'a A, store: &'a S, config: &'a RunConfig) -> Self {
        Self {
            api,
            store,
            config,
            poll_interval: Duration::from_secs(config.lifecycle.poll_interval_secs),
            ready_timeout: config.lifecycle.ready_timeout(),
            phases: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the delay between status checks.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the wait deadline; `None` waits until RUNNING or cancellation.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Returns the phases entered so far, in order.
    #[must_use]
    pub fn phases(&self) -> Vec<LifecyclePhase> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs the lifecycle up to READY and hands the pod to the caller.
    ///
    /// # Errors
    ///
    /// Returns the resolver, catalog or creation error if the run stops
    /// before a pod exists. After creation, returns `PollingTimeout`,
    /// `Cancelled` or the polling error once termination has been
    /// attempted, or `Termination` if that cleanup failed.
    pub async fn provision(&self, cancel: &CancellationToken) -> Result<ReadyPod<'_, A>> {
        self.enter(LifecyclePhase::ResolvingTemplate);
        let template = TemplateResolver::new(self.api, self.store)
            .resolve_template(&self.config.template)
            .await?;
        Self::check_cancelled(cancel, LifecyclePhase::ResolvingTemplate)?;

        self.enter(LifecyclePhase::ResolvingGpu);
        let gpu = PriceCatalog::new(self.api)
            .select_cheapest_gpu(self.config.pod.min_memory_gb)
            .await?;
        Self::check_cancelled(cancel, LifecyclePhase::ResolvingGpu)?;

        self.enter(LifecyclePhase::RequestingPod);
        let mut request = CreatePodRequest::from_spec(&self.config.pod, template.id(), &gpu.id);
        if !template.template.image_name.is_empty() {
            request = request.with_image(&template.template.image_name);
        }

        let pod = self
            .api
            .create_pod(&request)
            .await
            .map_err(pod_creation_error)?;
        info!(
            "Pod created with ID: {} on {} (status: {})",
            pod.id, gpu.id, pod.desired_status
        );

        self.enter(LifecyclePhase::Polling);
        match self.wait_until_running(&pod.id, cancel).await {
            Ok(running) => {
                self.enter(LifecyclePhase::Ready);
                info!(
                    "Pod deployed with ID: {} and status: {}",
                    running.id, running.desired_status
                );
                Ok(ReadyPod {
                    pod: running,
                    gpu,
                    template,
                    api: self.api,
                    phases: &self.phases,
                })
            }
            Err(cause) => Err(self.abort(&pod.id, cause).await),
        }
    }

    /// Runs the full lifecycle, executing `work` while the pod is READY.
    ///
    /// The pod is terminated whether `work` succeeds, fails or is cancelled.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::provision`], the error returned by
    /// `work`, `Cancelled` if the token fires during `work`, or
    /// `Termination` if the final termination fails.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, work: F) -> Result<RunOutcome<T>>
    where
        F: FnOnce(Pod) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ready = self.provision(cancel).await?;
        let pod_id = ready.pod().id.clone();

        let work_result = tokio::select! {
            result = work(ready.pod().clone()) => result,
            () = cancel.cancelled() => Err(LifecycleError::Cancelled {
                phase: LifecyclePhase::Ready.to_string(),
                pod_id: Some(pod_id.clone()),
            }
            .into()),
        };

        let gpu_type_id = ready.gpu().id.clone();
        let template_id = ready.template().id().to_string();

        let cause = work_result.as_ref().err().map(ToString::to_string);
        if let Some(cause) = &cause {
            warn!("Work on pod {pod_id} failed: {cause}");
        }
        ready.terminate_with_cause(cause).await?;

        Ok(RunOutcome {
            pod_id,
            gpu_type_id,
            template_id,
            output: work_result?,
        })
    }

    /// Polls the pod until it reports RUNNING.
    async fn wait_until_running(&self, pod_id: &str, cancel: &CancellationToken) -> Result<Pod> {
        let start = Instant::now();
        let deadline = self.ready_timeout.map(|timeout| start + timeout);

        loop {
            let pod = tokio::select! {
                biased;
                result = self.api.get_pod(pod_id) => result?,
                () = cancel.cancelled() => return Err(polling_cancelled(pod_id)),
                () = until(deadline) => return Err(polling_timeout(pod_id, start)),
            };

            if pod.is_running() {
                debug!("Pod {pod_id} running after {:?}", start.elapsed());
                return Ok(pod);
            }

            if pod.desired_status.is_final() {
                return Err(LifecycleError::PodCreation {
                    message: format!(
                        "pod {pod_id} reached {} before running",
                        pod.desired_status
                    ),
                }
                .into());
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Err(polling_timeout(pod_id, start));
            }

            info!("Waiting for pod {pod_id}: {}", pod.desired_status);

            let wait = deadline.map_or(self.poll_interval, |deadline| {
                self.poll_interval.min(deadline.saturating_duration_since(now))
            });

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = cancel.cancelled() => return Err(polling_cancelled(pod_id)),
            }
        }
    }

    /// Terminates a pod that never reached READY and returns the error to report.
    async fn abort(&self, pod_id: &str, cause: PodrunError) -> PodrunError {
        warn!("Pod {pod_id} did not become ready ({cause}), terminating it");
        match terminate(self.api, &self.phases, pod_id, Some(cause.to_string())).await {
            Ok(()) => cause,
            Err(termination) => termination,
        }
    }

    /// Records entry into a phase.
    fn enter(&self, phase: LifecyclePhase) {
        record(&self.phases, phase);
    }

    /// Fails with `Cancelled` if the token has fired.
    fn check_cancelled(cancel: &CancellationToken, phase: LifecyclePhase) -> Result<()> {
        if cancel.is_cancelled() {
            info!("Run cancelled during {phase}, no pod was created");
            return Err(LifecycleError::Cancelled {
                phase: phase.to_string(),
                pod_id: None,
            }
            .into());
        }
        Ok(())
    }
}

impl<A: RunPodApi + ?Sized> ReadyPod<'_, A> {
    /// Returns the running pod.
    #[must_use]
    pub const fn pod(&self) -> &Pod {
        &self.pod
    }

    /// Returns the selected GPU offer.
    #[must_use]
    pub const fn gpu(&self) -> &GpuOffer {
        &self.gpu
    }

    /// Returns the template the pod was launched from.
    #[must_use]
    pub const fn template(&self) -> &ResolvedTemplate {
        &self.template
    }

    /// Terminates the pod.
    ///
    /// # Errors
    ///
    /// Returns `Termination` if the provider refuses; the pod may still be
    /// running and billing.
    pub async fn terminate(self) -> Result<()> {
        self.terminate_with_cause(None).await
    }

    /// Terminates the pod, attaching `cause` to a termination failure.
    async fn terminate_with_cause(self, cause: Option<String>) -> Result<()> {
        terminate(self.api, self.phases, &self.pod.id, cause).await
    }
}

/// Issues the termination request and records the TERMINATING/TERMINATED phases.
async fn terminate<A: RunPodApi + ?Sized>(
    api: &A,
    phases: &Mutex<Vec<LifecyclePhase>>,
    pod_id: &str,
    cause: Option<String>,
) -> Result<()> {
    record(phases, LifecyclePhase::Terminating);

    if let Err(e) = api.terminate_pod(pod_id).await {
        error!("Failed to terminate pod {pod_id}, it may still be billing: {e}");
        return Err(LifecycleError::Termination {
            pod_id: pod_id.to_string(),
            message: e.to_string(),
            cause,
        }
        .into());
    }

    record(phases, LifecyclePhase::Terminated);
    info!("Pod with ID: {pod_id} terminated successfully");
    Ok(())
}

/// Resolves at `deadline`, or never when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn polling_timeout(pod_id: &str, start: Instant) -> PodrunError {
    LifecycleError::PollingTimeout {
        pod_id: pod_id.to_string(),
        waited_secs: start.elapsed().as_secs(),
    }
    .into()
}

fn polling_cancelled(pod_id: &str) -> PodrunError {
    LifecycleError::Cancelled {
        phase: LifecyclePhase::Polling.to_string(),
        pod_id: Some(pod_id.to_string()),
    }
    .into()
}

/// Appends a phase to the log.
fn record(phases: &Mutex<Vec<LifecyclePhase>>, phase: LifecyclePhase) {
    debug!("Entering {phase}");
    phases
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(phase);
}

/// Turns a provider rejection into a `PodCreation` error.
fn pod_creation_error(error: PodrunError) -> PodrunError {
    match error {
        PodrunError::RunPod(
            RunPodError::ApiRequestFailed { message, .. } | RunPodError::InvalidResponse { message },
        ) => LifecycleError::PodCreation { message }.into(),
        other => other,
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Self::ResolvingTemplate => "RESOLVING_TEMPLATE",
            Self::ResolvingGpu => "RESOLVING_GPU",
            Self::RequestingPod => "REQUESTING_POD",
            Self::Polling => "POLLING",
            Self::Ready => "READY",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
        };
        write!(f, "{phase}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpecHasher, TemplateSpec};
    use crate::runpod::{LowestPrice, MockRunPodApi, PodStatus, PodTemplate, StockStatus};
    use crate::state::{LocalTemplateStore, StoredTemplate};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use LifecyclePhase::{
        Polling, Ready, RequestingPod, ResolvingGpu, ResolvingTemplate, Terminated, Terminating,
    };

    fn offer(id: &str, memory: u32, price: f64, stock: StockStatus) -> GpuOffer {
        GpuOffer {
            id: id.to_string(),
            display_name: format!("GPU {id}"),
            memory_in_gb: Some(memory),
            lowest_price: Some(LowestPrice {
                uninterruptable_price: Some(price),
                minimum_bid_price: None,
                stock_status: Some(stock),
            }),
        }
    }

    fn market() -> Vec<GpuOffer> {
        vec![
            offer("A", 16, 0.5, StockStatus::High),
            offer("B", 24, 0.9, StockStatus::High),
            offer("C", 48, 0.7, StockStatus::NoStock),
        ]
    }

    fn pod(id: &str, status: PodStatus) -> Pod {
        Pod {
            id: id.to_string(),
            name: String::from("ComicGenPod"),
            desired_status: status,
            image_name: TemplateSpec::default().image,
            machine: None,
            gpu_count: 1,
            volume_in_gb: 100,
            container_disk_in_gb: 100,
            cost_per_hr: Some(0.9),
        }
    }

    fn template(id: &str, name: &str) -> PodTemplate {
        PodTemplate {
            id: id.to_string(),
            name: name.to_string(),
            image_name: TemplateSpec::default().image,
            container_disk_in_gb: 10,
            volume_in_gb: 10,
            volume_mount_path: Some(String::from("/workspace")),
            ports: Some(String::from("8888/http,666/tcp")),
        }
    }

    /// Mock with template creation and GPU selection wired up.
    fn provider() -> MockRunPodApi {
        let mut api = MockRunPodApi::new();
        api.expect_list_templates().returning(|| Ok(Vec::new()));
        api.expect_create_template()
            .returning(|name, _| Ok(template("tmpl-1", name)));
        api.expect_gpu_offers().returning(|_| Ok(market()));
        api
    }

    fn expect_pod_created(api: &mut MockRunPodApi) {
        api.expect_create_pod()
            .times(1)
            .returning(|_| Ok(pod("pod-1", PodStatus::Created)));
    }

    fn setup() -> (RunConfig, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        (RunConfig::default(), temp)
    }

    fn orchestrator<'a>(
        api: &'a MockRunPodApi,
        store: &'a LocalTemplateStore,
        config: &'a RunConfig,
    ) -> PodLifecycleOrchestrator<'a, MockRunPodApi, LocalTemplateStore> {
        PodLifecycleOrchestrator::new(api, store, config)
            .with_poll_interval(Duration::from_millis(1))
            .with_ready_timeout(Some(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_full_run_terminates_after_work() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        api.expect_create_pod()
            .withf(|request| {
                request.template_id == "tmpl-1"
                    && request.gpu_type_id == "B"
                    && request.gpu_count == 1
                    && request.cloud_type.as_str() == "SECURE"
                    && request.volume_in_gb == 100
            })
            .times(1)
            .returning(|_| Ok(pod("pod-1", PodStatus::Created)));
        let polls = Arc::new(AtomicUsize::new(0));
        let poll_counter = Arc::clone(&polls);
        api.expect_get_pod().returning(move |id| {
            let n = poll_counter.fetch_add(1, Ordering::SeqCst);
            let status = if n < 2 { PodStatus::Created } else { PodStatus::Running };
            Ok(pod(id, status))
        });
        api.expect_terminate_pod()
            .withf(|id| id == "pod-1")
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config);
        let outcome = orchestrator
            .run(&CancellationToken::new(), |pod| async move {
                assert!(pod.is_running());
                Ok(format!("trained on {}", pod.id))
            })
            .await
            .expect("run succeeds");

        assert_eq!(outcome.output, "trained on pod-1");
        assert_eq!(outcome.gpu_type_id, "B");
        assert_eq!(outcome.template_id, "tmpl-1");
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(
            orchestrator.phases(),
            vec![
                ResolvingTemplate,
                ResolvingGpu,
                RequestingPod,
                Polling,
                Ready,
                Terminating,
                Terminated
            ]
        );
    }

    #[tokio::test]
    async fn test_provision_then_explicit_terminate() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Running)));
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config);
        let ready = orchestrator
            .provision(&CancellationToken::new())
            .await
            .expect("provision succeeds");

        assert_eq!(ready.pod().id, "pod-1");
        assert_eq!(ready.gpu().id, "B");
        assert_eq!(orchestrator.phases().last(), Some(&Ready));

        ready.terminate().await.expect("terminate succeeds");
        assert_eq!(orchestrator.phases().last(), Some(&Terminated));
    }

    #[tokio::test]
    async fn test_no_eligible_gpu_never_requests_pod() {
        let (mut config, temp) = setup();
        config.pod.min_memory_gb = 64;
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        api.expect_create_pod().times(0);
        api.expect_terminate_pod().times(0);

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::NoEligibleOffer { min_memory_gb: 64, .. })
        ));
        assert_eq!(orchestrator.phases(), vec![ResolvingTemplate, ResolvingGpu]);
    }

    #[tokio::test]
    async fn test_template_failure_aborts_before_gpu_selection() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = MockRunPodApi::new();
        api.expect_list_templates().returning(|| Ok(Vec::new()));
        api.expect_create_template()
            .returning(|_, _| Err(RunPodError::api_error(400, "quota exceeded").into()));
        api.expect_gpu_offers().times(0);
        api.expect_create_pod().times(0);

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .provision(&CancellationToken::new())
            .await
            .err()
            .expect("provision fails");

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::TemplateCreation { .. })
        ));
        assert_eq!(orchestrator.phases(), vec![ResolvingTemplate]);
    }

    #[tokio::test]
    async fn test_rejected_pod_creation() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        api.expect_create_pod()
            .times(1)
            .returning(|_| Err(RunPodError::api_error(400, "no capacity").into()));
        api.expect_get_pod().times(0);
        api.expect_terminate_pod().times(0);

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::PodCreation { ref message }) if message == "no capacity"
        ));
    }

    #[tokio::test]
    async fn test_polling_timeout_terminates_pod() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Created)));
        api.expect_terminate_pod()
            .withf(|id| id == "pod-1")
            .times(1)
            .returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config)
            .with_ready_timeout(Some(Duration::from_millis(30)));
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::PollingTimeout { ref pod_id, .. }) if pod_id == "pod-1"
        ));
        assert_eq!(orchestrator.phases().last(), Some(&Terminated));
        assert!(!orchestrator.phases().contains(&Ready));
    }

    #[tokio::test]
    async fn test_cancel_while_polling_terminates_pod() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());
        let cancel = CancellationToken::new();

        let mut api = provider();
        expect_pod_created(&mut api);
        let trigger = cancel.clone();
        api.expect_get_pod().returning(move |id| {
            trigger.cancel();
            Ok(pod(id, PodStatus::Pending))
        });
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config)
            .with_poll_interval(Duration::from_secs(60))
            .with_ready_timeout(None);
        let err = orchestrator
            .run(&cancel, |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::Cancelled { pod_id: Some(ref id), .. }) if id == "pod-1"
        ));
        assert_eq!(orchestrator.phases().last(), Some(&Terminated));
    }

    #[tokio::test]
    async fn test_cancel_before_creation_creates_nothing() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut api = provider();
        api.expect_create_pod().times(0);
        api.expect_terminate_pod().times(0);

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator.run(&cancel, |_| async { Ok(()) }).await.unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::Cancelled { pod_id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_work_still_terminates() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Running)));
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async {
                Err::<(), _>(PodrunError::internal("training crashed"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PodrunError::Internal(ref m) if m == "training crashed"));
        assert_eq!(orchestrator.phases().last(), Some(&Terminated));
    }

    #[tokio::test]
    async fn test_termination_failure_is_surfaced() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Running)));
        api.expect_terminate_pod()
            .times(1)
            .returning(|_| Err(RunPodError::api_error(500, "internal error").into()));

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(42) })
            .await
            .unwrap_err();

        assert!(err.is_leaked_pod());
        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::Termination { ref pod_id, cause: None, .. }) if pod_id == "pod-1"
        ));
        assert_eq!(orchestrator.phases().last(), Some(&Terminating));
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_cause() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Created)));
        api.expect_terminate_pod()
            .times(1)
            .returning(|_| Err(RunPodError::network("connection reset").into()));

        let orchestrator = orchestrator(&api, &store, &config)
            .with_ready_timeout(Some(Duration::from_millis(10)));
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::Termination { cause: Some(ref cause), .. })
                if cause.contains("did not reach RUNNING")
        ));
    }

    #[tokio::test]
    async fn test_pod_exiting_before_running_is_a_failed_start() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Exited)));
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config).with_ready_timeout(None);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::PodCreation { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_error_terminates_then_surfaces() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());

        let mut api = provider();
        expect_pod_created(&mut api);
        api.expect_get_pod().returning(|id| {
            Err(RunPodError::PodNotFound {
                pod_id: id.to_string(),
            }
            .into())
        });
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config);
        let err = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PodrunError::RunPod(RunPodError::PodNotFound { .. })
        ));
        assert_eq!(orchestrator.phases().last(), Some(&Terminated));
    }

    #[tokio::test]
    async fn test_stored_template_skips_provider_lookup() {
        let (config, temp) = setup();
        let store = LocalTemplateStore::with_base_dir(temp.path());
        let hasher = SpecHasher::new();
        let hash = hasher.hash_template(&config.template);
        store
            .save(&StoredTemplate::new(
                &config.template.name,
                &hash,
                template("tmpl-stored", &hasher.qualified_name(&config.template)),
            ))
            .await
            .expect("seed store");

        let mut api = MockRunPodApi::new();
        api.expect_list_templates().times(0);
        api.expect_create_template().times(0);
        api.expect_gpu_offers().returning(|_| Ok(market()));
        api.expect_create_pod()
            .withf(|request| request.template_id == "tmpl-stored")
            .times(1)
            .returning(|_| Ok(pod("pod-1", PodStatus::Running)));
        api.expect_get_pod()
            .returning(|id| Ok(pod(id, PodStatus::Running)));
        api.expect_terminate_pod().times(1).returning(|_| Ok(()));

        let orchestrator = orchestrator(&api, &store, &config);
        let outcome = orchestrator
            .run(&CancellationToken::new(), |_| async { Ok(()) })
            .await
            .expect("run succeeds");
        assert_eq!(outcome.template_id, "tmpl-stored");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ResolvingTemplate.to_string(), "RESOLVING_TEMPLATE");
        assert_eq!(Terminated.to_string(), "TERMINATED");
    }
}
