//! Pull mode: one worker per configured `(project, subscription)` pair,
//! supervised by a task group that reloads on `ConfigCatalog` changes
//! (§4.7 *Pull*, *Reload*; §9 "one parent context, one derived context per
//! reload generation").

use std::sync::Arc;

use gateway_config::{ConfigCatalog, PubsubTrigger};
use gateway_types::bus::BusMessage;
use gateway_types::error::GatewayError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::decode::decode_request;
use crate::push::Pipeline;

/// The injected pull-subscription collaborator (the *MessageSource* named
/// in §1, out of scope). `receive` suspends until a message arrives or
/// `cancel` fires, returning `None` on cancellation or permanent closure.
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    async fn receive(
        &self,
        project: &str,
        subscription: &str,
        cancel: CancellationToken,
    ) -> Option<Result<BusMessage, GatewayError>>;

    /// Acked regardless of pipeline outcome (§4.7): bus retries are not
    /// used as a reliability mechanism here.
    async fn ack(&self, project: &str, subscription: &str, message: &BusMessage);
}

/// Supervises one worker per `(project, subscription)` pair, restarting
/// the whole set whenever the trigger list changes.
pub struct PullSupervisor {
    source: Arc<dyn MessageSource>,
    pipeline: Arc<dyn Pipeline>,
}

impl PullSupervisor {
    pub fn new(source: Arc<dyn MessageSource>, pipeline: Arc<dyn Pipeline>) -> Self {
        Self { source, pipeline }
    }

    fn spawn_workers(&self, triggers: &[PubsubTrigger], generation: CancellationToken) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for trigger in triggers {
            let source = self.source.clone();
            let pipeline = self.pipeline.clone();
            let project = trigger.project.clone();
            let subscription = trigger.subscription.clone();
            let cancel = generation.clone();
            set.spawn(async move { run_worker(source, pipeline, project, subscription, cancel).await });
        }
        set
    }

    /// Run until `parent` is cancelled. On every catalog delta whose
    /// trigger list differs from the current one, cancels the running
    /// generation, awaits every worker's exit, and starts a fresh one.
    pub async fn run(self: Arc<Self>, catalog: Arc<ConfigCatalog>, parent: CancellationToken) {
        let mut current = catalog.pubsub_triggers();
        let mut rx = catalog.subscribe();
        let mut generation = parent.child_token();
        let mut workers = self.spawn_workers(&current, generation.clone());

        loop {
            tokio::select! {
                _ = parent.cancelled() => {
                    generation.cancel();
                    while workers.join_next().await.is_some() {}
                    return;
                }
                delta = rx.recv() => {
                    let Some(config) = delta else { continue };
                    if config.pubsub_triggers != current {
                        tracing::info!("pubsub trigger list changed, reloading pull workers");
                        generation.cancel();
                        while workers.join_next().await.is_some() {}
                        current = config.pubsub_triggers.clone();
                        generation = parent.child_token();
                        workers = self.spawn_workers(&current, generation.clone());
                    }
                }
            }
        }
    }
}

async fn run_worker(
    source: Arc<dyn MessageSource>,
    pipeline: Arc<dyn Pipeline>,
    project: String,
    subscription: String,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let Some(received) = source.receive(&project, &subscription, cancel.clone()).await else {
            return;
        };
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(project, subscription, error = %e, "bus receive failed");
                continue;
            }
        };

        match decode_request(&message) {
            Ok(request) => {
                if let Err(e) = pipeline.dispatch(request).await {
                    tracing::warn!(project, subscription, error = %e, "pull pipeline rejected the request");
                }
            }
            Err(e) => {
                tracing::warn!(project, subscription, error = %e, "pull decode failed");
            }
        }

        // Always ack: a poison message must not accumulate backlog (§4.7).
        source.ack(&project, &subscription, &message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_config::Config;
    use gateway_types::bus::BusPayload;
    use gateway_types::request::{ExecutionType, JobExecutionRequest};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct QueueSource {
        queue: Mutex<Vec<BusMessage>>,
        acked: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessageSource for QueueSource {
        async fn receive(
            &self,
            _project: &str,
            _subscription: &str,
            cancel: CancellationToken,
        ) -> Option<Result<BusMessage, GatewayError>> {
            loop {
                if let Some(message) = self.queue.lock().unwrap().pop() {
                    return Some(Ok(message));
                }
                if cancel.is_cancelled() {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn ack(&self, _project: &str, _subscription: &str, _message: &BusMessage) {
            self.acked.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RecordingPipeline {
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait::async_trait]
    impl Pipeline for RecordingPipeline {
        async fn dispatch(&self, request: JobExecutionRequest) -> Result<(), GatewayError> {
            let _ = self.tx.send(request.job_name);
            Ok(())
        }
    }

    fn periodic_message(name: &str) -> BusMessage {
        let payload = BusPayload {
            name: name.to_string(),
            refs: None,
            envs: BTreeMap::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        };
        BusMessage::encode(ExecutionType::Periodic, &payload, "m")
    }

    #[tokio::test]
    async fn worker_acks_every_message_regardless_of_outcome() {
        let source = Arc::new(QueueSource {
            queue: Mutex::new(vec![periodic_message("nightly")]),
            acked: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline = Arc::new(RecordingPipeline { tx });
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        let worker_source = source.clone();
        let handle = tokio::spawn(run_worker(
            worker_source,
            pipeline,
            "p".into(),
            "s".into(),
            worker_cancel,
        ));

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, "nightly");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.acked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn supervisor_reloads_workers_when_trigger_list_changes() {
        let source = Arc::new(QueueSource {
            queue: Mutex::new(Vec::new()),
            acked: AtomicUsize::new(0),
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let pipeline = Arc::new(RecordingPipeline { tx });
        let supervisor = Arc::new(PullSupervisor::new(source, pipeline));

        let mut config = Config::default();
        config.pubsub_triggers = vec![PubsubTrigger {
            project: "p1".into(),
            subscription: "s1".into(),
        }];
        let catalog = Arc::new(ConfigCatalog::new(config.clone()));
        let parent = CancellationToken::new();

        let run_handle = tokio::spawn(supervisor.run(catalog.clone(), parent.clone()));

        config.pubsub_triggers.push(PubsubTrigger {
            project: "p2".into(),
            subscription: "s2".into(),
        });
        catalog.replace(config);
        tokio::time::sleep(Duration::from_millis(50)).await;

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), run_handle)
            .await
            .unwrap()
            .unwrap();
    }
}
