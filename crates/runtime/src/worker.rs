//! Worker loop
//!
//! Each worker drains the shared queue until the running flag clears:
//! dequeue, parse, transform, backfill, fan out, count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{EgressRecord, InboundMessage, IngressEnvelope, TwinError, TwinIdentity};
use dispatcher::{SinkSet, WriteOutcome};
use ingestion::BoundedQueue;
use observability::RuntimeMetrics;
use tracing::{debug, info, warn};
use transform::TransformSlot;

/// Everything a worker needs, shared by all workers of one runtime
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<BoundedQueue<InboundMessage>>,
    pub transform: Arc<TransformSlot>,
    pub sinks: Arc<SinkSet>,
    pub identity: TwinIdentity,
    pub metrics: Arc<RuntimeMetrics>,
    pub running: Arc<AtomicBool>,
    pub poll_interval: Duration,
}

/// Run one worker until `running` is cleared
pub async fn run_worker(worker_id: usize, ctx: WorkerContext) {
    info!(worker = worker_id, "Worker started");
    let mut handled = 0u64;

    while ctx.running.load(Ordering::SeqCst) {
        let Some(message) = ctx.queue.get(Some(ctx.poll_interval)).await else {
            continue;
        };

        let started = Instant::now();
        match process_message(&ctx, &message).await {
            Ok(outcome) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                ctx.metrics.record_processed(latency_ms);
                handled += 1;
                if outcome.failed > 0 {
                    debug!(
                        worker = worker_id,
                        delivered = outcome.delivered,
                        failed = outcome.failed,
                        "Record partially delivered"
                    );
                }
            }
            Err(e) => {
                ctx.metrics.record_processing_error();
                warn!(
                    worker = worker_id,
                    topic = %message.topic,
                    error = %e,
                    "Processing failed, message dropped"
                );
            }
        }
        ctx.metrics.record_queue_depth(ctx.queue.size());
    }

    info!(worker = worker_id, handled, "Worker stopped");
}

/// Transform one message and deliver the resulting record to every sink
///
/// Only transform failures are returned; sink failures are isolated inside
/// the sink set and reported through the outcome. The transform runs on the
/// blocking pool so a slow model does not stall the async workers.
pub async fn process_message(
    ctx: &WorkerContext,
    message: &InboundMessage,
) -> Result<WriteOutcome, TwinError> {
    let envelope = IngressEnvelope::parse(message);
    let slot = Arc::clone(&ctx.transform);
    let input = envelope.clone();
    let mut output = tokio::task::spawn_blocking(move || slot.process(&input))
        .await
        .map_err(|e| {
            TwinError::transform(format!("transform task failed: {e}"))
                .with_detail("transform", ctx.transform.name())
        })??;

    let filled = output.backfill(&envelope);
    if !filled.is_empty() {
        warn!(
            transform = %ctx.transform.name(),
            missing = ?filled,
            "Transform output missing required keys, backfilled from envelope"
        );
    }

    let record = EgressRecord::build(&ctx.identity, &envelope, output);
    Ok(ctx.sinks.write_all(&record).await)
}
