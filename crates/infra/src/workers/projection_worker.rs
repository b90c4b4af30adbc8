use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use workshop_core::TenantId;
use workshop_events::{EventBus, Subscription, TenantScoped};

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request shutdown and wait for the worker thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

/// Bus subscriber loop running on a dedicated thread.
///
/// The handler must be idempotent: delivery is at-least-once. Handler errors
/// are logged and the loop moves on to the next message.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Subscribe now, then process messages on a new thread.
    ///
    /// With `tenant_id` set, messages for other tenants are skipped.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Display + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

        debug!(worker = name, "worker started");
        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Display,
{
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if tenant_id.is_some_and(|t| msg.tenant_id() != t) {
                    continue;
                }
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = %err, "worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use workshop_core::AggregateId;
    use workshop_events::{EventEnvelope, InMemoryEventBus};
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, n: u64) -> EventEnvelope<u64> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, AggregateId::new(), "test", n, n)
    }

    fn wait_for(seen: &Mutex<Vec<u64>>, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().len() < len && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn tenant_filter_skips_other_tenants() {
        let bus = InMemoryEventBus::<EventEnvelope<u64>>::new();
        let tenant = TenantId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = ProjectionWorker::spawn("test-filter", &bus, Some(tenant), move |m: EventEnvelope<u64>| {
            sink.lock().unwrap().push(*m.payload());
            Ok::<_, String>(())
        })
        .unwrap();

        bus.publish(envelope(TenantId::new(), 1)).unwrap();
        bus.publish(envelope(tenant, 2)).unwrap();
        wait_for(&seen, 1);
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn handler_errors_do_not_stop_the_loop() {
        let bus = InMemoryEventBus::<EventEnvelope<u64>>::new();
        let tenant = TenantId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = ProjectionWorker::spawn("test-errors", &bus, None, move |m: EventEnvelope<u64>| {
            let n = *m.payload();
            if n == 1 {
                return Err("boom".to_string());
            }
            sink.lock().unwrap().push(n);
            Ok(())
        })
        .unwrap();

        bus.publish(envelope(tenant, 1)).unwrap();
        bus.publish(envelope(tenant, 2)).unwrap();
        wait_for(&seen, 1);
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }
}
