//! # Example: connection, session and channel recovery
//!
//! A simulated engine where the first two dials fail with transient errors,
//! then a session and a CBS channel are opened on the connection. Halfway
//! through, the broker force-closes the connection and everything recovers on
//! the next `get`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=amqp_recovery=debug cargo run --example connection_recovery
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use amqp_recovery::{
    AmqpError, ErrorCondition, FactoryFn, LifecycleHandle, LifecycleSignal, LogWriter, Monitor,
    Recoverable, RecoveryConfig, RequestResponseChannel, ResourceContext, RetryMode, Subscribe,
    lifecycle,
};
use tracing_subscriber::EnvFilter;

/// Stand-in for an engine endpoint (connection, session or link).
struct Endpoint {
    label: String,
    handle: LifecycleHandle,
    states: LifecycleSignal,
}

impl Endpoint {
    /// Opens an endpoint the peer acknowledges after `latency`.
    fn open(label: String, latency: Duration) -> Arc<Self> {
        let (handle, states) = lifecycle::channel();
        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            remote.activate();
        });
        Arc::new(Self {
            label,
            handle,
            states,
        })
    }

    /// Opens an endpoint the peer rejects after `latency`.
    fn rejected(label: String, latency: Duration, condition: ErrorCondition) -> Arc<Self> {
        let (handle, states) = lifecycle::channel();
        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            remote.error(AmqpError::endpoint(condition, "simulated rejection"));
        });
        Arc::new(Self {
            label,
            handle,
            states,
        })
    }
}

impl Recoverable for Endpoint {
    fn endpoint_states(&self) -> LifecycleSignal {
        self.states.clone()
    }

    fn close(&self) {
        self.handle.complete();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let mut cfg = RecoveryConfig::default();
    cfg.retry.mode = RetryMode::Exponential;
    cfg.retry.delay = Duration::from_millis(100);
    cfg.retry.try_timeout = Duration::from_secs(2);
    cfg.validate()?;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let monitor = Monitor::new(cfg, subs);
    let namespace = ResourceContext::new("connection", "demo.servicebus.example.net");

    let dials = Arc::new(AtomicUsize::new(0));
    let connections = monitor.connection_cache(namespace.clone(), {
        let dials = Arc::clone(&dials);
        FactoryFn::new(move || {
            let n = dials.fetch_add(1, Ordering::SeqCst);
            let label = format!("connection #{n}");
            let latency = Duration::from_millis(50);
            Ok::<_, AmqpError>(match n {
                0 => Endpoint::rejected(label, latency, ErrorCondition::ConnectionForced),
                1 => Endpoint::rejected(label, latency, ErrorCondition::ServerBusy),
                _ => Endpoint::open(label, latency),
            })
        })
    });

    let sessions = monitor.session_cache(
        namespace.clone(),
        FactoryFn::new(|name: &String| {
            Ok::<_, AmqpError>(Endpoint::open(
                format!("session {name}"),
                Duration::from_millis(20),
            ))
        }),
    );

    let channels = monitor.channel_cache(
        namespace.child("channel").with_name("$cbs"),
        FactoryFn::new({
            let namespace = namespace.clone();
            move || {
                let sender = Endpoint::open("$cbs sender".into(), Duration::from_millis(30));
                let receiver = Endpoint::open("$cbs receiver".into(), Duration::from_millis(10));
                Ok::<_, AmqpError>(Arc::new(RequestResponseChannel::new(
                    namespace.child("channel").with_name("$cbs"),
                    sender,
                    receiver,
                )))
            }
        }),
    );

    let conn = connections.get().await?;
    tracing::info!(connection = %conn.label, "connected");

    let session = sessions.get("orders").await?;
    let cbs = channels.get().await?;
    tracing::info!(session = %session.label, sender = %cbs.sender().label, "session and channel ready");

    // the broker drops the connection; sessions and links die with it
    conn.handle
        .error(AmqpError::endpoint(ErrorCondition::ConnectionForced, "idle timeout"));
    session.handle.complete();
    cbs.receiver()
        .handle
        .error(AmqpError::endpoint(ErrorCondition::LinkDetachForced, "connection lost"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    tracing::info!(closed = connections.is_current_closed(), "after broker disconnect");

    let conn = connections.get().await?;
    let session = sessions.get("orders").await?;
    let cbs = channels.get().await?;
    tracing::info!(
        connection = %conn.label,
        session = %session.label,
        sender = %cbs.sender().label,
        "recovered"
    );

    // owner shutdown: keep children cached while tearing down, then dispose
    sessions.set_owner_disposed();
    channels.set_owner_disposed();
    sessions.dispose();
    channels.dispose();
    connections.dispose();

    if let Err(err) = sessions.get("orders").await {
        tracing::info!(%err, "sessions after dispose");
    }

    monitor.shutdown().await;
    Ok(())
}
