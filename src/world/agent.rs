use super::World;
use crate::agent::{AgentContext, ResponderKind, ENVIRONMENT_CAPABILITY};
use crate::incident::Severity;
use crate::message::{CoordinatePayload, Envelope, FeedPayload, IgnitePayload, MessageKind, ReasonPayload};
use crate::monitor::AgentSnapshot;
use crate::transport::Mailbox;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

/// Event loop owning the [`World`].
pub struct WorldAgent {
    core: World,
    ctx: AgentContext,
    mailbox: Mailbox,
    tick_interval: Duration,
}

impl WorldAgent {
    pub fn new(core: World, ctx: AgentContext, mailbox: Mailbox, tick_interval: Duration) -> Self {
        Self {
            core,
            ctx,
            mailbox,
            tick_interval,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.ctx
            .directory
            .register_capability(&self.ctx.id, ENVIRONMENT_CAPABILITY);
        info!(
            environment = %self.ctx.id,
            rows = self.core.bounds().rows,
            cols = self.core.bounds().cols,
            "Environment started"
        );
        self.publish();

        let mut ticker = time::interval(self.tick_interval);
        ticker.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(envelope) => self.handle(envelope),
                    None => break,
                },
                _ = ticker.tick() => {
                    let mut out = self.refresh_brokers();
                    out.extend(self.core.on_tick());
                    self.flush(out);
                }
                _ = shutdown.changed() => break,
            }
        }

        self.ctx.directory.deregister_all(&self.ctx.id);
        self.ctx.router.deregister(&self.ctx.id);
        info!(environment = %self.ctx.id, "Environment stopped");
    }

    /// Brokers come and go; the directory is the source of truth.
    fn refresh_brokers(&mut self) -> Vec<Envelope> {
        let brokers = ResponderKind::ALL
            .iter()
            .flat_map(|kind| {
                self.ctx
                    .directory
                    .lookup(kind.broker_capability())
                    .into_iter()
                    .map(move |broker| (*kind, broker))
            })
            .collect();
        self.core.set_brokers(brokers)
    }

    fn handle(&mut self, envelope: Envelope) {
        if !self.ctx.admit(&envelope) {
            return;
        }

        let out = match envelope.kind {
            MessageKind::Ignite => match self.ctx.decode::<IgnitePayload>(&envelope) {
                Some(request) => {
                    let mut out = self.refresh_brokers();
                    let severity = Severity::new(request.intensity, request.casualties);
                    match self.core.ignite(request.coordinate, severity) {
                        Ok(sent) => out.extend(sent),
                        Err(e) => {
                            warn!(sender = %envelope.sender, error = %e, "Ignition refused");
                            out.push(envelope.reply(
                                MessageKind::Refuse,
                                &ReasonPayload::new(e.to_string()),
                            ));
                        }
                    }
                    out
                }
                None => Vec::new(),
            },
            MessageKind::Extinguish => match self.ctx.decode::<CoordinatePayload>(&envelope) {
                Some(work) => self.core.on_extinguish(&envelope.sender, work.coordinate),
                None => Vec::new(),
            },
            MessageKind::Rescue => match self.ctx.decode::<CoordinatePayload>(&envelope) {
                Some(work) => self.core.on_rescue(&envelope.sender, work.coordinate),
                None => Vec::new(),
            },
            MessageKind::Subscribe | MessageKind::Unsubscribe => {
                match self.ctx.decode::<FeedPayload>(&envelope) {
                    Some(request) => {
                        vec![self.core.on_subscription_request(&envelope, &request.feed)]
                    }
                    None => Vec::new(),
                }
            }
            other => {
                debug!(environment = %self.ctx.id, kind = %other, "Unexpected message ignored");
                Vec::new()
            }
        };

        self.flush(out);
    }

    fn flush(&mut self, out: Vec<Envelope>) {
        self.ctx.send_all(out);
        for event in self.core.drain_events() {
            self.ctx.monitor.emit(event);
        }
        self.publish();
    }

    fn publish(&self) {
        self.ctx
            .monitor
            .publish(&self.ctx.id, AgentSnapshot::Environment(self.core.snapshot()));
    }
}
