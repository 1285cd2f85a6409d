use super::IncidentBroker;
use crate::agent::{AgentContext, ENVIRONMENT_CAPABILITY, INCIDENT_STATUS_FEED};
use crate::message::{
    AlertPayload, Envelope, FeedPayload, MessageKind, ProposalPayload, SeverityPayload,
};
use crate::monitor::AgentSnapshot;
use crate::transport::{LookupPolicy, Mailbox};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

/// Event loop owning an [`IncidentBroker`].
///
/// Mailbox messages and scheduler ticks are handled one at a time, so the
/// negotiation state has a single writer.
pub struct BrokerAgent {
    core: IncidentBroker,
    ctx: AgentContext,
    mailbox: Mailbox,
    tick_interval: Duration,
    lookup: LookupPolicy,
}

impl BrokerAgent {
    pub fn new(
        core: IncidentBroker,
        ctx: AgentContext,
        mailbox: Mailbox,
        tick_interval: Duration,
        lookup: LookupPolicy,
    ) -> Self {
        Self {
            core,
            ctx,
            mailbox,
            tick_interval,
            lookup,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let kind = self.core.kind();
        self.ctx
            .directory
            .register_capability(&self.ctx.id, kind.broker_capability());
        info!(broker = %self.ctx.id, kind = %kind, "Broker started");

        self.publish();

        // Negotiation timeouts keep ticking while the environment is looked up
        let subscription = Self::subscribe_to_environment(self.ctx.clone(), self.lookup);
        tokio::pin!(subscription);
        let mut subscribed = false;

        let mut ticker = time::interval(self.tick_interval);
        ticker.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                _ = &mut subscription, if !subscribed => subscribed = true,
                message = self.mailbox.recv() => match message {
                    Some(envelope) => self.handle(envelope),
                    None => break,
                },
                _ = ticker.tick() => {
                    let out = self.core.on_tick();
                    self.flush(out);
                }
                _ = shutdown.changed() => break,
            }
        }

        self.ctx.directory.deregister_all(&self.ctx.id);
        self.ctx.router.deregister(&self.ctx.id);
        info!(broker = %self.ctx.id, "Broker stopped");
    }

    /// Severity updates let the broker release locations of burnt-out fires.
    async fn subscribe_to_environment(ctx: AgentContext, lookup: LookupPolicy) {
        match ctx.directory.resolve(ENVIRONMENT_CAPABILITY, lookup).await {
            Ok(providers) => {
                for environment in providers {
                    ctx.send(ctx.envelope(
                        &environment,
                        MessageKind::Subscribe,
                        &FeedPayload {
                            feed: INCIDENT_STATUS_FEED.to_string(),
                        },
                    ));
                }
            }
            Err(e) => warn!(broker = %ctx.id, error = %e, "Running without incident status feed"),
        }
    }

    fn handle(&mut self, envelope: Envelope) {
        if !self.ctx.admit(&envelope) {
            return;
        }

        let out = match envelope.kind {
            MessageKind::Alert => match self.ctx.decode::<AlertPayload>(&envelope) {
                Some(alert) => self.core.on_alert(alert.coordinate),
                None => Vec::new(),
            },
            MessageKind::Propose => match self.ctx.decode::<ProposalPayload>(&envelope) {
                Some(bid) => self.core.on_proposal(&envelope.sender, &bid),
                None => Vec::new(),
            },
            MessageKind::Refuse | MessageKind::NotUnderstood => match envelope.correlation {
                Some(coordinate) => self.core.on_decline(&envelope.sender, coordinate),
                None => {
                    debug!(broker = %self.ctx.id, sender = %envelope.sender, kind = %envelope.kind, "Uncorrelated refusal");
                    Vec::new()
                }
            },
            MessageKind::Subscribe | MessageKind::Unsubscribe => {
                match self.ctx.decode::<FeedPayload>(&envelope) {
                    Some(request) => {
                        vec![self.core.on_subscription_request(&envelope, &request.feed)]
                    }
                    None => Vec::new(),
                }
            }
            MessageKind::IncidentSeverity => {
                if let Some(report) = self.ctx.decode::<SeverityPayload>(&envelope) {
                    self.core.on_severity(report.coordinate, report.severity());
                }
                Vec::new()
            }
            MessageKind::Agree => {
                debug!(broker = %self.ctx.id, sender = %envelope.sender, "Subscription confirmed");
                Vec::new()
            }
            other => {
                debug!(broker = %self.ctx.id, kind = %other, "Unexpected message ignored");
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
            .publish(&self.ctx.id, AgentSnapshot::Broker(self.core.snapshot()));
    }
}
