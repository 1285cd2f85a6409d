use super::DispatchCenter;
use crate::agent::{AgentContext, ENVIRONMENT_CAPABILITY, INCIDENT_ALERTS_FEED, INCIDENT_STATUS_FEED};
use crate::message::{
    CoordinatePayload, Envelope, FeedPayload, MessageKind, ReasonPayload, SeverityPayload,
    UnitStatusPayload,
};
use crate::monitor::AgentSnapshot;
use crate::transport::{LookupPolicy, Mailbox};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Event loop owning a [`DispatchCenter`].
pub struct DispatchAgent {
    core: DispatchCenter,
    ctx: AgentContext,
    mailbox: Mailbox,
    lookup: LookupPolicy,
}

impl DispatchAgent {
    pub fn new(
        core: DispatchCenter,
        ctx: AgentContext,
        mailbox: Mailbox,
        lookup: LookupPolicy,
    ) -> Self {
        Self {
            core,
            ctx,
            mailbox,
            lookup,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let kind = self.core.kind();
        self.ctx
            .directory
            .register_capability(&self.ctx.id, kind.station_capability());
        info!(
            dispatcher = %self.ctx.id,
            kind = %kind,
            base = %self.core.base(),
            units = self.core.pool_size(),
            "Dispatch agent started"
        );
        self.publish();

        self.subscribe(kind.broker_capability(), INCIDENT_ALERTS_FEED)
            .await;
        self.subscribe(ENVIRONMENT_CAPABILITY, INCIDENT_STATUS_FEED)
            .await;

        loop {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(envelope) => self.handle(envelope),
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        self.ctx.directory.deregister_all(&self.ctx.id);
        self.ctx.router.deregister(&self.ctx.id);
        info!(dispatcher = %self.ctx.id, "Dispatch agent stopped");
    }

    /// Subscribe to `feed` at every provider of `capability`.
    async fn subscribe(&self, capability: &str, feed: &str) {
        match self.ctx.directory.resolve(capability, self.lookup).await {
            Ok(providers) => {
                for provider in providers {
                    debug!(dispatcher = %self.ctx.id, provider = %provider, feed = %feed, "Subscribing");
                    self.ctx.send(self.ctx.envelope(
                        &provider,
                        MessageKind::Subscribe,
                        &FeedPayload {
                            feed: feed.to_string(),
                        },
                    ));
                }
            }
            Err(e) => warn!(dispatcher = %self.ctx.id, feed = %feed, error = %e, "Subscription skipped"),
        }
    }

    fn handle(&mut self, envelope: Envelope) {
        if !self.ctx.admit(&envelope) {
            return;
        }

        let out = match envelope.kind {
            MessageKind::CallForProposal => {
                match self.ctx.decode::<CoordinatePayload>(&envelope) {
                    Some(cfp) => vec![self
                        .core
                        .on_call_for_proposal(&envelope.sender, cfp.coordinate)],
                    None => Vec::new(),
                }
            }
            MessageKind::AcceptProposal => match self.ctx.decode::<CoordinatePayload>(&envelope) {
                Some(accept) => self.core.on_accept(accept.coordinate),
                None => Vec::new(),
            },
            MessageKind::RejectProposal => {
                if let Some(reject) = self.ctx.decode::<CoordinatePayload>(&envelope) {
                    self.core.on_reject(reject.coordinate);
                }
                Vec::new()
            }
            MessageKind::UnitStatus => match self.ctx.decode::<UnitStatusPayload>(&envelope) {
                Some(report) => self.core.on_unit_status(report.status),
                None => Vec::new(),
            },
            MessageKind::IncidentSeverity => match self.ctx.decode::<SeverityPayload>(&envelope) {
                Some(report) => self.core.on_severity(report.coordinate, report.severity()),
                None => Vec::new(),
            },
            MessageKind::Refuse => match envelope.correlation {
                Some(coordinate) => self.core.on_target_refused(&envelope.sender, coordinate),
                None => {
                    let reason = envelope
                        .decode::<ReasonPayload>()
                        .map(|r| r.reason)
                        .unwrap_or_default();
                    info!(dispatcher = %self.ctx.id, sender = %envelope.sender, reason = %reason, "Request refused");
                    Vec::new()
                }
            },
            MessageKind::Agree => {
                debug!(dispatcher = %self.ctx.id, sender = %envelope.sender, "Subscription confirmed");
                Vec::new()
            }
            MessageKind::NotUnderstood => {
                warn!(dispatcher = %self.ctx.id, sender = %envelope.sender, "Peer did not understand a message");
                Vec::new()
            }
            other => {
                debug!(dispatcher = %self.ctx.id, kind = %other, "Unexpected message ignored");
                Vec::new()
            }
        };

        self.ctx.send_all(out);
        for event in self.core.drain_events() {
            self.ctx.monitor.emit(event);
        }
        self.publish();
    }

    fn publish(&self) {
        self.ctx
            .monitor
            .publish(&self.ctx.id, AgentSnapshot::Dispatch(self.core.snapshot()));
    }
}
