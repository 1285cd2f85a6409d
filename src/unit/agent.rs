use super::MobileUnit;
use crate::agent::{AgentContext, ENVIRONMENT_CAPABILITY};
use crate::message::{CoordinatePayload, Envelope, MessageKind, ReasonPayload, SeverityPayload};
use crate::monitor::AgentSnapshot;
use crate::transport::{LookupPolicy, Mailbox};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

/// Event loop owning a [`MobileUnit`]; moves one cell per tick.
pub struct UnitAgent {
    core: MobileUnit,
    ctx: AgentContext,
    mailbox: Mailbox,
    move_interval: Duration,
    lookup: LookupPolicy,
}

impl UnitAgent {
    pub fn new(
        core: MobileUnit,
        ctx: AgentContext,
        mailbox: Mailbox,
        move_interval: Duration,
        lookup: LookupPolicy,
    ) -> Self {
        Self {
            core,
            ctx,
            mailbox,
            move_interval,
            lookup,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        match self
            .ctx
            .directory
            .resolve(ENVIRONMENT_CAPABILITY, self.lookup)
            .await
        {
            Ok(providers) => {
                if let Some(environment) = providers.into_iter().next() {
                    self.core.set_environment(environment);
                }
            }
            Err(e) => warn!(unit = %self.ctx.id, error = %e, "Running without environment"),
        }

        info!(
            unit = %self.ctx.id,
            owner = %self.core.owner(),
            role = self.core.role().as_str(),
            home = %self.core.status().home,
            "Unit started"
        );
        let report = self.core.status_report();
        self.flush(vec![report]);

        let mut ticker = time::interval(self.move_interval);
        ticker.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(envelope) => self.handle(envelope),
                    None => break,
                },
                _ = ticker.tick() => {
                    let out = self.core.on_move_tick();
                    self.flush(out);
                }
                _ = shutdown.changed() => break,
            }
        }

        self.ctx.router.deregister(&self.ctx.id);
        debug!(unit = %self.ctx.id, "Unit stopped");
    }

    fn handle(&mut self, envelope: Envelope) {
        if !self.ctx.admit(&envelope) {
            return;
        }

        let commanded = matches!(
            envelope.kind,
            MessageKind::TargetAssignment | MessageKind::Recall
        );
        if commanded && &envelope.sender != self.core.owner() {
            warn!(unit = %self.ctx.id, sender = %envelope.sender, kind = %envelope.kind, "Command from non-owner refused");
            self.ctx.reply(
                &envelope,
                MessageKind::Refuse,
                &ReasonPayload::new("not the owning dispatcher"),
            );
            return;
        }

        let out = match envelope.kind {
            MessageKind::TargetAssignment => {
                let Some(target) = self.ctx.decode::<CoordinatePayload>(&envelope) else {
                    return;
                };
                match self.core.on_target_assignment(target.coordinate) {
                    Ok(out) => out,
                    Err(rejected) => {
                        info!(unit = %self.ctx.id, coordinate = %target.coordinate, "Target refused, not accepting");
                        vec![envelope
                            .reply(MessageKind::Refuse, &ReasonPayload::new(rejected.to_string()))
                            .with_correlation(target.coordinate)]
                    }
                }
            }
            MessageKind::Recall => self.core.on_recall(),
            MessageKind::IncidentSeverity => match self.ctx.decode::<SeverityPayload>(&envelope) {
                Some(report) => self
                    .core
                    .on_incident_status(report.coordinate, report.severity()),
                None => Vec::new(),
            },
            MessageKind::CasualtyPickedUp => {
                match self.ctx.decode::<CoordinatePayload>(&envelope) {
                    Some(pickup) => self.core.on_casualty_picked_up(pickup.coordinate),
                    None => Vec::new(),
                }
            }
            other => {
                debug!(unit = %self.ctx.id, kind = %other, "Unexpected message ignored");
                Vec::new()
            }
        };

        self.flush(out);
    }

    fn flush(&mut self, out: Vec<Envelope>) {
        let changed = !out.is_empty();
        self.ctx.send_all(out);
        if changed {
            self.ctx.monitor.publish(
                &self.ctx.id,
                AgentSnapshot::Unit(self.core.status().clone()),
            );
        }
    }
}
