//! Reminder broadcast
//!
//! Sends the opening text, the sample media and the closing text to every
//! registered phone number, one recipient at a time. A broadcast runs as a
//! background job so the triggering request returns at once; the operator
//! gets a summary when it ends.

use crate::config::ReminderSettings;
use crate::media::{mime_for, MediaFolder, MediaStorage};
use crate::registry::{GuestRegistry, RegistryResult};
use crate::state_machine::replies;
use crate::transport::{MediaPayload, OutboundMessage, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Delivery counts for a finished broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReminderReport {
    pub delivered: usize,
    /// Recipients for whom at least one message failed
    pub failed: usize,
}

/// Single-flight switch: at most one broadcast per dispatcher
#[derive(Debug, Default, Clone)]
pub(crate) struct BroadcastSlot {
    running: Arc<AtomicBool>,
}

impl BroadcastSlot {
    /// Claim the slot; `None` while another broadcast is still running
    pub(crate) fn try_claim(&self) -> Option<BroadcastClaim> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(BroadcastClaim {
            running: Arc::clone(&self.running),
        })
    }
}

/// Frees the slot when dropped, including when the job panics
pub(crate) struct BroadcastClaim {
    running: Arc<AtomicBool>,
}

impl Drop for BroadcastClaim {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Everything a background broadcast needs, owned
pub(crate) struct ReminderJob {
    pub registry: Arc<dyn GuestRegistry>,
    pub transport: Arc<dyn Transport>,
    pub media: Arc<dyn MediaStorage>,
    pub settings: ReminderSettings,
    /// Operator who asked for the broadcast and receives the summary
    pub operator: String,
}

impl ReminderJob {
    /// Run in the background; the claim is held until the summary is sent
    pub(crate) fn spawn(self, claim: BroadcastClaim) {
        tokio::spawn(async move {
            self.run().await;
            drop(claim);
        });
    }

    async fn run(&self) {
        let result = send_reminders(
            self.registry.as_ref(),
            self.transport.as_ref(),
            self.media.as_ref(),
            &self.settings,
        )
        .await;

        let summary = match result {
            Ok(report) => replies::broadcast_summary(report.delivered, report.failed),
            Err(e) => {
                tracing::error!(operator = %self.operator, error = %e, "Reminder broadcast aborted");
                replies::BROADCAST_RECIPIENTS_FAILED.to_string()
            }
        };

        let message = OutboundMessage::text(&self.operator, summary);
        if let Err(e) = self.transport.send(&message).await {
            tracing::warn!(operator = %self.operator, error = %e, "Broadcast summary not delivered");
        }
    }
}

pub(crate) async fn send_reminders(
    registry: &dyn GuestRegistry,
    transport: &dyn Transport,
    media: &dyn MediaStorage,
    settings: &ReminderSettings,
) -> RegistryResult<ReminderReport> {
    let recipients = registry.list_phone_numbers().await?;
    let samples = load_samples(media, settings).await;
    tracing::info!(
        recipients = recipients.len(),
        samples = samples.len(),
        "Starting reminder broadcast"
    );

    let mut report = ReminderReport::default();
    for (position, recipient) in recipients.iter().enumerate() {
        if position > 0 && !settings.pacing.is_zero() {
            tokio::time::sleep(settings.pacing).await;
        }

        let mut messages = Vec::with_capacity(samples.len() + 2);
        messages.push(OutboundMessage::text(recipient, &settings.opening));
        messages.extend(samples.iter().map(|payload| OutboundMessage::Media {
            to: recipient.clone(),
            payload: payload.clone(),
            caption: String::new(),
        }));
        messages.push(OutboundMessage::text(recipient, &settings.closing));

        let mut ok = true;
        for message in &messages {
            if let Err(e) = transport.send(message).await {
                tracing::warn!(recipient = %recipient, error = %e, "Reminder message failed");
                ok = false;
            }
        }
        if ok {
            report.delivered += 1;
        } else {
            report.failed += 1;
        }
    }

    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        "Reminder broadcast finished"
    );
    Ok(report)
}

/// Samples that cannot be read are skipped
async fn load_samples(
    media: &dyn MediaStorage,
    settings: &ReminderSettings,
) -> Vec<MediaPayload> {
    let mut payloads = Vec::with_capacity(settings.samples.len());
    for sample in &settings.samples {
        match media.load(MediaFolder::Samples, &sample.file_name).await {
            Ok(data) => payloads.push(MediaPayload {
                kind: sample.kind,
                file_name: sample.file_name.clone(),
                mime_type: mime_for(&sample.file_name),
                data,
            }),
            Err(e) => {
                tracing::warn!(file = %sample.file_name, error = %e, "Skipping reminder sample");
            }
        }
    }
    payloads
}
