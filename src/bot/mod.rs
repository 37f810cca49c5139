//! Bot dispatcher
//!
//! Bridges the transport's update stream to the archival core: every inbound
//! message is captured, and the two user-facing commands trigger the
//! reconcile-then-export flow or the help reply. Updates are handled in
//! arrival order, which gives the per-identifier sequencing the capture
//! pipeline requires; exports run as separate tasks guarded by a per-chat
//! in-flight set so a chat is never reconciled concurrently with itself.

use crate::archive::{capture, Exporter, ReconcileSummary, Reconciler, Record};
use crate::config::{ChatVaultConfig, ReconcileWindow};
use crate::error::Result;
use crate::store::{ChatStore, JsonChatStore, StoreRouter};
use crate::transport::event::{InboundEvent, MessageEvent};
use crate::transport::{ChatTransport, TelegramTransport, TgUpdate};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const HELP_TEXT: &str = "chatvault archives every message in this chat.\n\
    /export - verify the archive against the live chat and receive a CSV snapshot\n\
    /help - this text";

/// User-facing commands.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Export,
    Help,
}

/// Routes updates into capture, reconciliation and export.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    router: Arc<StoreRouter>,
    reconciler: Reconciler,
    exporter: Exporter,
    window: ReconcileWindow,
    reconciling: Mutex<HashSet<i64>>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        router: Arc<StoreRouter>,
        config: &ChatVaultConfig,
    ) -> Result<Self> {
        let sink = config.archive.verification_sink()?;
        Ok(Self {
            reconciler: Reconciler::new(transport.clone(), sink),
            exporter: Exporter::new(transport.clone(), config.archive.export_dir.clone()),
            window: config.archive.window,
            transport,
            router,
            reconciling: Mutex::new(HashSet::new()),
        })
    }

    /// Long-poll the live service and dispatch until cancelled.
    pub async fn run(self: Arc<Self>, telegram: Arc<TelegramTransport>) {
        let mut offset = 0;
        loop {
            let updates = match telegram.poll_updates(offset).await {
                Ok(updates) => updates,
                Err(err) => {
                    tracing::warn!(error = %err, "polling failed; backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Err(err) = self.clone().handle_update(update).await {
                    tracing::error!(error = %err, "failed to handle update");
                }
            }
        }
    }

    /// Handle one raw update; malformed updates have already been logged and
    /// dropped by the conversion.
    pub async fn handle_update(self: Arc<Self>, update: TgUpdate) -> Result<()> {
        match update.into_event() {
            Some(event) => self.handle_event(event).await,
            None => Ok(()),
        }
    }

    /// Capture the event, then act on any command it carries.
    pub async fn handle_event(self: Arc<Self>, event: InboundEvent) -> Result<()> {
        let store = self.router.open(event.message().chat.id).await?;
        capture::on_event(store.as_ref(), &event).await?;

        if let InboundEvent::New(message) = event {
            match command_of(&message) {
                Some(Command::Export) => {
                    let this = self.clone();
                    // Reconciliation probes the whole window; don't hold up
                    // the polling loop for it
                    tokio::spawn(async move {
                        this.handle_export(store, &message).await;
                    });
                }
                Some(Command::Help) => {
                    self.transport.send_text(message.chat.id, HELP_TEXT).await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Run reconcile + export for the chat, refusing to overlap with an
    /// in-flight pass for the same chat.
    async fn handle_export(&self, store: Arc<JsonChatStore>, message: &MessageEvent) {
        let chat_id = message.chat.id;
        if !self.reconciling.lock().await.insert(chat_id) {
            tracing::info!(chat_id, "export already in progress; refusing");
            if let Err(err) = self
                .transport
                .send_text(chat_id, "An export for this chat is already running.")
                .await
            {
                tracing::warn!(chat_id, error = %err, "failed to send refusal reply");
            }
            return;
        }

        let outcome = self.run_export(store.as_ref(), message).await;
        self.reconciling.lock().await.remove(&chat_id);

        let reply = match outcome {
            Ok((summary, archived, path)) => format!(
                "Archive verified ({}). {} records archived. Snapshot: {}",
                summary,
                archived,
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            ),
            Err(err) => {
                tracing::error!(chat_id, error = %err, "export failed");
                "Export failed; the archive was left unchanged where possible.".to_string()
            }
        };
        if let Err(err) = self.transport.send_text(chat_id, &reply).await {
            tracing::warn!(chat_id, error = %err, "failed to send export reply");
        }
    }

    async fn run_export(
        &self,
        store: &dyn ChatStore,
        message: &MessageEvent,
    ) -> Result<(ReconcileSummary, usize, PathBuf)> {
        let requester = message.from.as_ref().map(|sender| sender.display_name());
        let range = self.window.range(message.message_id);
        let summary = self
            .reconciler
            .reconcile(store, &message.chat, requester.as_deref(), range)
            .await?;
        let path = self.exporter.export_snapshot(store, &message.chat).await?;
        let archived = store
            .keys(&Record::chat_prefix(message.chat.id))
            .await?
            .len();
        Ok((summary, archived, path))
    }
}

/// Leading bot command in a message, if any. Accepts the `/cmd@botname` form.
fn command_of(message: &MessageEvent) -> Option<Command> {
    let first = message.text.as_deref()?.trim().split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first);
    match name {
        "/export" => Some(Command::Export),
        "/help" => Some(Command::Help),
        _ => None,
    }
}
