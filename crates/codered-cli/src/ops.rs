//! Server writes requested from the dashboard.
//!
//! Each [`Op`] runs on its own task and reports a one-line outcome back over
//! a channel, so the render loop keeps drawing and polling while a request
//! is outstanding.

use std::future::Future;

use codered_core::pack::NewPack;
use tokio::sync::mpsc;

use crate::{app::Op, client::ApiClient};

/// Something that can carry out an [`Op`] and describe the result.
pub trait Writer: Clone + Send + Sync + 'static {
  fn write(&self, op: &Op) -> impl Future<Output = anyhow::Result<String>> + Send;
}

impl Writer for ApiClient {
  async fn write(&self, op: &Op) -> anyhow::Result<String> {
    match op {
      Op::Claim { event, slot, staff_id } => self
        .assign(*event, *slot, staff_id)
        .await
        .map(|_| format!("{slot} {staff_id} assigned to {event}")),
      Op::Dispatch { event, product } => self
        .add_pack(*event, &NewPack::new(*product))
        .await
        .map(|p| format!("Pack {} ({}) dispatched to {event}", p.sequence, p.product.label())),
      Op::MovePack { event, pack, state } => self
        .update_pack(*event, *pack, *state)
        .await
        .map(|p| format!("Pack {} on {event} is now {state}", p.sequence)),
      Op::Resolve { event } => self
        .resolve(*event, None)
        .await
        .map(|v| format!("{event} resolved after {}", v.elapsed)),
    }
  }
}

/// Runs ops in the background and hands back their status lines.
pub struct Ops {
  tx: mpsc::Sender<String>,
  rx: mpsc::Receiver<String>,
}

impl Default for Ops {
  fn default() -> Self { Self::new() }
}

impl Ops {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::channel(16);
    Self { tx, rx }
  }

  /// Start `op` and return at once. Failures are reported, never fatal.
  pub fn submit<W: Writer>(&self, writer: &W, op: Op) {
    let writer = writer.clone();
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let message = match writer.write(&op).await {
        Ok(message) => {
          tracing::info!(?op, "{message}");
          message
        }
        Err(e) => {
          tracing::warn!(?op, error = %format!("{e:#}"), "operation failed");
          format!("Error: {e:#}")
        }
      };
      let _ = tx.send(message).await;
    });
  }

  /// The status line of the next op to finish.
  pub async fn finished(&mut self) -> String {
    // `self` holds a sender, so the channel never closes.
    self.rx.recv().await.unwrap_or_default()
  }
}
