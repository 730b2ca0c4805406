//! The persist seam: where a mention goes once a provider yields it.

use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::mention::Mention;
use crate::provider::{Delivery, PersistError};

/// Hands a mention to its final destination (queue publish, direct write).
///
/// Any error is a delivery failure; the watcher reports it to the provider
/// so the same mention is offered again.
#[async_trait]
pub trait Persist: Send + Sync {
    async fn persist(&self, mention: Mention) -> Delivery;
}

#[async_trait]
impl<F, Fut> Persist for F
where
    F: Fn(Mention) -> Fut + Send + Sync,
    Fut: Future<Output = Delivery> + Send,
{
    async fn persist(&self, mention: Mention) -> Delivery {
        (self)(mention).await
    }
}

/// Writes each mention as one JSON document per line.
///
/// The write and flush are blocking `std::io` calls, so they run on tokio's
/// blocking pool rather than on the provider's worker.
pub struct JsonLinesPersist<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send + 'static> JsonLinesPersist<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }
}

fn write_line<W: Write>(out: &Mutex<W>, line: &[u8]) -> Delivery {
    let mut out = out
        .lock()
        .map_err(|_| PersistError::rejected("output lock poisoned"))?;
    out.write_all(line).map_err(PersistError::failed)?;
    out.write_all(b"\n").map_err(PersistError::failed)?;
    out.flush().map_err(PersistError::failed)?;
    Ok(())
}

#[async_trait]
impl<W: Write + Send + 'static> Persist for JsonLinesPersist<W> {
    async fn persist(&self, mention: Mention) -> Delivery {
        let line = serde_json::to_vec(&mention).map_err(PersistError::failed)?;
        let out = Arc::clone(&self.out);
        tokio::task::spawn_blocking(move || write_line(&out, &line))
            .await
            .map_err(PersistError::failed)?
    }
}
