use super::{CallHistory, CallRecord, HistoryError};
use crate::store::JsonStore;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CALL_HISTORY_FILE: &str = "call_history.json";

/// `call_history.json` behind a [`JsonStore`], one locked
/// load-mutate-save per operation.
pub struct CallHistoryService {
    inner: JsonStore<CallHistory>,
}

impl CallHistoryService {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = JsonStore::open(path)?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub async fn list(&self) -> Vec<CallRecord> {
        self.inner.read(|history| history.records()).await
    }

    pub async fn record_outgoing(&self, entry: CallRecord) -> Result<(), HistoryError> {
        let record = self
            .inner
            .update(|history| history.record_outgoing(entry).cloned())
            .await?;
        info!(
            number = %record.number,
            status = %record.status,
            "call history saved outgoing"
        );
        Ok(())
    }

    pub async fn record_incoming(
        &self,
        call_id: &str,
        number: &str,
        name: Option<String>,
    ) -> Result<(), HistoryError> {
        self.inner
            .update(|history| {
                history
                    .record_incoming(call_id.to_string(), number.to_string(), name)
                    .map(|_| ())
            })
            .await?;
        info!(call_id, number, "logged incoming call as missed, will update if answered");
        Ok(())
    }

    pub async fn update_outcome(
        &self,
        call_id: &str,
        status: &str,
        duration: u64,
    ) -> Result<(), HistoryError> {
        let result = self
            .inner
            .update(|history| {
                history
                    .update_outcome(call_id, status.to_string(), duration)
                    .map(|record| record.number.clone())
            })
            .await;
        match result {
            Ok(number) => {
                info!(call_id, status, duration, number = %number, "call history updated");
                Ok(())
            }
            Err(HistoryError::NotFound(call_id)) => {
                warn!(call_id = %call_id, "call not found in history");
                Err(HistoryError::NotFound(call_id))
            }
            Err(e) => Err(e),
        }
    }
}
