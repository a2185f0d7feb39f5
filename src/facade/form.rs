use crate::cache::{CacheEntry, QueryStatus, Subscription};
use crate::core::{Record, Result};
use crate::mutation::{MutationExecutor, MutationState};
use crate::reactor::{LineInputs, TotalField};
use crate::result::RecordTable;
use tokio::sync::watch;

/// Entry form: two inputs, a derived total, a submit trigger and the list it feeds.
pub struct RecordForm {
    total: TotalField,
    executor: MutationExecutor<Record>,
    subscription: Subscription<Vec<Record>>,
}

impl RecordForm {
    pub fn new(subscription: Subscription<Vec<Record>>, executor: MutationExecutor<Record>) -> Self {
        Self {
            total: TotalField::new(),
            executor,
            subscription,
        }
    }

    pub fn set_price(&mut self, price: impl Into<Option<f64>>) -> f64 {
        self.total.set_price(price)
    }

    pub fn set_quantity(&mut self, quantity: impl Into<Option<f64>>) -> f64 {
        self.total.set_quantity(quantity)
    }

    pub fn total(&self) -> f64 {
        self.total.total()
    }

    pub fn inputs(&self) -> LineInputs {
        self.total.inputs()
    }

    pub fn watch_total(&self) -> watch::Receiver<f64> {
        self.total.subscribe()
    }

    /// Record that `submit` would send right now
    pub fn draft(&self) -> Record {
        self.total.record()
    }

    /// Submit the current draft. Inputs are kept so the user can tweak and resubmit.
    pub async fn submit(&self) -> Result<Record> {
        let record = self.draft();
        self.executor.submit(record).await?;
        Ok(record)
    }

    pub fn is_submitting(&self) -> bool {
        self.executor.is_pending()
    }

    pub fn mutation_state(&self) -> Result<MutationState> {
        self.executor.state()
    }

    pub fn entry(&self) -> Result<CacheEntry<Vec<Record>>> {
        self.subscription.read()
    }

    /// Current list; empty while the first load is running
    pub fn rows(&self) -> Result<Vec<Record>> {
        Ok(self.entry()?.data_or_default())
    }

    pub fn status(&self) -> Result<QueryStatus> {
        Ok(self.entry()?.status)
    }

    pub fn is_loading(&self) -> Result<bool> {
        Ok(self.entry()?.is_loading())
    }

    /// List after any pending refetch has landed
    pub async fn settled_rows(&self) -> Result<Vec<Record>> {
        Ok(self.subscription.settled().await?.data_or_default())
    }

    pub fn table(&self) -> Result<RecordTable> {
        let entry = self.entry()?;
        Ok(RecordTable::new(entry.status, &entry.data_or_default()))
    }
}
