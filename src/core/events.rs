use crate::core::model::{BatchId, BatchState, ItemId, ItemStatus};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    BatchStateChanged { batch_id: Option<BatchId>, state: BatchState },
    ItemAdded { item_id: ItemId, index: usize, name: String, size: u64 },
    ItemRemoved { item_id: ItemId, index: usize },
    Cleared,
    ItemStatusChanged { item_id: ItemId, index: usize, status: ItemStatus },
    Delivered { name: String, path: PathBuf },
    Notice { level: NoticeLevel, message: String },
}
