//! Encrypted record pipeline
//!
//! A record is a JSON document that is encrypted, pinned to a content store
//!  and anchored under an application key. The [`RecordService`] keeps its
//!  own index from record id to anchor key so records can be read back by id.

mod index;
mod service;

pub use index::{IndexError, MemoryRecordIndex, RecordIndex, RecordIndexEntry};
pub use service::{PipelineError, RecordError, RecordService, RecordStage, WrittenRecord};
