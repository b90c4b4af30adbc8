//! Change audit log: an append-only record of who changed which record,
//! with before/after snapshots.

pub mod change;

pub use change::{
    ChangeAction, ChangeCommand, ChangeEvent, ChangeRecord, ChangeRecordId, ChangeRecorded,
    RecordChange,
};
