//! Events exchanged between the engine and its host.

use crate::connectivity::ConnectivityState;
use crate::item::{BatchId, ItemState};
use crate::storage::WriteError;
use crate::toast::{ToastId, ToastResult};
use crate::transport::Ticket;

use bytes::Bytes;
use serde::{Serialize, Serializer};

/// Events emitted to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum HostEvent {
    /// Reachability changed.
    Connectivity(ConnectivityState),
    /// An item's observable record changed.
    ItemChanged(ItemState),
    /// An item without a destination completed. Always precedes the
    /// `done` update of that item.
    PayloadReady {
        id: String,
        #[serde(serialize_with = "payload_len")]
        payload: Bytes,
    },
    /// Every item of the batch reached a terminal phase.
    BatchDone(BatchId),
    /// A user-facing retry scope gave up; the host should exit.
    ExitRequested,
}

fn payload_len<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(payload.len() as u64)
}

/// Completions fed back into the engine by the tasks it spawned.
#[derive(Debug)]
pub(crate) enum Input {
    /// The soft deadline of an attempt elapsed.
    Deadline(Ticket),
    /// A write launched for `id` ended.
    WriteFinished {
        id: String,
        result: Result<(), WriteError>,
    },
    /// A prompt ended.
    ToastFinished { id: ToastId, result: ToastResult },
}
