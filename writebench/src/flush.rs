use std::time::Instant;

use writebench_types::{DocumentStore, StoreError};

use crate::bucket::{PendingWrite, WritePayload};
use crate::stats::WriteStat;

/// Issue one pending write as a single store call and time it.
///
/// The measured duration covers the store call only. The operation count is
/// the number of operations submitted, which is what both strategies compare.
pub(crate) async fn flush<S>(store: &S, write: PendingWrite) -> Result<WriteStat, StoreError>
where
    S: DocumentStore + Sync,
{
    let PendingWrite {
        destination,
        payload,
    } = write;
    let operations = payload.len();

    let started = Instant::now();
    let _ack = match payload {
        WritePayload::Upserts(batch) => store.upsert_batch(destination, batch).await?,
        WritePayload::Inserts(batch) => store.insert_batch(destination, batch).await?,
    };
    let duration = started.elapsed();

    Ok(WriteStat {
        destination,
        operations,
        duration,
    })
}
