//! Routing of records into per-destination buckets, and chunking of a record
//! set for the batched writer.

use writebench_types::{Destination, Document, MessageKind, Record, TranslationError, UpsertOne};

use crate::config::ChunkSize;
use crate::stats::ChunkIndex;

/// Operations of one flush call.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePayload {
    /// Idempotent upserts keyed by flight identity.
    Upserts(Vec<UpsertOne>),
    /// Append-only inserts.
    Inserts(Vec<Document>),
}

impl WritePayload {
    pub fn len(&self) -> usize {
        match self {
            Self::Upserts(operations) => operations.len(),
            Self::Inserts(documents) => documents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A flush waiting to be issued to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Destination the flush is addressed to.
    pub destination: Destination,
    /// Operations carried by the flush.
    pub payload: WritePayload,
}

/// The three destination buckets built from one scan over a record slice.
///
/// Every record contributes one upsert to `flights` and exactly one insert
/// to whichever of `positions` / `surfaces` matches its kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationBuckets {
    pub flights: Vec<UpsertOne>,
    pub positions: Vec<Document>,
    pub surfaces: Vec<Document>,
}

impl DestinationBuckets {
    /// Route every record of the slice into its buckets.
    pub fn partition(records: &[Record]) -> Result<Self, TranslationError> {
        let mut buckets = Self {
            flights: Vec::with_capacity(records.len()),
            ..Self::default()
        };

        for record in records {
            let document = record.to_document()?;

            match record.kind {
                MessageKind::Position => buckets.positions.push(document.clone()),
                MessageKind::Surface => buckets.surfaces.push(document.clone()),
            }
            buckets
                .flights
                .push(UpsertOne::new(record.flight_id.clone(), document));
        }

        Ok(buckets)
    }

    /// Number of operations routed to `destination`.
    pub fn len(&self, destination: Destination) -> usize {
        match destination {
            Destination::Flights => self.flights.len(),
            Destination::Positions => self.positions.len(),
            Destination::Surfaces => self.surfaces.len(),
        }
    }

    /// Turn the buckets into flush calls, in [`Destination::ALL`] order,
    /// skipping empty buckets.
    pub fn into_pending_writes(self) -> Vec<PendingWrite> {
        let Self {
            flights,
            positions,
            surfaces,
        } = self;

        [
            PendingWrite {
                destination: Destination::Flights,
                payload: WritePayload::Upserts(flights),
            },
            PendingWrite {
                destination: Destination::Positions,
                payload: WritePayload::Inserts(positions),
            },
            PendingWrite {
                destination: Destination::Surfaces,
                payload: WritePayload::Inserts(surfaces),
            },
        ]
        .into_iter()
        .filter(|write| !write.payload.is_empty())
        .collect()
    }
}

/// Split records into ordered, non-overlapping chunks of `size`; the last
/// chunk may be shorter.
pub fn chunks(
    records: &[Record],
    size: ChunkSize,
) -> impl Iterator<Item = (ChunkIndex, &[Record])> + '_ {
    records
        .chunks(size.into_inner())
        .enumerate()
        .map(|(index, chunk)| (ChunkIndex::new(index), chunk))
}

/// The flush calls of one chunk, translated ahead of dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Position of the chunk in the record set.
    pub chunk: ChunkIndex,
    /// Number of records in the chunk.
    pub records: usize,
    /// Non-empty buckets of the chunk, in [`Destination::ALL`] order.
    pub writes: Vec<PendingWrite>,
}

/// Chunk `records` and partition every chunk into its pending writes.
///
/// The whole record set is translated before anything is returned, so a
/// record that cannot be translated fails the run before its first flush.
pub fn plan_chunks(
    records: &[Record],
    size: ChunkSize,
) -> Result<Vec<ChunkPlan>, TranslationError> {
    chunks(records, size)
        .map(|(chunk, slice)| {
            Ok(ChunkPlan {
                chunk,
                records: slice.len(),
                writes: DestinationBuckets::partition(slice)?.into_pending_writes(),
            })
        })
        .collect()
}
