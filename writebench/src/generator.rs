//! Synthetic flight position reports.
//!
//! Generation is driven by a caller-supplied RNG so that a seeded
//! `StdRng` reproduces the same record set (timestamps aside). Each record is
//! stamped with the moment it was generated.

use chrono::{DateTime, Utc};
use rand::Rng;
use writebench_types::{FlightId, MessageKind, Record, FLIGHT_ID_LEN};

use crate::config::RecordCount;

const FLIGHT_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a random six character identity from `[A-Z0-9]`.
pub fn generate_flight_id<R: Rng + ?Sized>(rng: &mut R) -> FlightId {
    let id: String = (0..FLIGHT_ID_LEN)
        .map(|_| char::from(FLIGHT_ID_ALPHABET[rng.random_range(0..FLIGHT_ID_ALPHABET.len())]))
        .collect();
    FlightId::try_new(id).expect("generated identities only use the flight id alphabet")
}

/// One position report for `flight_id` with a random kind and payload.
pub fn generate_record<R: Rng + ?Sized>(
    flight_id: FlightId,
    time_added: DateTime<Utc>,
    rng: &mut R,
) -> Record {
    let kind = if rng.random_bool(0.5) {
        MessageKind::Position
    } else {
        MessageKind::Surface
    };

    Record {
        flight_id,
        kind,
        time_added,
        latitude: rng.random_range(-90.0..=90.0),
        longitude: rng.random_range(-180.0..=180.0),
        altitude: rng.random_range(0.0..=40_000.0),
        speed: rng.random_range(200.0..=600.0),
    }
}

/// Generate exactly `count` records, each with a freshly drawn identity.
///
/// Identities are not deduplicated. With six characters over 36 symbols a
/// collision is rare, and when one happens the `flights` destination simply
/// keeps the later record.
pub fn generate_records<R: Rng + ?Sized>(count: RecordCount, rng: &mut R) -> Vec<Record> {
    (0..count.into_inner())
        .map(|_| {
            let flight_id = generate_flight_id(rng);
            generate_record(flight_id, Utc::now(), rng)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    proptest! {
        #[test]
        fn generated_records_stay_within_payload_ranges(seed in any::<u64>(), count in 0usize..64) {
            let mut rng = StdRng::seed_from_u64(seed);

            let records = generate_records(RecordCount::try_new(count).unwrap(), &mut rng);

            prop_assert_eq!(records.len(), count);
            for record in &records {
                prop_assert!((-90.0..=90.0).contains(&record.latitude));
                prop_assert!((-180.0..=180.0).contains(&record.longitude));
                prop_assert!((0.0..=40_000.0).contains(&record.altitude));
                prop_assert!((200.0..=600.0).contains(&record.speed));
                prop_assert_eq!(record.flight_id.len(), FLIGHT_ID_LEN);
            }
        }
    }

    #[test]
    fn same_seed_yields_same_identities_and_kinds() {
        let count = RecordCount::try_new(100).unwrap();
        let first = generate_records(count, &mut StdRng::seed_from_u64(5));
        let second = generate_records(count, &mut StdRng::seed_from_u64(5));

        let shape = |records: &[Record]| {
            records
                .iter()
                .map(|record| (record.flight_id.clone(), record.kind))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn records_are_stamped_in_generation_order() {
        let before = Utc::now();

        let records = generate_records(
            RecordCount::try_new(500).unwrap(),
            &mut StdRng::seed_from_u64(3),
        );

        let after = Utc::now();
        assert!(records
            .windows(2)
            .all(|pair| pair[0].time_added <= pair[1].time_added));
        assert!(records
            .iter()
            .all(|record| before <= record.time_added && record.time_added <= after));
    }

    #[test]
    fn both_kinds_are_generated() {
        let records = generate_records(
            RecordCount::try_new(200).unwrap(),
            &mut StdRng::seed_from_u64(1),
        );

        assert!(records.iter().any(|record| record.kind == MessageKind::Position));
        assert!(records.iter().any(|record| record.kind == MessageKind::Surface));
    }
}
