//! Benchmark utilities and helpers.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hbrowse_client::store::{RawCell, RawRecord};
use hbrowse_client::MemoryStore;

/// Families of the benchmark table.
pub const FAMILIES: &[&str] = &["info", "stats"];

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates sequential keys for benchmarks.
pub fn generate_sequential_keys(count: usize, prefix: &str) -> Vec<String> {
    (0..count).map(|i| format!("{}{:08}", prefix, i)).collect()
}

/// Builds a store with a `bench` table of `rows` rows, `cells` random cells
/// per row, split into `regions` regions of equal size.
pub fn populated_store(rows: usize, cells: usize, regions: usize) -> MemoryStore {
    let mut rng = StdRng::seed_from_u64(42);
    let store = MemoryStore::new();
    store.create_table("bench", FAMILIES);

    let keys = generate_sequential_keys(rows, "row:");
    for key in &keys {
        for c in 0..cells {
            let family = FAMILIES[rng.gen_range(0..FAMILIES.len())];
            let value = random_string(&mut rng, 16);
            store
                .put("bench", key.as_str(), family, format!("q{c}"), value)
                .unwrap_or_else(|e| panic!("populating bench table: {e}"));
        }
    }

    if regions > 1 {
        let step = (rows / regions).max(1);
        let splits: Vec<&str> = keys.iter().step_by(step).skip(1).map(String::as_str).collect();
        store
            .split_table("bench", splits)
            .unwrap_or_else(|e| panic!("splitting bench table: {e}"));
    }
    store
}

/// Generates raw records with random qualifiers, some repeated.
pub fn generate_records(count: usize, cells: usize) -> Vec<RawRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let row_cells = (0..cells)
                .map(|_| {
                    let qualifier = format!("q{}", rng.gen_range(0..cells));
                    RawCell::new("info", qualifier, random_string(&mut rng, 24))
                })
                .collect();
            RawRecord::new(format!("row:{i:08}"), row_cells)
        })
        .collect()
}
