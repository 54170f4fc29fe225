use gvrs::prelude::*;
use gvrs::compression::CodecRegistry;
use gvrs::store::TileFileStore;
use gvrs::tile::Tile;
use rand::Rng;
use std::fs::OpenOptions;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("gvrs-s2-{}-{}.grvs", label, rand::random::<u64>()))
}

/// A tile full of high-entropy noise should still round-trip correctly even
/// though none of the installed codecs can shrink it below its raw packing;
/// `store_tile` is expected to keep the uncompressed record in that case.
#[test]
fn noisy_tile_round_trips_even_when_no_codec_helps() {
    let path = temp_path("noisy");
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).unwrap();

    let registry = CodecRegistry::with_default_codecs();
    let mut store = TileFileStore::create(file, 64, registry).unwrap();

    let elements = vec![ElementSpec::int32("noise", 0).unwrap()];
    let mut tile = Tile::new_filled(11, 0, 0, 32, 32, &elements);

    let mut rng = rand::rng();
    for row in 0..32 {
        for col in 0..32 {
            let value: i32 = rng.random();
            tile.write_cell_int(0, &elements[0], row, col, value).unwrap();
        }
    }

    store.store_tile(&tile, &elements).unwrap();

    let read_back = store.read_tile(11, 0, 0, 32, 32, &elements).unwrap().expect("tile must be present");
    for row in 0..32 {
        for col in 0..32 {
            let expected = tile.read_cell_int(0, &elements[0], row, col).unwrap();
            let actual = read_back.read_cell_int(0, &elements[0], row, col).unwrap();
            assert_eq!(expected, actual, "mismatch at ({row}, {col})");
        }
    }

    let _ = std::fs::remove_file(&path);
}
