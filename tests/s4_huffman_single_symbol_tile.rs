use gvrs::prelude::*;

/// A tile where every cell holds the same value is the Huffman coder's
/// degenerate one-symbol case; this exercises it end to end through the
/// public file API rather than the coder directly.
#[test]
fn uniform_tile_compresses_and_round_trips() {
    let path = std::env::temp_dir().join(format!("gvrs-s4-{}.grvs", rand::random::<u64>()));

    let elements = vec![ElementSpec::int16("category", 0).unwrap()];
    let spec = FileSpecification::new(64, 64, 64, 64, elements, [3u8; 16]).unwrap();

    let mut file = GvrsFile::create(&path, spec).unwrap();
    {
        let mut handle = file.element("category").unwrap();
        let values = vec![42_i32; 64 * 64];
        handle.write_block_int(0, 0, 64, 64, &values).unwrap();
    }
    file.flush().unwrap();

    let values = file.element("category").unwrap().read_block_int(0, 0, 64, 64).unwrap();
    assert!(values.iter().all(|&v| v == 42));

    let _ = std::fs::remove_file(&path);
}
