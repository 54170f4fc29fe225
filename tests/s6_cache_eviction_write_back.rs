use gvrs::prelude::*;

/// With a cache far smaller than the number of tiles touched, every write
/// forces evictions long before the file is closed. The evicted tiles must
/// still have been written back, so every value is there after a reopen.
#[test]
fn writes_survive_eviction_under_a_tiny_cache() {
    let path = std::env::temp_dir().join(format!("gvrs-s6-{}.grvs", rand::random::<u64>()));

    let elements = vec![ElementSpec::int32("band", -1).unwrap()];
    // 10x10 tiles of 8x8 cells: touching the diagonal visits 10 distinct
    // tiles while the cache can hold only 3.
    let spec = FileSpecification::new(80, 80, 8, 8, elements, [6u8; 16]).unwrap();

    let mut file = GvrsFile::create(&path, spec).unwrap();
    file.set_tile_cache_size(CacheSize::Custom(3)).unwrap();

    for i in 0..10u32 {
        let row = i * 8;
        let col = i * 8;
        file.element("band").unwrap().write_value_int(row, col, (i * 1000) as i32).unwrap();
    }

    assert!(file.cache_statistics().evictions > 0, "the test setup should have forced at least one eviction");

    for i in 0..10u32 {
        let row = i * 8;
        let col = i * 8;
        let value = file.element("band").unwrap().read_value_int(row, col).unwrap();
        assert_eq!(value, (i * 1000) as i32);
    }

    file.close().unwrap();

    let mut reopened = GvrsFile::open(&path, OpenMode::ReadOnly).unwrap();
    for i in 0..10u32 {
        let row = i * 8;
        let col = i * 8;
        let value = reopened.element("band").unwrap().read_value_int(row, col).unwrap();
        assert_eq!(value, (i * 1000) as i32);
    }

    let _ = std::fs::remove_file(&path);
}
