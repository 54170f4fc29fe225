use gvrs::prelude::*;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("gvrs-s1-{}-{}.grvs", label, rand::random::<u64>()))
}

#[test]
fn single_cell_survives_a_close_and_reopen() {
    let path = temp_path("basic");

    let elements = vec![ElementSpec::int32("elevation", i32::MIN).unwrap()];
    let spec = FileSpecification::new(1000, 1000, 100, 100, elements, [7u8; 16]).unwrap();

    let mut file = GvrsFile::create(&path, spec).unwrap();
    file.element("elevation").unwrap().write_value_int(512, 37, 19_840).unwrap();
    file.close().unwrap();

    let mut reopened = GvrsFile::open(&path, OpenMode::ReadOnly).unwrap();
    let value = reopened.element("elevation").unwrap().read_value_int(512, 37).unwrap();
    assert_eq!(value, 19_840);

    // a cell never written reads back as the element's fill value.
    let untouched = reopened.element("elevation").unwrap().read_value_int(0, 0).unwrap();
    assert_eq!(untouched, i32::MIN);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn float_element_round_trips_through_scale_and_offset() {
    let path = temp_path("float");

    let elements = vec![ElementSpec::int_coded_float32("temperature", 0.01, 0.0, i32::MIN).unwrap()];
    let spec = FileSpecification::new(200, 200, 50, 50, elements, [9u8; 16]).unwrap();

    let mut file = GvrsFile::create(&path, spec).unwrap();
    file.element("temperature").unwrap().write_value(3, 3, 21.57).unwrap();
    file.flush().unwrap();

    let value = file.element("temperature").unwrap().read_value(3, 3).unwrap();
    assert!((value - 21.57).abs() < 0.01);

    let _ = std::fs::remove_file(&path);
}
