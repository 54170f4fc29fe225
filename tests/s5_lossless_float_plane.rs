use gvrs::prelude::*;

/// Plain (non-integer-coded) float elements must round-trip bit-exactly,
/// including the awkward IEEE-754 values a predictive bit-plane split has
/// to handle without losing precision.
#[test]
fn plain_float_element_is_bit_exact_after_a_round_trip() {
    let path = std::env::temp_dir().join(format!("gvrs-s5-{}.grvs", rand::random::<u64>()));

    let elements = vec![ElementSpec::float32("reading").unwrap()];
    let spec = FileSpecification::new(16, 16, 16, 16, elements, [5u8; 16]).unwrap();

    let values: Vec<f32> = vec![
        0.0, -0.0, 1.0, -1.0, f32::MIN_POSITIVE, f32::MAX, f32::EPSILON,
        3.1415927, -2.7182817, 1.0e30, -1.0e-30, 123456.789,
    ];

    let mut file = GvrsFile::create(&path, spec).unwrap();
    {
        let mut handle = file.element("reading").unwrap();
        for (i, &value) in values.iter().enumerate() {
            let row = (i / 16) as u32;
            let col = (i % 16) as u32;
            handle.write_value(row, col, value).unwrap();
        }
    }
    file.close().unwrap();

    let mut reopened = GvrsFile::open(&path, OpenMode::ReadOnly).unwrap();
    let mut handle = reopened.element("reading").unwrap();
    for (i, &expected) in values.iter().enumerate() {
        let row = (i / 16) as u32;
        let col = (i % 16) as u32;
        let actual = handle.read_value(row, col).unwrap();
        assert_eq!(actual.to_bits(), expected.to_bits(), "mismatch at index {i}");
    }

    let _ = std::fs::remove_file(&path);
}
