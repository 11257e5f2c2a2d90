//! Integration tests exercising the public API through real files on disk,
//! the way a user invoking the `fwcodec` CLI would.

use std::collections::BTreeMap;

use fwcodec::types::{ImageLabel, RenderPolicy};
use fwcodec::{decode, encode, partition, profile};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_encode_then_decode_round_trips_through_files() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("presets.bin");
    let wire_path = dir.path().join("capture.syx");

    let data: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
    std::fs::write(&input_path, &data).unwrap();

    let device_profile = profile::by_name("primary-2004").unwrap();
    let input = std::fs::read(&input_path).unwrap();
    let wire = encode(device_profile, 0x74000, &input, &BTreeMap::new()).unwrap();
    std::fs::write(&wire_path, &wire).unwrap();

    let captured = std::fs::read(&wire_path).unwrap();
    let bundle = decode(&captured).unwrap();
    assert_eq!(bundle.profile.unwrap().name, "primary-2004");

    let block = bundle.blocks.get(&0x74).unwrap();
    assert_eq!(block.as_bytes().as_ref(), data.as_slice());
}

#[test]
fn test_partition_writes_named_images_to_a_directory() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("images");

    let device_profile = profile::by_name("primary-2004").unwrap();
    let data = vec![0u8; 4096 * 2];
    let wire = encode(device_profile, 0x74000, &data, &BTreeMap::new()).unwrap();

    let bundle = decode(&wire).unwrap();
    let images = partition(&bundle, RenderPolicy::GapSensitive).unwrap();

    std::fs::create_dir_all(&output_dir).unwrap();
    for image in &images {
        let name = format!("{:?}", image.label).to_lowercase();
        std::fs::write(output_dir.join(format!("{name}.bin")), &image.data).unwrap();
    }

    let presets_path = output_dir.join("presets.bin");
    assert!(presets_path.exists());
    let written = std::fs::read(&presets_path).unwrap();
    assert_eq!(written.len(), 4096 * 2);
}

#[test]
fn test_application_region_round_trips_through_application_key() {
    // The headline property this codec exists for: encoding at the
    // application region's start XOR-encrypts with the application key in
    // addition to the block-address cipher, so decoding and partitioning
    // must recover byte-for-byte cleartext, not just the on-chip ciphertext.
    let device_profile = profile::by_name("primary-2004").unwrap();
    let data: Vec<u8> = (0..4096).map(|i| (i % 193) as u8).collect();

    let wire = encode(
        device_profile,
        device_profile.application_region_start,
        &data,
        &BTreeMap::new(),
    )
    .unwrap();

    let bundle = decode(&wire).unwrap();
    let images = partition(&bundle, RenderPolicy::GapSensitive).unwrap();

    let decrypted = images
        .iter()
        .find(|img| img.label == ImageLabel::ApplicationDecrypted)
        .expect("partitioner must produce a decrypted application image");
    assert_eq!(decrypted.data, data);

    let encrypted = images
        .iter()
        .find(|img| img.label == ImageLabel::ApplicationEncrypted)
        .unwrap();
    assert_ne!(encrypted.data, data);
}

#[test]
fn test_decode_of_non_sysex_file_falls_back_to_raw_binary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.bin");
    std::fs::write(&path, vec![0u8; 4096 * 3]).unwrap();

    let data = std::fs::read(&path).unwrap();
    let bundle = decode(&data).unwrap();
    assert_eq!(bundle.format, fwcodec::FormatTag::RawBinary);
}
