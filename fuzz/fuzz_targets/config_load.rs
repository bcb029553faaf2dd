#![no_main]

use std::fs;

use gateway_config::load_from_file;
use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;

fuzz_target!(|data: &[u8]| {
    let td = match tempdir() {
        Ok(v) => v,
        Err(_) => return,
    };

    let path = td.path().join("gateway.yaml");
    if fs::write(&path, data).is_ok() {
        // Arbitrary bytes must never panic the YAML parser; malformed or
        // incomplete config is always a returned error.
        let _ = load_from_file(&path);
    }
});
