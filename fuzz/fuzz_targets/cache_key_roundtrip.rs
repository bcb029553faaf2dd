#![no_main]

use gateway_types::CacheKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (String, String, Vec<String>)| {
    let (identifier, base_sha, head_shas) = data;

    let key = match CacheKey::new(identifier.clone(), base_sha.clone(), head_shas.clone()) {
        Ok(k) => k,
        Err(_) => {
            // The only construction error is an empty identifier.
            assert!(identifier.is_empty());
            return;
        }
    };

    assert_eq!(key.identifier(), identifier);

    // Equal components must always produce equal keys and equal strings,
    // regardless of how adversarial the inputs are.
    let again = CacheKey::new(identifier, base_sha, head_shas).expect("already validated above");
    assert_eq!(key, again);
    assert_eq!(key.to_string(), again.to_string());
});
