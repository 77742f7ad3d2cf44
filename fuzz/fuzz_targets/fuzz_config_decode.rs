//! Fuzz target: persisted config decoding
//!
//! Feeds arbitrary bytes to the storage decoder as if they came out of
//! flash. Decoding and validation must never panic, and anything that
//! validates must survive a re-encode unchanged.
//!
//! cargo fuzz run fuzz_config_decode

#![no_main]

use heizbox::config::HeaterConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = postcard::from_bytes::<HeaterConfig>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let bytes = postcard::to_allocvec(&cfg).expect("valid config encodes");
    let back: HeaterConfig = postcard::from_bytes(&bytes).expect("re-encoded config decodes");
    assert_eq!(back, cfg);
});
