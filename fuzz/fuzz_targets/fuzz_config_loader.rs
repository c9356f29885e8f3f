#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary text must either be rejected or yield a config whose
    // validation returns, never a panic.
    if let Ok(cfg) = shutter_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
