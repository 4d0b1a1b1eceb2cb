#![no_main]

use libfuzzer_sys::fuzz_target;
use zest_core::config::ZestConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = ZestConfig::parse(content) {
            let _ = config.validate();
        }
    }
});
