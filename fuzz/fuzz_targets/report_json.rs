#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use zest_reporting::backends::json;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    // 읽히는 리포트는 다시 직렬화해도 같은 리포트여야 한다
    if let Ok(report) = json::from_str(content, Path::new("fuzz-input")) {
        let _ = report.stats();
        let serialized = json::to_string(&report, false).expect("loaded report must serialize");
        let reloaded = json::from_str(&serialized, Path::new("fuzz-output"))
            .expect("serialized report must load");
        assert_eq!(report, reloaded);
    }
});
