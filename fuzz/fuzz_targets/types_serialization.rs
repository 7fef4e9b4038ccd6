#![no_main]

use hangar_types::{Build, Configuration};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(build) = serde_json::from_str::<Build>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&build) {
                if let Ok(parsed) = serde_json::from_str::<Build>(&roundtripped) {
                    assert_eq!(build.id, parsed.id);
                    assert_eq!(build.package, parsed.package);
                }
            }
        }

        if let Ok(configuration) = serde_json::from_str::<Configuration>(json_str) {
            if let Ok(roundtripped) = serde_json::to_string(&configuration) {
                if let Ok(parsed) = serde_json::from_str::<Configuration>(&roundtripped) {
                    assert_eq!(configuration, parsed);
                }
            }
        }
    }
});
