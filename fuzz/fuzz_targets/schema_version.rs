#![no_main]

use hangar_schema::check_compatible;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = check_compatible(data);
});
