#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(params) = odatalite::parse_params_json(s)
    {
        let _ = odatalite::document::build_query("fuzz", &params);
        let _ = odatalite::jsonb::build_query("fuzz", &params);
    }
});
