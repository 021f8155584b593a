#![no_main]
use libfuzzer_sys::fuzz_target;
use odatalite::compile::{DocumentDialect, JsonbDialect, Predicate, compile};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(node) = odatalite::parse_filter_json(s) else { return };
    // Both dialects share one traversal and must agree on validity.
    let d = compile(&node, &DocumentDialect);
    let j = compile(&node, &JsonbDialect);
    assert_eq!(d.is_ok(), j.is_ok());
    if let Ok(Predicate::Native(p)) = d {
        let _ = odatalite::document::eval::matches(&bson::doc! { "a": 1 }, &p);
    }
});
