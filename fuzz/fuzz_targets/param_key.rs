#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_compose::ParamKey;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    // Deriving a key from JSON input never fails and is deterministic
    let key = ParamKey::of(&value).expect("json values always serialize");
    assert_eq!(key, ParamKey::of(&value).unwrap());

    // Re-parsing the key text yields a value with the same key
    if !key.is_no_params() {
        let reparsed: Value = serde_json::from_str(key.as_str()).expect("key text is json");
        assert_eq!(ParamKey::of(&reparsed).unwrap(), key);
    } else {
        assert!(value.is_null());
    }
});
