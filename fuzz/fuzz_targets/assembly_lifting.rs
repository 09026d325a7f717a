#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(asm) = dl_bytecode::parse_assembly(text) {
            for code in &asm.methods {
                let _ = dl_lift::lift_method(code, &asm.pool, &dl_lift::Options::default());
            }
        }
    }
});
