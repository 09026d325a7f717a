#![no_main]
use dl_bytecode::code::{AccessFlags, MethodCode};
use dl_bytecode::pool::{MethodRef, Pool};
use dl_bytecode::types::{Proto, Type};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(instrs) = dl_bytecode::decode(data) {
        let mut pool = Pool::new();
        let method = pool.intern_method(MethodRef {
            class: Type::Class("Fuzz".to_string()),
            name: "f".to_string(),
            proto: Proto {
                params: Vec::new(),
                ret: Type::Void,
            },
        });
        let code = MethodCode::new(method, AccessFlags::STATIC, 16, instrs, Vec::new());
        let options = dl_lift::Options::default().prune_unreachable(false);
        let _ = dl_lift::lift_method(&code, &pool, &options);
    }
});
