//! Fuzz target: arbitrary text through parse, resolve and generate.
//! No stage may panic; each returns Ok or an error.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let Ok(network) = canlib_gen::parse(s) else {
        return;
    };
    if let Ok(resolved) = canlib_gen::ResolvedNetwork::resolve(network) {
        let _ = canlib_gen::generate(resolved);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
