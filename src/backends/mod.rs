cfg_if! {
    if #[cfg(not(target_arch = "wasm32"))] {
        mod native;
        pub use native::{Instant, LocalClock};
    } else {
        compile_error!("wasm target for 'replisync' requires a time backend, none is provided yet.");
    }
}
