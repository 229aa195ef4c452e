#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    patagon_measure::run_native()
}

// the web build starts from `patagon_measure::start`
#[cfg(target_arch = "wasm32")]
fn main() {}
