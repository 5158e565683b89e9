fn main() {
    // the on-cache qubit count is fixed at build time so it can be a const in the crate.
    // QTILE_NUM_ON_CACHE_QUBITS=12 cargo build  ->  4096-element staging buffer

    println!("cargo:rerun-if-env-changed=QTILE_NUM_ON_CACHE_QUBITS");

    let num_on_cache_qubits = match std::env::var("QTILE_NUM_ON_CACHE_QUBITS") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(parsed) if (1..=40).contains(&parsed) => parsed,
            _ => {
                println!(
                    "cargo:warning=ignoring QTILE_NUM_ON_CACHE_QUBITS={}, expected an integer in 1..=40",
                    value
                );
                16
            }
        },
        Err(_) => 16,
    };

    println!("cargo:rustc-env=QTILE_DEFAULT_NUM_ON_CACHE_QUBITS={}", num_on_cache_qubits);
}
