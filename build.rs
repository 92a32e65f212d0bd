fn main() {
    // Host builds (`--no-default-features`) have no ESP-IDF toolchain to
    // propagate; only the firmware build needs the sysenv output.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
