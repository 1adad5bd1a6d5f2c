// build.rs

fn main() -> anyhow::Result<()> {
    // ESP-IDF link arguments are only meaningful when cross-compiling for the device.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
    Ok(())
}
// EOF
