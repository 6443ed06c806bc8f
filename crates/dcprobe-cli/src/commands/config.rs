use dcprobe_core::ProbeConfig;

/// Print the effective configuration as TOML.
pub fn show(config: &ProbeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
