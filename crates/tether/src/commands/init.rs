use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Tether Configuration

[bridge]
# Name the host registers the plugin under
plugin_name = "Aetherment"
# Native core filename; defaults to the platform name of <plugin_name>_core
# core_library = "libaetherment_core.so"
reload_delay_ms = 100
notification_secs = 5
fatal_frame_skip = 2

[host]
# Watch the native core and reload it when it changes
dev_mode = false
plugin_dir = "."

[logging]
# json or pretty
format = "json"
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}
