use anyhow::Context;
use netconfig_core::config::{Config, DeviceConfig};
use netconfig_core::device::FileDevice;
use netconfig_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path, devices: &[String]) -> anyhow::Result<()> {
    println!("Initializing netconfig in: {}", root.display());

    // 1. Create the directory tree
    for dir in [paths::NETCONFIG_DIR, paths::DEFAULT_TEMPLATES_DIR, paths::DEFAULT_DEVICES_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    // 2. Load or create config.yaml
    let config_path = paths::config_path(root);
    let existed = config_path.exists();
    let mut config = if existed {
        Config::load(root).context("failed to load config")?
    } else {
        Config::new()
    };

    // 3. Register requested devices, creating their directories
    let mut added = 0;
    for name in devices {
        if config.devices.contains_key(name) {
            println!("  exists:  device {name}");
            continue;
        }
        let device = DeviceConfig::File {
            path: format!("{}/{name}", paths::DEFAULT_DEVICES_DIR),
        };
        let dir = config.device_path(root, &device);
        if !dir.is_dir() {
            FileDevice::create(name.as_str(), &dir, "")
                .with_context(|| format!("failed to create device directory {}", dir.display()))?;
        }
        config.devices.insert(name.clone(), device);
        println!("  created: device {name} ({})", dir.display());
        added += 1;
    }

    if !existed || added > 0 {
        config.save(root).context("failed to write config.yaml")?;
        println!(
            "  {}: {}",
            if existed { "updated" } else { "created" },
            paths::CONFIG_FILE
        );
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    println!("\nnetconfig initialized.");
    Ok(())
}
