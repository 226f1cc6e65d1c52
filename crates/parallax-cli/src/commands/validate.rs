use std::path::Path;

use anyhow::Result;

use parallax_core::AppConfig;

pub fn run(config: &AppConfig, path: &Path) -> Result<()> {
    let scene = super::load_scene(Some(path))?;
    let bus = scene.host();

    match scene.build(&bus, config) {
        Ok(root) => {
            println!("Scene '{}' is valid:", scene.name);
            println!("  Window:   {:?}", root.tracker().window());
            println!("  Elements: {}", scene.elements.len());
            println!("  Reveals:  {}", root.snapshot().reveal_flags.len());
            println!("  Channels: {}", root.channels().count());
            println!("  Groups:   {}", scene.groups.len());
            println!("  Loops:    {}", root.loops().count());
            Ok(())
        }
        Err(e) if e.is_configuration() => {
            println!("Scene '{}' was refused: {}", scene.name, e);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
