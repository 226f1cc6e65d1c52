use anyhow::Result;

use parallax_core::motion::stagger;

pub fn run(count: i64, base: f64, increment: f64) -> Result<()> {
    let delays = stagger(count, base, increment);

    if delays.is_empty() {
        println!("No children to stagger.");
        return Ok(());
    }

    println!("Stagger plan ({} children):\n", delays.len());
    for (index, delay) in delays.iter().enumerate() {
        println!("  child {:>3}  +{:.3}s", index, delay);
    }

    Ok(())
}
