use scatterdof_render::{BlurResolution, BlurType, PassId};
use scatterdof_shared::passes::{blur_pass, FALLBACK_BLUR_PASS};

pub fn run() -> anyhow::Result<()> {
    println!("Blur passes (style x resolution):");
    println!("  {:<12} {:>5} {:>5}", "style", "high", "low");
    for style in [BlurType::Poisson, BlurType::Production, BlurType::Movie] {
        let high = pass_index(style, BlurResolution::High);
        let low = pass_index(style, BlurResolution::Low);
        println!("  {:<12} {high:>5} {low:>5}", format!("{style:?}").to_lowercase());
    }
    println!("  unrecognized styles fall back to {}", FALLBACK_BLUR_PASS.index());

    println!();
    println!("Passes:");
    for pass in PassId::ALL {
        println!("  {:>2}  {:<26} {}", pass.index(), pass.label(), pass.entry_point());
    }
    Ok(())
}

fn pass_index(style: BlurType, resolution: BlurResolution) -> u32 {
    blur_pass(style, resolution).unwrap_or(FALLBACK_BLUR_PASS).index()
}
