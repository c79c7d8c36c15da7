use scatterdof_render::substrate::SourceBuffer;
use scatterdof_render::targets::TargetLayout;
use scatterdof_render::{BlurParameters, DofUniforms, TargetHandle};

use crate::cli::InputArgs;
use crate::config::PlanConfig;

pub fn run(input: &InputArgs) -> anyhow::Result<()> {
    let config = PlanConfig::resolve(input)?;
    let params = BlurParameters::derive(&config.settings, &config.camera);
    let frame = &config.frame;

    println!("Derived parameters for {}:", frame.name);
    println!("  focal distance (01)  {:.6}", params.focal_distance01);
    println!("  smoothness           {}", params.smoothness);
    println!("  foreground curve     {}", params.foreground_curve);
    println!("  background curve     {}", params.background_curve);
    println!("  focal size           {} ({:.6} in 01)", params.focal_size, params.focal_size01);
    println!("  aperture             {}", params.aperture_size);
    println!("  foreground overlap   {}", params.foreground_overlap);
    println!("  curve widths         {:.6} / {:.6}", params.focal_start_curve, params.focal_end_curve);

    let uniforms = DofUniforms::new(params.curve_params(), frame.width, frame.height);
    println!("  curve_params         {:?}", uniforms.curve_params);
    println!("  inv target size      {:?}", uniforms.inv_render_target_size);

    let source = SourceBuffer {
        handle: TargetHandle(0),
        width: frame.width,
        height: frame.height,
        format: frame.format(),
    };
    let layout = TargetLayout::new(&source, config.settings.blur_resolution, config.settings.foreground_blur);
    println!();
    println!("Scratch buffers (divider {}):", layout.divider);
    for desc in layout.scene.iter().chain([&layout.low, &layout.low]).chain(layout.foreground.iter()) {
        println!("  {:<12} {}x{} {:?} {:?}", desc.label, desc.width, desc.height, desc.format, desc.filter);
    }
    Ok(())
}
