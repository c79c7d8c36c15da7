use std::collections::HashMap;

use anyhow::Context;

use scatterdof_render::substrate::{FilterMode, SourceBuffer};
use scatterdof_render::{DepthOfFieldScatter, RecordingSubstrate, SubstrateOp, TargetHandle};

use crate::cli::InputArgs;
use crate::config::PlanConfig;

pub fn run(input: &InputArgs, frames: u32, unsupported: bool) -> anyhow::Result<()> {
    let config = PlanConfig::resolve(input)?;
    let frame = &config.frame;

    let mut substrate = if unsupported {
        RecordingSubstrate::unsupported()
    } else {
        RecordingSubstrate::new()
    };
    let mut trace = TraceFormatter::default();
    let source = SourceBuffer {
        handle: substrate.register_external("source", frame.width, frame.height, frame.format()),
        width: frame.width,
        height: frame.height,
        format: frame.format(),
    };
    let destination = substrate.register_external("destination", frame.width, frame.height, frame.format());
    trace.name(source.handle, "source");
    trace.name(destination, "destination");

    println!(
        "Planning {} frame(s) for {} ({}x{} {:?})",
        frames.max(1),
        frame.name,
        frame.width,
        frame.height,
        source.format
    );

    let mut effect = DepthOfFieldScatter::new(frame.name.clone(), config.settings.clone());
    effect.on_enable(&mut substrate);

    for index in 0..frames.max(1) {
        effect
            .render(&mut substrate, &config.camera, &source, destination)
            .with_context(|| format!("frame {index} failed"))?;

        println!("frame {index}:");
        for op in &substrate.ops {
            println!("  {}", trace.line(op));
        }
        for report in &substrate.reports {
            println!("  report: {report}");
        }
        println!(
            "  {} passes, {} acquired, {} released",
            substrate.passes().len(),
            substrate.acquire_count(),
            substrate.release_count()
        );
        substrate.clear_log();
    }
    Ok(())
}

/// Turns recorded operations into readable lines, naming buffers by label.
#[derive(Default)]
pub struct TraceFormatter {
    names: HashMap<TargetHandle, String>,
}

impl TraceFormatter {
    pub fn name(&mut self, handle: TargetHandle, name: &str) {
        self.names.insert(handle, name.to_string());
    }

    fn lookup(&self, handle: TargetHandle) -> String {
        self.names
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| format!("#{}", handle.0))
    }

    fn optional(&self, handle: Option<TargetHandle>) -> String {
        handle.map(|h| self.lookup(h)).unwrap_or_else(|| "-".into())
    }

    pub fn line(&mut self, op: &SubstrateOp) -> String {
        match op {
            SubstrateOp::RequestDepth => "request depth texture".into(),
            SubstrateOp::Acquire { handle, desc } => {
                let name = format!("{}#{}", desc.label, handle.0);
                self.names.insert(*handle, name.clone());
                let filter = match desc.filter {
                    FilterMode::Point => "point",
                    FilterMode::Bilinear => "bilinear",
                };
                format!("acquire {name} {}x{} {:?} {filter}", desc.width, desc.height, desc.format)
            }
            SubstrateOp::Release { handle } => format!("release {}", self.lookup(*handle)),
            SubstrateOp::Copy { src, dst } => format!("copy {} -> {}", self.lookup(*src), self.lookup(*dst)),
            SubstrateOp::Pass { pass, src, dst, bindings } => format!(
                "pass {:>2} {:<26} {} -> {} fg_overlap={} low_rez={} offsets={:?}",
                pass.index(),
                pass.label(),
                self.lookup(*src),
                self.lookup(*dst),
                self.optional(bindings.fg_overlap),
                self.optional(bindings.low_rez),
                bindings.uniforms.offsets,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scatterdof_render::substrate::{PassBindings, PixelFormat, TargetDesc};
    use scatterdof_render::{DofUniforms, PassId};

    #[test]
    fn test_acquired_buffers_are_named_by_label() {
        let mut trace = TraceFormatter::default();
        trace.name(TargetHandle(1), "source");
        let desc = TargetDesc {
            label: "DOF Low",
            width: 480,
            height: 270,
            format: PixelFormat::Rgba16Float,
            filter: FilterMode::Bilinear,
        };
        assert_eq!(
            trace.line(&SubstrateOp::Acquire { handle: TargetHandle(4), desc }),
            "acquire DOF Low#4 480x270 Rgba16Float bilinear"
        );
        assert_eq!(
            trace.line(&SubstrateOp::Copy { src: TargetHandle(1), dst: TargetHandle(4) }),
            "copy source -> DOF Low#4"
        );
        assert_eq!(trace.line(&SubstrateOp::Release { handle: TargetHandle(9) }), "release #9");
    }

    #[test]
    fn test_pass_line_shows_bindings() {
        let mut trace = TraceFormatter::default();
        trace.name(TargetHandle(1), "source");
        let bindings = PassBindings::new(DofUniforms::default()).with_low_rez(TargetHandle(1));
        let line = trace.line(&SubstrateOp::Pass {
            pass: PassId::BlurPoissonLow,
            src: TargetHandle(1),
            dst: TargetHandle(2),
            bindings,
        });
        assert!(line.starts_with("pass 10 DOF Blur Poisson Low"));
        assert!(line.contains("source -> #2"));
        assert!(line.contains("fg_overlap=- low_rez=source"));
    }
}
