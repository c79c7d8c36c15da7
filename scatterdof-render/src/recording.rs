//! A substrate that executes nothing and records every operation.
//!
//! Used for dry runs of the pass graph and by the tests.

use std::collections::HashMap;

use scatterdof_shared::passes::PassId;

use crate::error::{DofError, Result};
use crate::substrate::{PassBindings, PixelFormat, RenderSubstrate, TargetDesc, TargetHandle};

#[derive(Clone, Debug, PartialEq)]
pub enum SubstrateOp {
    RequestDepth,
    Acquire { handle: TargetHandle, desc: TargetDesc },
    Release { handle: TargetHandle },
    Copy { src: TargetHandle, dst: TargetHandle },
    Pass { pass: PassId, src: TargetHandle, dst: TargetHandle, bindings: PassBindings },
}

/// One recorded pass, borrowed from the op log.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassRecord<'a> {
    pub pass: PassId,
    pub src: TargetHandle,
    pub dst: TargetHandle,
    pub bindings: &'a PassBindings,
}

pub struct RecordingSubstrate {
    /// Result of the capability check.
    pub supported: bool,
    /// Makes `run_pass` fail for this pass.
    pub fail_on: Option<PassId>,
    pub ops: Vec<SubstrateOp>,
    pub reports: Vec<DofError>,
    capability_checks: usize,
    next_handle: u64,
    external: HashMap<TargetHandle, TargetDesc>,
    live: HashMap<TargetHandle, TargetDesc>,
}

impl RecordingSubstrate {
    pub fn new() -> Self {
        Self {
            supported: true,
            fail_on: None,
            ops: Vec::new(),
            reports: Vec::new(),
            capability_checks: 0,
            next_handle: 1,
            external: HashMap::new(),
            live: HashMap::new(),
        }
    }

    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::new() }
    }

    /// Registers a host-owned buffer (frame source or destination).
    pub fn register_external(&mut self, label: &'static str, width: u32, height: u32, format: PixelFormat) -> TargetHandle {
        let handle = self.next();
        self.external.insert(
            handle,
            TargetDesc { label, width, height, format, filter: Default::default() },
        );
        handle
    }

    pub fn desc(&self, handle: TargetHandle) -> Option<&TargetDesc> {
        self.live.get(&handle).or_else(|| self.external.get(&handle))
    }

    pub fn passes(&self) -> Vec<PassRecord<'_>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SubstrateOp::Pass { pass, src, dst, bindings } => Some(PassRecord {
                    pass: *pass,
                    src: *src,
                    dst: *dst,
                    bindings,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn pass_ids(&self) -> Vec<u32> {
        self.passes().iter().map(|p| p.pass.index()).collect()
    }

    pub fn acquire_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, SubstrateOp::Acquire { .. })).count()
    }

    pub fn release_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, SubstrateOp::Release { .. })).count()
    }

    pub fn copy_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, SubstrateOp::Copy { .. })).count()
    }

    /// Temporaries acquired and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn capability_checks(&self) -> usize {
        self.capability_checks
    }

    /// Drops the op log and reports, keeping registered buffers.
    pub fn clear_log(&mut self) {
        self.ops.clear();
        self.reports.clear();
    }

    fn next(&mut self) -> TargetHandle {
        let handle = TargetHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn check_known(&self, handle: TargetHandle) -> Result<()> {
        if self.desc(handle).is_some() {
            Ok(())
        } else {
            Err(DofError::UnknownTarget(handle))
        }
    }
}

impl Default for RecordingSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSubstrate for RecordingSubstrate {
    fn supports_effect(&mut self) -> bool {
        self.capability_checks += 1;
        self.supported
    }

    fn request_depth_texture(&mut self) {
        self.ops.push(SubstrateOp::RequestDepth);
    }

    fn acquire_temporary(&mut self, desc: &TargetDesc) -> Result<TargetHandle> {
        let handle = self.next();
        self.live.insert(handle, *desc);
        self.ops.push(SubstrateOp::Acquire { handle, desc: *desc });
        Ok(handle)
    }

    fn release_temporary(&mut self, handle: TargetHandle) {
        if self.live.remove(&handle).is_none() {
            log::warn!("release of unknown temporary {handle:?}");
        }
        self.ops.push(SubstrateOp::Release { handle });
    }

    fn copy(&mut self, src: TargetHandle, dst: TargetHandle) -> Result<()> {
        self.check_known(src)?;
        self.check_known(dst)?;
        self.ops.push(SubstrateOp::Copy { src, dst });
        Ok(())
    }

    fn run_pass(&mut self, pass: PassId, src: TargetHandle, dst: TargetHandle, bindings: &PassBindings) -> Result<()> {
        self.check_known(src)?;
        self.check_known(dst)?;
        for bound in [bindings.fg_overlap, bindings.low_rez].into_iter().flatten() {
            self.check_known(bound)?;
        }
        if self.fail_on == Some(pass) {
            return Err(DofError::Backend(format!("injected failure in {}", pass.label())));
        }
        self.ops.push(SubstrateOp::Pass { pass, src, dst, bindings: *bindings });
        Ok(())
    }

    fn report(&mut self, error: &DofError) {
        log::error!("{error}");
        self.reports.push(error.clone());
    }
}
