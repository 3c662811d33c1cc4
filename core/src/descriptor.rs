//! `Descriptor`: the enumerated per-call configuration (masking, replacement, transpose flags,
//! algorithm choice, thread budget) shared by every orchestrator entry point.

/// Which of `M`'s two readings to consult.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum MaskKind {
    #[default]
    Value,
    Structure,
}

/// Selects one of the three `mxm` algorithms, or lets the planner choose.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum AxbMethod {
    #[default]
    Auto,
    Gustavson,
    Dot,
    Heap,
}

/// A small builder struct, the way `CircuitConfig`-style configs elsewhere in this codebase read —
/// `Descriptor::default().with_replace().with_mask(...)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Descriptor {
    pub output_replace: bool,
    pub mask_kind: MaskKind,
    pub mask_complement: bool,
    pub transpose_a: bool,
    pub transpose_b: bool,
    pub axb_method: AxbMethod,
    pub nthreads: Option<usize>,
}

impl Descriptor {
    pub fn with_replace(mut self) -> Self {
        self.output_replace = true;
        self
    }

    pub fn with_mask(mut self, kind: MaskKind, complement: bool) -> Self {
        self.mask_kind = kind;
        self.mask_complement = complement;
        self
    }

    pub fn with_transpose_a(mut self) -> Self {
        self.transpose_a = true;
        self
    }

    pub fn with_transpose_b(mut self) -> Self {
        self.transpose_b = true;
        self
    }

    pub fn with_axb_method(mut self, method: AxbMethod) -> Self {
        self.axb_method = method;
        self
    }

    pub fn with_nthreads(mut self, n: usize) -> Self {
        self.nthreads = Some(n);
        self
    }
}
