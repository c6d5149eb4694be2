/// Safety knobs for the compiler: a small `Default`-deriving struct rather
/// than a general config file, following the workspace convention that
/// front ends carry just the handful of limits they enforce.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maximum expression-tree depth; guards against pathological or
    /// accidentally-recursive hand-authored source.
    pub max_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig { max_depth: 64 }
    }
}
