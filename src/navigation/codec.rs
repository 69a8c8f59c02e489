/// One physical stack entry: a type discriminator plus the route path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathEntry {
    pub discriminator: String,
    pub path: String,
}

impl PathEntry {
    pub fn new(discriminator: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            discriminator: discriminator.into(),
            path: path.into(),
        }
    }
}

/// Flat fragment encoding of a stack.
///
/// Entries are written top-first, each as two fragments `[discriminator, path]`.
/// Decoding pairs fragments back up, keeps the paths and reverses them so the
/// result is root-first.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathCodec;

impl PathCodec {
    pub fn encode(entries: &[PathEntry]) -> Vec<String> {
        entries
            .iter()
            .rev()
            .flat_map(|entry| [entry.discriminator.clone(), entry.path.clone()])
            .collect()
    }

    /// Decode fragments into root-first paths.
    ///
    /// A lone fragment is taken as a single path. Any other odd count loses its
    /// trailing unpaired fragment.
    pub fn decode(fragments: &[String]) -> Vec<String> {
        if let [only] = fragments {
            return vec![only.clone()];
        }
        let mut paths: Vec<String> = fragments
            .chunks_exact(2)
            .map(|pair| pair[1].clone())
            .collect();
        paths.reverse();
        paths
    }
}
