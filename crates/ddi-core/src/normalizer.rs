use crate::datum::{Datum, Origin};

/// Carries the origin for a normalization pass and collects any records the
/// pass synthesizes, e.g. the bolus embedded in a calculator record.
#[derive(Debug)]
pub struct Normalizer {
    origin: Origin,
    data: Vec<Box<dyn Datum>>,
}

impl Normalizer {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            data: Vec::new(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Only client-submitted records are rewritten.
    pub fn rewrites(&self) -> bool {
        self.origin.is_external()
    }

    pub fn add_data(&mut self, datum: Box<dyn Datum>) {
        self.data.push(datum);
    }

    pub fn data(&self) -> &[Box<dyn Datum>] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Box<dyn Datum>> {
        self.data
    }
}
