use std::fmt;

/// JSON pointer (RFC 6901) locating a value inside a submitted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pointer {
    segments: Vec<String>,
}

impl Pointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, reference: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(reference.to_string());
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_segments() {
        let pointer = Pointer::root().child(3).child("dose").child("total");
        assert_eq!(pointer.to_string(), "/3/dose/total");
        assert!(Pointer::root().is_root());
        assert_eq!(Pointer::root().to_string(), "");
    }

    #[test]
    fn escapes_reserved_characters() {
        let pointer = Pointer::root().child("dual/square").child("a~b");
        assert_eq!(pointer.to_string(), "/dual~1square/a~0b");
    }
}
