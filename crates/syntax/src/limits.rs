/// Configurable limits enforced eagerly while parsing.
///
/// This is the closest thing the parser has to an application "config"
/// layer: there is no on-disk settings file (the CLI/app that would own one
/// is out of scope), so the knobs that exist are exposed here with sane
/// defaults and builder-style setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    max_line_length: usize,
    max_name_length: usize,
    max_name_path_depth: usize,
    max_document_size: u64,
    max_include_depth: usize,
}

impl Limits {
    pub const fn new() -> Self {
        Self {
            max_line_length: 4000,
            max_name_length: 100,
            max_name_path_depth: 10,
            max_document_size: 100 * 1024 * 1024,
            max_include_depth: 5,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn with_max_line_length(mut self, value: usize) -> Self {
        self.max_line_length = value;
        self
    }

    pub fn max_name_length(&self) -> usize {
        self.max_name_length
    }

    pub fn with_max_name_length(mut self, value: usize) -> Self {
        self.max_name_length = value;
        self
    }

    pub fn max_name_path_depth(&self) -> usize {
        self.max_name_path_depth
    }

    pub fn with_max_name_path_depth(mut self, value: usize) -> Self {
        self.max_name_path_depth = value;
        self
    }

    pub fn max_document_size(&self) -> u64 {
        self.max_document_size
    }

    pub fn with_max_document_size(mut self, value: u64) -> Self {
        self.max_document_size = value;
        self
    }

    pub fn max_include_depth(&self) -> usize {
        self.max_include_depth
    }

    pub fn with_max_include_depth(mut self, value: usize) -> Self {
        self.max_include_depth = value;
        self
    }

    /// The maximum byte length for an escaped signature payload
    /// (`max_line_length - 20`).
    pub fn max_signature_text_length(&self) -> usize {
        self.max_line_length.saturating_sub(20)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let limits = Limits::default();
        assert_eq!(limits.max_line_length(), 4000);
        assert_eq!(limits.max_name_length(), 100);
        assert_eq!(limits.max_name_path_depth(), 10);
        assert_eq!(limits.max_include_depth(), 5);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let limits = Limits::default().with_max_line_length(8000).with_max_include_depth(2);
        assert_eq!(limits.max_line_length(), 8000);
        assert_eq!(limits.max_include_depth(), 2);
    }

    #[test]
    fn signature_text_length_is_line_length_minus_twenty() {
        assert_eq!(Limits::default().max_signature_text_length(), 3980);
    }
}
