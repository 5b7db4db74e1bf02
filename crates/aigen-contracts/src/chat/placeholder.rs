pub const SAMPLE_PROMPTS: &[&str] = &[
    "Generate a modern smart touch panel UI design.",
    "Show me a luxury home automation setup.",
    "Create images of futuristic urban living spaces.",
    "Design a minimalist touch switch interface.",
    "Visualize smart home convenience features.",
    "Illustrate a smart panel replacing traditional switches.",
    "Concept art for a high-tech smart home control panel.",
    "Render a user-friendly smart touch panel layout.",
];

/// Rotating example prompt for the empty composer.
///
/// Each empty prompt shows the next sample; the rotation holds still while
/// an ad is generating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderTicker {
    prompt_index: usize,
}

impl PlaceholderTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &'static str {
        SAMPLE_PROMPTS[self.prompt_index % SAMPLE_PROMPTS.len()]
    }

    /// Hint to show now, or `None` while generating.
    pub fn next_hint(&mut self, is_generating: bool) -> Option<&'static str> {
        if is_generating {
            return None;
        }
        let hint = self.current();
        self.prompt_index = (self.prompt_index + 1) % SAMPLE_PROMPTS.len();
        Some(hint)
    }
}
