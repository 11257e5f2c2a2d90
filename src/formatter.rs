//! Output formatters for the `decode` and `identify` CLI subcommands.
//!
//! Trait-based formatters for rendering a decoded bundle's summary in
//! various output formats (human-readable, JSON, compact).

use crate::types::{FirmwareBundle, ImageLabel, NamedImage, ProfileMatch};

/// Everything the CLI has on hand after a decode, suitable for rendering
/// by any formatter.
pub struct DecodeSummary<'a> {
    /// The identified device profile's name, if any.
    pub profile: Option<&'static str>,
    /// How the profile was identified.
    pub profile_match: Option<ProfileMatch>,
    /// Number of flash blocks recovered.
    pub block_count: usize,
    /// Display messages seen during decode, in ordinal order.
    pub messages: Vec<(usize, String)>,
    /// Named images produced by the partitioner, if the caller ran one.
    pub images: &'a [NamedImage],
}

impl<'a> DecodeSummary<'a> {
    /// Build a summary from a decoded bundle and its partitioned images.
    pub fn new(bundle: &FirmwareBundle, images: &'a [NamedImage]) -> Self {
        Self {
            profile: bundle.profile.map(|p| p.name),
            profile_match: bundle.profile_match,
            block_count: bundle.blocks.len(),
            messages: bundle
                .messages
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            images,
        }
    }
}

/// Trait for formatting a [`DecodeSummary`].
///
/// Implementors provide methods for rendering each component, plus a
/// default `format_summary` that concatenates them.
pub trait SummaryFormatter {
    /// Format the identified profile and how it was matched.
    fn format_profile(&self, summary: &DecodeSummary) -> Option<String>;

    /// Format the recovered block count.
    fn format_blocks(&self, summary: &DecodeSummary) -> Option<String>;

    /// Format display messages seen during decode.
    fn format_messages(&self, summary: &DecodeSummary) -> Option<String>;

    /// Format the named images produced by partitioning.
    fn format_images(&self, summary: &DecodeSummary) -> Option<String>;

    /// Format the complete summary.
    fn format_summary(&self, summary: &DecodeSummary) -> String {
        let mut parts = Vec::new();
        if let Some(s) = self.format_profile(summary) {
            parts.push(s);
        }
        if let Some(s) = self.format_blocks(summary) {
            parts.push(s);
        }
        if let Some(s) = self.format_messages(summary) {
            parts.push(s);
        }
        if let Some(s) = self.format_images(summary) {
            parts.push(s);
        }
        parts.join("")
    }
}

fn label_name(label: ImageLabel) -> &'static str {
    match label {
        ImageLabel::Bootloader => "bootloader",
        ImageLabel::ApplicationEncrypted => "application (encrypted)",
        ImageLabel::ApplicationDecrypted => "application (decrypted)",
        ImageLabel::Unused => "unused",
        ImageLabel::Presets => "presets",
        ImageLabel::Scratch => "scratch",
        ImageLabel::DeviceData => "device data",
    }
}

fn match_name(how: ProfileMatch) -> &'static str {
    match how {
        ProfileMatch::Checksum => "checksum trial",
        ProfileMatch::ModelIdFallback => "model ID fallback",
    }
}

/// Human-readable summary formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Include per-message text, not just a count.
    pub verbose: bool,
}

impl HumanFormatter {
    /// A formatter with default (non-verbose) settings.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SummaryFormatter for HumanFormatter {
    fn format_profile(&self, summary: &DecodeSummary) -> Option<String> {
        match (summary.profile, summary.profile_match) {
            (Some(name), Some(how)) => {
                Some(format!("Profile:  {} (via {})\n", name, match_name(how)))
            }
            (Some(name), None) => Some(format!("Profile:  {}\n", name)),
            (None, _) => Some("Profile:  unidentified\n".to_string()),
        }
    }

    fn format_blocks(&self, summary: &DecodeSummary) -> Option<String> {
        Some(format!("Blocks:   {}\n", summary.block_count))
    }

    fn format_messages(&self, summary: &DecodeSummary) -> Option<String> {
        if summary.messages.is_empty() {
            return None;
        }
        if self.verbose {
            let mut s = String::from("Messages:\n");
            for (ordinal, text) in &summary.messages {
                s.push_str(&format!("  [{ordinal}] {text}\n"));
            }
            Some(s)
        } else {
            Some(format!("Messages: {}\n", summary.messages.len()))
        }
    }

    fn format_images(&self, summary: &DecodeSummary) -> Option<String> {
        if summary.images.is_empty() {
            return None;
        }
        let mut s = String::from("Images:\n");
        for image in summary.images {
            s.push_str(&format!(
                "  {:<24} {} bytes\n",
                label_name(image.label),
                image.data.len()
            ));
        }
        Some(s)
    }
}

/// JSON summary formatter.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Render a summary as a pretty-printed JSON string.
    pub fn render(&self, summary: &DecodeSummary) -> serde_json::Result<String> {
        #[derive(serde::Serialize)]
        struct ImageEntry {
            label: String,
            bytes: usize,
        }

        #[derive(serde::Serialize)]
        struct Output {
            profile: Option<&'static str>,
            profile_match: Option<&'static str>,
            block_count: usize,
            message_count: usize,
            images: Vec<ImageEntry>,
        }

        let output = Output {
            profile: summary.profile,
            profile_match: summary.profile_match.map(match_name),
            block_count: summary.block_count,
            message_count: summary.messages.len(),
            images: summary
                .images
                .iter()
                .map(|img| ImageEntry {
                    label: label_name(img.label).to_string(),
                    bytes: img.data.len(),
                })
                .collect(),
        };

        serde_json::to_string_pretty(&output)
    }
}

/// Compact single-line summary formatter.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl SummaryFormatter for ShortFormatter {
    fn format_profile(&self, summary: &DecodeSummary) -> Option<String> {
        Some(summary.profile.unwrap_or("unidentified").to_string())
    }

    fn format_blocks(&self, summary: &DecodeSummary) -> Option<String> {
        Some(format!("\t{} blocks", summary.block_count))
    }

    fn format_messages(&self, summary: &DecodeSummary) -> Option<String> {
        Some(format!("\t{} messages", summary.messages.len()))
    }

    fn format_images(&self, summary: &DecodeSummary) -> Option<String> {
        Some(format!("\t{} images\n", summary.images.len()))
    }
}
