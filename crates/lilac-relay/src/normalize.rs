use lilac_contracts::{GenerationResult, Quality};

use crate::error::{RelayError, Result};
use crate::providers::ProviderOutput;

/// How a route fills in the caption of an image result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionPolicy {
    /// Always describe the operation, quoting prompt and quality.
    Describe { quality: Quality },
    /// Keep provider text; synthesize only when the provider sent none.
    FillMissing,
}

/// Folds a provider outcome into the single result shape.
///
/// Neither text nor image is a failure, with any block reason appended.
pub fn normalize_output(
    label: &str,
    prompt: Option<&str>,
    context_count: usize,
    policy: CaptionPolicy,
    output: ProviderOutput,
) -> Result<GenerationResult> {
    let ProviderOutput {
        text,
        image,
        block_reason,
    } = output;
    let text = text.filter(|value| !value.trim().is_empty());

    if text.is_none() && image.is_none() {
        let mut message = format!("{label} returned no text or image");
        if let Some(reason) = block_reason.filter(|reason| !reason.trim().is_empty()) {
            message.push_str(&format!(" (block reason: {reason})"));
        }
        return Err(RelayError::EmptyResult(message));
    }

    let text = match (policy, image.is_some()) {
        (CaptionPolicy::Describe { quality }, true) => {
            Some(describe_caption(prompt, context_count, quality))
        }
        (CaptionPolicy::FillMissing, true) if text.is_none() => {
            Some(default_caption(prompt, context_count))
        }
        _ => text,
    };
    Ok(GenerationResult::success(text, image))
}

pub fn describe_caption(prompt: Option<&str>, context_count: usize, quality: Quality) -> String {
    let prompt = prompt.unwrap_or_default();
    if context_count > 0 {
        format!(
            "Edited image using {context_count} context image(s) based on prompt: \"{prompt}\" (Quality: {quality})"
        )
    } else {
        format!("Generated image based on prompt: \"{prompt}\" (Quality: {quality})")
    }
}

pub fn default_caption(prompt: Option<&str>, context_count: usize) -> String {
    if context_count > 0 {
        return format!("Edited image using {context_count} context image(s).");
    }
    match prompt.map(str::trim).filter(|value| !value.is_empty()) {
        Some(prompt) => format!("Generated image from prompt: \"{prompt}\""),
        None => "Generated image.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use lilac_contracts::ImageRef;

    use super::*;

    fn image() -> ImageRef {
        ImageRef::new("image/png", vec![1, 2, 3])
    }

    #[test]
    fn missing_caption_depends_on_context() -> anyhow::Result<()> {
        let output = ProviderOutput {
            image: Some(image()),
            ..ProviderOutput::default()
        };
        let edited = normalize_output(
            "Gemini",
            None,
            2,
            CaptionPolicy::FillMissing,
            output.clone(),
        )?;
        assert_eq!(
            edited.text.as_deref(),
            Some("Edited image using 2 context image(s).")
        );

        let generated = normalize_output(
            "Gemini",
            Some("a fox"),
            0,
            CaptionPolicy::FillMissing,
            output,
        )?;
        assert_eq!(
            generated.text.as_deref(),
            Some("Generated image from prompt: \"a fox\"")
        );
        assert!(generated.success);
        Ok(())
    }

    #[test]
    fn provider_text_is_kept_when_present() -> anyhow::Result<()> {
        let result = normalize_output(
            "Gemini",
            Some("a fox"),
            0,
            CaptionPolicy::FillMissing,
            ProviderOutput {
                text: Some("A fox in snow.".to_string()),
                image: Some(image()),
                block_reason: None,
            },
        )?;
        assert_eq!(result.text.as_deref(), Some("A fox in snow."));
        Ok(())
    }

    #[test]
    fn text_only_passes_through() -> anyhow::Result<()> {
        let result = normalize_output(
            "Gemini",
            Some("describe"),
            1,
            CaptionPolicy::FillMissing,
            ProviderOutput {
                text: Some("It is a cat.".to_string()),
                ..ProviderOutput::default()
            },
        )?;
        assert!(result.success);
        assert!(result.image.is_none());
        assert_eq!(result.text.as_deref(), Some("It is a cat."));
        Ok(())
    }

    #[test]
    fn describe_policy_quotes_prompt_and_quality() -> anyhow::Result<()> {
        let output = ProviderOutput {
            image: Some(image()),
            ..ProviderOutput::default()
        };
        let result = normalize_output(
            "OpenAI",
            Some("a red circle"),
            0,
            CaptionPolicy::Describe {
                quality: Quality::Auto,
            },
            output.clone(),
        )?;
        assert_eq!(
            result.text.as_deref(),
            Some("Generated image based on prompt: \"a red circle\" (Quality: auto)")
        );

        let result = normalize_output(
            "OpenAI",
            Some("make it blue"),
            3,
            CaptionPolicy::Describe {
                quality: Quality::High,
            },
            output,
        )?;
        assert_eq!(
            result.text.as_deref(),
            Some("Edited image using 3 context image(s) based on prompt: \"make it blue\" (Quality: high)")
        );
        Ok(())
    }

    #[test]
    fn empty_output_is_a_failure_with_block_reason() {
        let err = normalize_output(
            "Gemini",
            Some("forbidden"),
            0,
            CaptionPolicy::FillMissing,
            ProviderOutput {
                block_reason: Some("SAFETY".to_string()),
                ..ProviderOutput::default()
            },
        )
        .err();
        match err {
            Some(RelayError::EmptyResult(message)) => {
                assert_eq!(message, "Gemini returned no text or image (block reason: SAFETY)");
                assert!(message.contains("SAFETY"));
            }
            other => panic!("expected empty result, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_without_reason() {
        let err = normalize_output(
            "OpenAI",
            Some("x"),
            0,
            CaptionPolicy::Describe {
                quality: Quality::Auto,
            },
            ProviderOutput::default(),
        )
        .err();
        assert!(
            matches!(err, Some(RelayError::EmptyResult(message)) if message == "OpenAI returned no text or image")
        );
    }
}
