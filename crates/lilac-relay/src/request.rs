use lilac_contracts::{GenerateBody, ProviderSelector, Quality};

use crate::error::{RelayError, Result};

/// A relay request after boundary validation, one variant per provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRequest {
    OpenAi {
        prompt: String,
        context_urls: Vec<String>,
        quality: Quality,
    },
    Gemini {
        prompt: Option<String>,
        context_urls: Vec<String>,
    },
}

impl RelayRequest {
    pub fn validate(provider: ProviderSelector, body: GenerateBody) -> Result<Self> {
        let prompt = body
            .prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty());
        let context_urls: Vec<String> = body
            .image_context_urls
            .unwrap_or_default()
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .collect();

        match provider {
            ProviderSelector::OpenAi => {
                let prompt =
                    prompt.ok_or_else(|| RelayError::Validation("Prompt is required.".to_string()))?;
                Ok(RelayRequest::OpenAi {
                    prompt,
                    context_urls,
                    quality: Quality::parse_lenient(body.quality.as_deref()),
                })
            }
            ProviderSelector::Gemini => {
                if prompt.is_none() && context_urls.is_empty() {
                    return Err(RelayError::Validation(
                        "Prompt or context image is required.".to_string(),
                    ));
                }
                Ok(RelayRequest::Gemini {
                    prompt,
                    context_urls,
                })
            }
        }
    }

    pub fn provider(&self) -> ProviderSelector {
        match self {
            RelayRequest::OpenAi { .. } => ProviderSelector::OpenAi,
            RelayRequest::Gemini { .. } => ProviderSelector::Gemini,
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            RelayRequest::OpenAi { prompt, .. } => Some(prompt.as_str()),
            RelayRequest::Gemini { prompt, .. } => prompt.as_deref(),
        }
    }

    pub fn context_urls(&self) -> &[String] {
        match self {
            RelayRequest::OpenAi { context_urls, .. } | RelayRequest::Gemini { context_urls, .. } => {
                context_urls
            }
        }
    }

    pub fn quality(&self) -> Quality {
        match self {
            RelayRequest::OpenAi { quality, .. } => *quality,
            RelayRequest::Gemini { .. } => Quality::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(prompt: Option<&str>, urls: &[&str], quality: Option<&str>) -> GenerateBody {
        GenerateBody {
            prompt: prompt.map(str::to_string),
            image_context_urls: if urls.is_empty() {
                None
            } else {
                Some(urls.iter().map(|url| url.to_string()).collect())
            },
            quality: quality.map(str::to_string),
        }
    }

    #[test]
    fn openai_requires_prompt_even_with_context() {
        let err = RelayRequest::validate(
            ProviderSelector::OpenAi,
            body(Some("  "), &["data:image/png;base64,AQID"], None),
        )
        .err();
        assert!(matches!(err, Some(RelayError::Validation(message)) if message == "Prompt is required."));
    }

    #[test]
    fn openai_quality_falls_back_to_auto() -> anyhow::Result<()> {
        let request = RelayRequest::validate(
            ProviderSelector::OpenAi,
            body(Some("cat"), &[], Some("ultra")),
        )?;
        assert_eq!(request.quality(), Quality::Auto);

        let request = RelayRequest::validate(
            ProviderSelector::OpenAi,
            body(Some(" cat "), &[], Some("high")),
        )?;
        assert_eq!(
            request,
            RelayRequest::OpenAi {
                prompt: "cat".to_string(),
                context_urls: Vec::new(),
                quality: Quality::High,
            }
        );
        Ok(())
    }

    #[test]
    fn gemini_accepts_context_without_prompt() -> anyhow::Result<()> {
        let request = RelayRequest::validate(
            ProviderSelector::Gemini,
            body(None, &["data:image/png;base64,AQID"], Some("high")),
        )?;
        assert_eq!(request.prompt(), None);
        assert_eq!(request.context_urls().len(), 1);
        assert_eq!(request.quality(), Quality::Auto);
        Ok(())
    }

    #[test]
    fn gemini_rejects_empty_request() {
        let err = RelayRequest::validate(ProviderSelector::Gemini, body(Some(""), &[""], None)).err();
        assert!(matches!(err, Some(RelayError::Validation(_))));
    }
}
