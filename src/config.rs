use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Settings for the chat-completion endpoint that scores receipts.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Total requests allowed per scoring run, rate-limited ones included.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            max_tokens: 5000,
            max_attempts: 5,
            backoff_base_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub language: String,
    pub tesseract_bin: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            tesseract_bin: "tesseract".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "carbonscore".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "carbonscore-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            endpoint: std::env::var("LLM_ENDPOINT").unwrap_or(defaults.endpoint),
            api_key: std::env::var("LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))?,
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            temperature: env_parse("LLM_TEMPERATURE").unwrap_or(defaults.temperature),
            max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            max_attempts: env_parse("LLM_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            backoff_base_ms: env_parse("LLM_BACKOFF_BASE_MS").unwrap_or(defaults.backoff_base_ms),
        };

        let ocr_defaults = OcrConfig::default();
        let ocr = OcrConfig {
            language: std::env::var("OCR_LANGUAGE").unwrap_or(ocr_defaults.language),
            tesseract_bin: std::env::var("TESSERACT_BIN").unwrap_or(ocr_defaults.tesseract_bin),
        };

        Ok(Self {
            database_url,
            jwt,
            llm,
            ocr,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_defaults_match_original_request() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.max_tokens, 5000);
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.backoff_base_ms, 1000);
        assert!(cfg.endpoint.ends_with("/chat/completions"));
    }

    #[test]
    fn ocr_defaults_to_english() {
        let cfg = OcrConfig::default();
        assert_eq!(cfg.language, "eng");
        assert_eq!(cfg.tesseract_bin, "tesseract");
    }
}
