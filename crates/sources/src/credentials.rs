use std::fs;
use std::path::{Path, PathBuf};

use relay_core::Source;
use serde::Deserialize;

/// Presence check for usable credentials, queried once per source per
/// refresh cycle. Implementations must be side-effect free and cheap.
pub trait CredentialStore: Send + Sync {
    fn is_eligible(&self, source: Source) -> bool;
}

/// Locations of the per-provider credential files.
#[derive(Debug, Clone)]
pub struct CredentialPaths {
    pub claude_credentials: PathBuf,
    pub codex_auth: PathBuf,
}

impl CredentialPaths {
    pub fn from_home(home: &Path) -> Self {
        Self {
            claude_credentials: home.join(".claude").join(".credentials.json"),
            codex_auth: home.join(".codex").join("auth.json"),
        }
    }

    pub fn discover() -> Option<Self> {
        dirs::home_dir().map(|home| Self::from_home(&home))
    }
}

/// Credential store backed by the provider CLIs' own credential files.
/// A missing or unreadable file means "not eligible", never an error.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    paths: CredentialPaths,
}

impl FileCredentialStore {
    pub fn new(paths: CredentialPaths) -> Self {
        Self { paths }
    }

    /// OAuth access token shared by the Claude and Claude Code sources.
    pub fn claude_access_token(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.paths.claude_credentials).ok()?;
        parse_claude_credentials(&contents)
    }

    /// ChatGPT OAuth access token from the Codex CLI auth file.
    pub fn openai_access_token(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.paths.codex_auth).ok()?;
        parse_codex_auth(&contents)
    }
}

impl CredentialStore for FileCredentialStore {
    fn is_eligible(&self, source: Source) -> bool {
        match source {
            Source::Claude | Source::ClaudeCode => self.claude_access_token().is_some(),
            Source::OpenAi => self.openai_access_token().is_some(),
        }
    }
}

/// Credentials file written by Claude Code at `~/.claude/.credentials.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaudeCredentialsFile {
    claude_ai_oauth: Option<ClaudeOauth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaudeOauth {
    access_token: String,
}

/// Auth file written by the Codex CLI at `~/.codex/auth.json`.
#[derive(Debug, Deserialize)]
struct CodexAuthFile {
    tokens: Option<CodexTokens>,
}

#[derive(Debug, Deserialize)]
struct CodexTokens {
    access_token: Option<String>,
}

fn parse_claude_credentials(contents: &str) -> Option<String> {
    let file: ClaudeCredentialsFile = serde_json::from_str(contents.trim()).ok()?;
    let token = file.claude_ai_oauth?.access_token;
    if token.is_empty() { None } else { Some(token) }
}

fn parse_codex_auth(contents: &str) -> Option<String> {
    let file: CodexAuthFile = serde_json::from_str(contents.trim()).ok()?;
    let token = file.tokens?.access_token?;
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLAUDE_JSON: &str = r#"{
        "claudeAiOauth": {
            "accessToken": "claude-token-123",
            "refreshToken": "refresh-456",
            "expiresAt": 1234567890
        }
    }"#;

    const CODEX_JSON: &str = r#"{
        "tokens": {
            "id_token": "header.payload.sig",
            "access_token": "codex-token-789"
        }
    }"#;

    fn store_with_files(claude: Option<&str>, codex: Option<&str>) -> (tempfile::TempDir, FileCredentialStore) {
        let home = tempfile::tempdir().expect("temp home");
        let paths = CredentialPaths::from_home(home.path());
        if let Some(contents) = claude {
            fs::create_dir_all(paths.claude_credentials.parent().expect("parent")).expect("dir");
            fs::write(&paths.claude_credentials, contents).expect("write claude creds");
        }
        if let Some(contents) = codex {
            fs::create_dir_all(paths.codex_auth.parent().expect("parent")).expect("dir");
            fs::write(&paths.codex_auth, contents).expect("write codex auth");
        }
        (home, FileCredentialStore::new(paths))
    }

    #[test]
    fn parses_claude_access_token() {
        assert_eq!(
            parse_claude_credentials(CLAUDE_JSON),
            Some("claude-token-123".to_string())
        );
    }

    #[test]
    fn missing_oauth_section_yields_none() {
        assert_eq!(parse_claude_credentials("{}"), None);
        assert_eq!(parse_claude_credentials("not json"), None);
    }

    #[test]
    fn parses_codex_access_token() {
        assert_eq!(
            parse_codex_auth(CODEX_JSON),
            Some("codex-token-789".to_string())
        );
        assert_eq!(parse_codex_auth(r#"{"tokens": {}}"#), None);
    }

    #[test]
    fn eligibility_tracks_credential_files() {
        let (_home, store) = store_with_files(Some(CLAUDE_JSON), None);
        assert!(store.is_eligible(Source::Claude));
        assert!(store.is_eligible(Source::ClaudeCode));
        assert!(!store.is_eligible(Source::OpenAi));
    }

    #[test]
    fn corrupt_credentials_mean_not_eligible() {
        let (_home, store) = store_with_files(Some("{broken"), Some("{broken"));
        for source in Source::ALL {
            assert!(!store.is_eligible(source));
        }
    }

    #[test]
    fn absent_files_mean_not_eligible() {
        let (_home, store) = store_with_files(None, None);
        for source in Source::ALL {
            assert!(!store.is_eligible(source));
        }
    }
}
