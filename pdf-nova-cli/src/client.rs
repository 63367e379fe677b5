//! HTTP client for a running PDF Nova server

use anyhow::{bail, Context, Result};
use pdf_nova::{NovaInfo, APP_ID};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Bases tried after `--api` and `PDF_NOVA_API`
const DEFAULT_BASES: &[&str] = &["http://127.0.0.1:8091", "http://localhost:8091"];

/// Add a missing scheme and drop trailing slashes; `None` for blank or
/// unparsable input
pub fn normalize_base(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.as_str().trim_end_matches('/').to_string())
}

/// Candidate bases in lookup order, de-duplicated
pub fn candidate_bases(explicit: Option<&str>, env: Option<&str>) -> Vec<String> {
    let mut bases: Vec<String> = Vec::new();
    for raw in explicit.into_iter().chain(env).chain(DEFAULT_BASES.iter().copied()) {
        if let Some(base) = normalize_base(raw) {
            if !bases.contains(&base) {
                bases.push(base);
            }
        }
    }
    bases
}

/// Last path segment of a server-provided name, stripped of characters no
/// file system accepts; `None` when nothing usable remains
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// `filename*=UTF-8''…` wins over `filename="…"`; only the bare file name
/// is kept
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.trim().trim_matches('"');
                let encoded = match encoded.split_once("''") {
                    Some((_, rest)) => rest,
                    None => encoded,
                };
                if let Some(name) = urlencoding::decode(encoded)
                    .ok()
                    .and_then(|decoded| sanitize_file_name(&decoded))
                {
                    return Some(name);
                }
            }
            "filename" => {
                if let Some(name) = sanitize_file_name(raw.trim().trim_matches('"')) {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }
    plain
}

/// File extension for a response media type
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "application/pdf" => ".pdf",
        "application/zip" => ".zip",
        "text/plain" => ".txt",
        "video/mp4" => ".mp4",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        _ => ".bin",
    }
}

/// `HTTP <status>: <detail>`, reading `detail` from a JSON body when there is one
pub fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string());
    format!("HTTP {status}: {detail}")
}

/// A successful response
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub data: Vec<u8>,
    pub info: Option<NovaInfo>,
}

impl Download {
    /// `output`, or the server-provided name inside the current directory
    pub fn target_path(&self, output: Option<&Path>) -> Result<PathBuf> {
        if let Some(output) = output {
            return Ok(output.to_path_buf());
        }
        match sanitize_file_name(&self.file_name) {
            Some(name) => Ok(PathBuf::from(name)),
            None => bail!("Unusable file name from server: {:?}", self.file_name),
        }
    }

    pub fn save(&self, output: Option<&Path>) -> Result<PathBuf> {
        let path = self.target_path(output)?;
        std::fs::write(&path, &self.data)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    /// Probe the candidates; the first healthy one wins, else the first
    pub async fn discover(explicit: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("building HTTP client")?;
        let env = std::env::var("PDF_NOVA_API").ok();
        let candidates = candidate_bases(explicit, env.as_deref());

        for base in &candidates {
            if is_healthy(&http, base).await {
                debug!(%base, "server found");
                return Ok(Self {
                    http,
                    base: base.clone(),
                });
            }
            debug!(%base, "no healthy server");
        }

        let Some(base) = candidates.into_iter().next() else {
            bail!("No usable API base URL.");
        };
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// POST a multipart form to `endpoint`
    pub async fn submit(
        &self,
        endpoint: &str,
        fields: &[(String, String)],
        file_field: &str,
        files: &[PathBuf],
    ) -> Result<Download> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        for path in files {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            form = form.part(file_field.to_string(), Part::bytes(data).file_name(name));
        }

        let url = format!("{}{}", self.base, endpoint);
        debug!(%url, files = files.len(), "submitting");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("cannot reach {}", self.base))?;

        read_download(response, endpoint).await
    }
}

async fn is_healthy(http: &Client, base: &str) -> bool {
    let request = http
        .get(format!("{base}/api/health"))
        .timeout(HEALTH_TIMEOUT)
        .send();
    match request.await {
        Ok(response) if response.status().is_success() => response
            .json::<serde_json::Value>()
            .await
            .map(|v| v["app"] == APP_ID)
            .unwrap_or(false),
        _ => false,
    }
}

async fn read_download(response: Response, endpoint: &str) -> Result<Download> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!(error_message(status.as_u16(), &body));
    }

    let headers = response.headers();
    let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok());
    let content_type = header_str(header::CONTENT_TYPE).unwrap_or_default().to_string();
    let file_name = header_str(header::CONTENT_DISPOSITION)
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| {
            let stem = endpoint.rsplit('/').next().unwrap_or("result");
            format!("pdf_nova_{stem}{}", extension_for(&content_type))
        });
    let info = header_str(header::HeaderName::from_static("x-nova-info"))
        .and_then(|raw| serde_json::from_str(raw).ok());

    let data = response.bytes().await.context("reading response body")?.to_vec();
    Ok(Download {
        file_name,
        data,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_base() {
        assert_eq!(
            normalize_base("localhost:9000/").as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(
            normalize_base(" https://pdf.example.com// ").as_deref(),
            Some("https://pdf.example.com")
        );
        assert_eq!(normalize_base("   "), None);
        assert_eq!(normalize_base("ftp://files.example.com"), None);
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            candidate_bases(Some("10.0.0.2:8091"), Some("http://127.0.0.1:8091/")),
            vec![
                "http://10.0.0.2:8091".to_string(),
                "http://127.0.0.1:8091".to_string(),
                "http://localhost:8091".to_string(),
            ]
        );
        assert_eq!(candidate_bases(None, None).len(), 2);
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"pdf_nova_merged.pdf\"").as_deref(),
            Some("pdf_nova_merged.pdf")
        );
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
            )
            .as_deref(),
            Some("résumé.pdf")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn test_disposition_names_stay_in_the_current_directory() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''..%2F..%2Fescape.bin").as_deref(),
            Some("escape.bin")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"/tmp/abs_escape.bin\"").as_deref(),
            Some("abs_escape.bin")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"..\\..\\win.pdf\"").as_deref(),
            Some("win.pdf")
        );
        assert_eq!(filename_from_disposition("attachment; filename=\"..\""), None);
        assert_eq!(filename_from_disposition("attachment; filename*=UTF-8''%2F"), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_file_name(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_file_name("a<b>:c.pdf").as_deref(), Some("a_b__c.pdf"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(" . "), None);
    }

    #[test]
    fn test_download_target_ignores_server_directories() {
        let download = Download {
            file_name: "/tmp/abs_escape.bin".to_string(),
            data: Vec::new(),
            info: None,
        };
        assert_eq!(
            download.target_path(None).unwrap(),
            PathBuf::from("abs_escape.bin")
        );
        assert_eq!(
            download.target_path(Some(Path::new("/tmp/chosen.bin"))).unwrap(),
            PathBuf::from("/tmp/chosen.bin")
        );

        let unusable = Download {
            file_name: "../".to_string(),
            data: Vec::new(),
            info: None,
        };
        assert!(unusable.target_path(None).is_err());
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("application/pdf"), ".pdf");
        assert_eq!(extension_for("text/plain; charset=utf-8"), ".txt");
        assert_eq!(extension_for("application/octet-stream"), ".bin");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(400, r#"{"detail":"Add at least 2 PDFs."}"#),
            "HTTP 400: Add at least 2 PDFs."
        );
        assert_eq!(error_message(502, "Bad Gateway\n"), "HTTP 502: Bad Gateway");
    }
}
