//! Social video download through `yt-dlp`

use crate::artifact::{self, Artifact};
use crate::error::{NovaError, Result};
use crate::external::{ExternalTool, ToolLocator};
use crate::upload::safe_name;
use crate::workspace::Workspace;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Best quality needs ffmpeg to merge separate audio and video streams
const MERGED_FORMAT: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/best";
const SINGLE_FORMAT: &str = "best[ext=mp4]/best";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoOptions {
    pub url: String,
    /// Platform label, used in messages and the output name
    pub source: String,
    pub owns_rights: bool,
}

/// Checkbox values that count as consent
pub fn parse_consent(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

impl VideoOptions {
    /// Validated link
    pub fn validate(&self) -> Result<Url> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(NovaError::invalid("A video URL is required."));
        }
        if !self.owns_rights {
            return Err(NovaError::invalid(
                "Confirm that you own the rights to download this video.",
            ));
        }
        let url = Url::parse(raw).map_err(|_| NovaError::invalid("Invalid video URL."))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NovaError::invalid("Only http and https links are supported."));
        }
        Ok(url)
    }

    fn source_label(&self) -> &str {
        match self.source.trim() {
            "" => "platform",
            s => s,
        }
    }

    fn output_name(&self) -> String {
        let source = self.source.trim();
        let source = if source.is_empty() { "social" } else { source };
        format!("pdf_nova_video_{}.mp4", safe_name(source, "social"))
    }
}

/// Download the video into the workspace and return it as MP4
#[instrument(skip_all, fields(source = %options.source))]
pub async fn video_extract(
    options: &VideoOptions,
    locator: &ToolLocator,
    workspace: &Workspace,
) -> Result<Artifact> {
    let url = options.validate()?;
    locator.require(ExternalTool::YtDlp).await?;

    let ffmpeg = locator.locate(ExternalTool::Ffmpeg).await;
    let format = if ffmpeg.is_some() {
        MERGED_FORMAT
    } else {
        SINGLE_FORMAT
    };
    debug!(format, "selected yt-dlp format");

    let template = workspace.join("video.%(ext)s");
    let mut args: Vec<OsString> = [
        "--no-playlist",
        "--quiet",
        "--no-warnings",
        "--format",
        format,
        "--merge-output-format",
        "mp4",
        "--restrict-filenames",
        "--no-simulate",
        "--print",
        "after_move:filepath",
        "--output",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(template.into_os_string());
    if let Some(ffmpeg) = ffmpeg.filter(|p| p.is_absolute()) {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.into_os_string());
    }
    args.push("--".into());
    args.push(url.as_str().into());

    let output = locator
        .run(ExternalTool::YtDlp, &args, locator.timeout())
        .await?;
    if !output.success() {
        warn!(stderr = %output.stderr_summary(), "yt-dlp failed");
        return Err(NovaError::ConversionFailed(format!(
            "Extraction failed for this link ({}).",
            options.source_label()
        )));
    }

    let printed = output
        .stdout_text()
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(PathBuf::from);
    let path = downloaded_file(printed, workspace)?;
    let data = std::fs::read(&path)?;
    info!(bytes = data.len(), "video downloaded");
    Ok(Artifact::new(options.output_name(), artifact::MP4, data))
}

/// The file yt-dlp reported, or failing that any `video.*` in the workspace,
/// preferring an `.mp4` sibling
fn downloaded_file(printed: Option<PathBuf>, workspace: &Workspace) -> Result<PathBuf> {
    let candidate = match printed.filter(|p| p.is_file()) {
        Some(path) => Some(path),
        None => workspace.files()?.into_iter().find(|p| {
            p.file_stem().map(|s| s == "video").unwrap_or(false)
        }),
    };
    let Some(path) = candidate else {
        return Err(NovaError::OutputMissing(
            "Video file was not generated.".to_string(),
        ));
    };

    let is_mp4 = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false);
    if !is_mp4 {
        let mp4 = path.with_extension("mp4");
        if mp4.is_file() {
            return Ok(mp4);
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(url: &str, owns_rights: bool) -> VideoOptions {
        VideoOptions {
            url: url.to_string(),
            source: "tiktok".to_string(),
            owns_rights,
        }
    }

    #[test]
    fn test_consent_values() {
        for yes in ["true", "1", "YES", " on "] {
            assert!(parse_consent(yes), "{yes}");
        }
        for no in ["", "false", "0", "off", "y"] {
            assert!(!parse_consent(no), "{no}");
        }
    }

    #[test]
    fn test_validation() {
        let msg = |o: VideoOptions| o.validate().unwrap_err().to_string();
        assert_eq!(msg(options("  ", true)), "A video URL is required.");
        assert_eq!(
            msg(options("https://example.com/v/1", false)),
            "Confirm that you own the rights to download this video."
        );
        assert_eq!(msg(options("not a url", true)), "Invalid video URL.");
        assert_eq!(
            msg(options("ftp://example.com/v.mp4", true)),
            "Only http and https links are supported."
        );
        assert!(options(" https://example.com/v/1 ", true).validate().is_ok());
    }

    #[test]
    fn test_output_name() {
        assert_eq!(options("", true).output_name(), "pdf_nova_video_tiktok.mp4");
        let unnamed = VideoOptions {
            source: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(unnamed.output_name(), "pdf_nova_video_social.mp4");
        assert_eq!(unnamed.source_label(), "platform");
        let odd = VideoOptions {
            source: "My Site!".to_string(),
            ..Default::default()
        };
        assert_eq!(odd.output_name(), "pdf_nova_video_My_Site.mp4");
    }

    #[test]
    fn test_downloaded_file_prefers_mp4() {
        let work = tempfile::tempdir().unwrap();
        let ws = Workspace::create(work.path()).unwrap();
        let webm = ws.write("video.webm", b"webm").unwrap();
        let mp4 = ws.write("video.mp4", b"mp4").unwrap();

        assert_eq!(downloaded_file(Some(webm), &ws).unwrap(), mp4);
        assert_eq!(downloaded_file(None, &ws).unwrap(), mp4);
    }

    #[test]
    fn test_downloaded_file_missing() {
        let work = tempfile::tempdir().unwrap();
        let ws = Workspace::create(work.path()).unwrap();
        let err = downloaded_file(Some(ws.join("video.mp4")), &ws).unwrap_err();
        assert_eq!(err.to_string(), "Video file was not generated.");
        assert!(!err.is_client_error());
    }

    #[cfg(unix)]
    mod with_fake_yt_dlp {
        use super::super::*;
        use crate::config::ToolPaths;
        use crate::fixtures;
        use std::time::Duration;

        const DOWNLOAD: &str = r#"out=""; prev=""
for a; do
  if [ "$prev" = "--output" ]; then out="$a"; fi
  prev="$a"
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
printf 'MP4DATA' > "$file"
echo "$file""#;

        async fn run(script: &str) -> Result<Artifact> {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let fake = fixtures::fake_tool(tools.path(), "yt-dlp", script);
            let locator = ToolLocator::new(
                ToolPaths {
                    yt_dlp: Some(fake),
                    ..Default::default()
                },
                Duration::from_secs(10),
            );
            let workspace = Workspace::create(work.path()).unwrap();
            let options = VideoOptions {
                url: "https://www.tiktok.com/@me/video/1".to_string(),
                source: "tiktok".to_string(),
                owns_rights: true,
            };
            video_extract(&options, &locator, &workspace).await
        }

        #[tokio::test]
        async fn test_download() {
            let artifact = run(DOWNLOAD).await.unwrap();
            assert_eq!(artifact.file_name, "pdf_nova_video_tiktok.mp4");
            assert_eq!(artifact.media_type, "video/mp4");
            assert_eq!(artifact.data, b"MP4DATA");
        }

        #[tokio::test]
        async fn test_failure_names_source() {
            let err = run("echo 'ERROR: unsupported' >&2; exit 1").await.unwrap_err();
            assert_eq!(err.to_string(), "Extraction failed for this link (tiktok).");
            assert!(err.is_client_error());
        }
    }
}
