//! Export a document to PDF by running the external renderer.
//!
//! The renderer (Xournal++ by default) is driven as a subprocess:
//!
//! ```text
//! xournalpp -p <output>.tmp <input>
//! ```
//!
//! It writes into a temporary file next to the final output, which is only
//! renamed into place when the process exits successfully and produced
//! something. A failed, killed or timed-out run therefore never leaves a
//! truncated PDF behind, and an earlier good export survives a failed re-run.
//!
//! The child is spawned with `kill_on_drop`, so when the timeout elapses
//! and the pending future is dropped the process is killed as well.

use crate::config::ConversionConfig;
use crate::error::DocumentError;
use crate::pipeline::discover::absolute_path;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A successful export.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    /// Final location of the exported file.
    pub output: PathBuf,
    /// Wall-clock time spent in the renderer.
    pub duration_ms: u64,
    /// Anything the renderer printed on stderr despite succeeding.
    pub stderr: String,
}

/// Where the export of `document` goes.
///
/// The document's directory relative to `root` is mirrored under
/// `output_dir`, and the full original file name is kept with `.<extension>`
/// appended: `root/a/b/notes.xopp` → `output_dir/a/b/notes.xopp.pdf`.
/// A document outside `root` lands directly in `output_dir`.
pub fn output_path_for(document: &Path, root: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    let relative = document
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut name: OsString = document
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(extension);

    output_dir.join(relative).join(name)
}

/// Render `input` to `output` with the configured renderer.
pub async fn render_document(
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
) -> Result<RenderOutput, DocumentError> {
    let write_failed = |detail: String| DocumentError::WriteFailed {
        path: output.to_path_buf(),
        detail,
    };

    // ── Prepare the destination ──────────────────────────────────────────
    let out_dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| write_failed(e.to_string()))?;

    let temp = tempfile::Builder::new()
        .prefix(".xopp2pdf-")
        .suffix(&format!(".{}", config.output_extension))
        .tempfile_in(&out_dir)
        .map_err(|e| write_failed(e.to_string()))?
        .into_temp_path();

    let input_abs = absolute_path(input).map_err(|e| DocumentError::ReadFailed {
        path: input.to_path_buf(),
        detail: e.to_string(),
    })?;
    let args = config.render_args(
        &temp.to_string_lossy(),
        &input_abs.to_string_lossy(),
    );
    debug!("Running {} {:?}", config.renderer, args);

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let mut command = Command::new(&config.renderer);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let run = command.output();

    let secs = config.renderer_timeout_secs;
    let result = match tokio::time::timeout(Duration::from_secs(secs), run).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Renderer timed out after {}s on {}", secs, input.display());
            return Err(DocumentError::ConversionTimeout { secs });
        }
    };
    let result = result.map_err(|e| DocumentError::RendererSpawnFailed {
        program: config.renderer.clone(),
        detail: e.to_string(),
    })?;
    let duration_ms = start.elapsed().as_millis() as u64;
    let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();

    if !result.status.success() {
        return Err(DocumentError::ConversionFailed {
            status: result.status.code(),
            stderr,
        });
    }

    // ── Publish ──────────────────────────────────────────────────────────
    let produced = tokio::fs::metadata(&temp)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if produced == 0 {
        return Err(DocumentError::ConversionFailed {
            status: result.status.code(),
            stderr: if stderr.is_empty() {
                "renderer exited successfully but wrote no output".to_string()
            } else {
                stderr
            },
        });
    }

    temp.persist(output)
        .map_err(|e| write_failed(e.error.to_string()))?;

    info!(
        "Rendered {} → {} in {}ms",
        input.display(),
        output.display(),
        duration_ms
    );

    Ok(RenderOutput {
        output: output.to_path_buf(),
        duration_ms,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mirrors_relative_directory() {
        let out = output_path_for(
            Path::new("./term2/algebra/week1.xopp"),
            Path::new("."),
            Path::new("./output"),
            "pdf",
        );
        assert_eq!(out, PathBuf::from("./output/term2/algebra/week1.xopp.pdf"));
    }

    #[test]
    fn top_level_document_goes_to_output_root() {
        let out = output_path_for(
            Path::new("/data/notes.xopp"),
            Path::new("/data"),
            Path::new("/exports"),
            "pdf",
        );
        assert_eq!(out, PathBuf::from("/exports/notes.xopp.pdf"));
    }

    #[test]
    fn document_outside_root_is_flattened() {
        let out = output_path_for(
            Path::new("/elsewhere/x/notes.xopp"),
            Path::new("/data"),
            Path::new("out"),
            "pdf",
        );
        assert_eq!(out, PathBuf::from("out/notes.xopp.pdf"));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::fs;
        use tempfile::tempdir;

        fn sh_config(script: &str, timeout: u64) -> ConversionConfig {
            // sh -c <script> sh <output> <input>  ⇒  $1 = output, $2 = input
            ConversionConfig::builder()
                .renderer("sh")
                .renderer_args(["-c", script, "sh", "{output}", "{input}"])
                .renderer_timeout_secs(timeout)
                .build()
                .unwrap()
        }

        #[tokio::test]
        async fn successful_run_publishes_output() {
            let dir = tempdir().unwrap();
            let input = dir.path().join("a.xopp");
            fs::write(&input, b"notebook").unwrap();
            let output = dir.path().join("out/sub/a.xopp.pdf");

            let config = sh_config(r#"cp "$2" "$1""#, 10);
            let rendered = render_document(&input, &output, &config).await.unwrap();

            assert_eq!(rendered.output, output);
            assert_eq!(fs::read(&output).unwrap(), b"notebook");
            let leftovers: Vec<_> = fs::read_dir(output.parent().unwrap())
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with(".xopp2pdf-"))
                .collect();
            assert!(leftovers.is_empty());
        }

        #[tokio::test]
        async fn failure_surfaces_status_and_stderr() {
            let dir = tempdir().unwrap();
            let input = dir.path().join("a.xopp");
            fs::write(&input, b"x").unwrap();
            let output = dir.path().join("a.xopp.pdf");

            let config = sh_config("echo 'cannot open background' >&2; exit 3", 10);
            let err = render_document(&input, &output, &config).await.unwrap_err();
            match err {
                DocumentError::ConversionFailed { status, stderr } => {
                    assert_eq!(status, Some(3));
                    assert!(stderr.contains("cannot open background"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(!output.exists());
        }

        #[tokio::test]
        async fn empty_output_is_a_failure() {
            let dir = tempdir().unwrap();
            let input = dir.path().join("a.xopp");
            fs::write(&input, b"x").unwrap();
            let output = dir.path().join("a.xopp.pdf");

            let err = render_document(&input, &output, &sh_config("true", 10))
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentError::ConversionFailed { .. }));
            assert!(!output.exists());
        }

        #[tokio::test]
        async fn slow_renderer_times_out() {
            let dir = tempdir().unwrap();
            let input = dir.path().join("a.xopp");
            fs::write(&input, b"x").unwrap();
            let output = dir.path().join("a.xopp.pdf");

            let err = render_document(&input, &output, &sh_config("sleep 5", 1))
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentError::ConversionTimeout { secs: 1 }));
            assert!(!output.exists());
        }

        #[tokio::test]
        async fn missing_renderer_is_a_spawn_failure() {
            let dir = tempdir().unwrap();
            let input = dir.path().join("a.xopp");
            fs::write(&input, b"x").unwrap();

            let config = ConversionConfig::builder()
                .renderer("xopp2pdf-no-such-renderer")
                .build()
                .unwrap();
            let err = render_document(&input, &dir.path().join("a.xopp.pdf"), &config)
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentError::RendererSpawnFailed { .. }));
        }
    }
}
