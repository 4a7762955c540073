//! Configuration types for relinking and converting Xournal++ notebooks.
//!
//! All batch behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Nothing is a hidden constant: the output
//! directory, the renderer command line and the file-name conventions are
//! all fields with documented defaults, injected wherever they are used.

use crate::error::Xopp2PdfError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;
use std::path::PathBuf;

/// Placeholder replaced by the destination PDF path in [`ConversionConfig::renderer_args`].
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Placeholder replaced by the absolute document path in [`ConversionConfig::renderer_args`].
pub const INPUT_PLACEHOLDER: &str = "{input}";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}|{}",
        regex::escape(OUTPUT_PLACEHOLDER),
        regex::escape(INPUT_PLACEHOLDER)
    ))
    .unwrap()
});

/// Configuration for a relink-and-convert batch.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use xopp2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .root("lectures")
///     .output_dir("exported")
///     .renderer_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory searched for documents and for candidate files. Default: `.`.
    pub root: PathBuf,

    /// Where converted PDFs are written, mirroring each document's directory
    /// relative to [`root`](Self::root). Default: `./output`.
    pub output_dir: PathBuf,

    /// Renderer executable. Default: `xournalpp`.
    pub renderer: String,

    /// Renderer argument template. `{output}` and `{input}` are substituted
    /// per document. Default: `-p {output} {input}`.
    pub renderer_args: Vec<String>,

    /// Kill the renderer if a single document takes longer than this. Default: 300.
    pub renderer_timeout_secs: u64,

    /// Extension (without the dot) of the documents to process. Default: `xopp`.
    pub document_extension: String,

    /// Documents whose file name ends with this suffix are skipped.
    /// Default: `.autosave.xopp`.
    pub autosave_suffix: String,

    /// Extension of the embedded file reference to repair. Default: `pdf`.
    pub reference_extension: String,

    /// Extension appended to the document name for the converted file. Default: `pdf`.
    pub output_extension: String,

    /// Report what would be relinked without writing documents or rendering. Default: false.
    pub dry_run: bool,

    /// Convert documents as they are, without relinking. Default: false.
    pub skip_repair: bool,

    /// Per-document progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_dir: PathBuf::from("./output"),
            renderer: "xournalpp".to_string(),
            renderer_args: vec![
                "-p".to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
                INPUT_PLACEHOLDER.to_string(),
            ],
            renderer_timeout_secs: 300,
            document_extension: "xopp".to_string(),
            autosave_suffix: ".autosave.xopp".to_string(),
            reference_extension: "pdf".to_string(),
            output_extension: "pdf".to_string(),
            dry_run: false,
            skip_repair: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("root", &self.root)
            .field("output_dir", &self.output_dir)
            .field("renderer", &self.renderer)
            .field("renderer_args", &self.renderer_args)
            .field("renderer_timeout_secs", &self.renderer_timeout_secs)
            .field("document_extension", &self.document_extension)
            .field("autosave_suffix", &self.autosave_suffix)
            .field("reference_extension", &self.reference_extension)
            .field("output_extension", &self.output_extension)
            .field("dry_run", &self.dry_run)
            .field("skip_repair", &self.skip_repair)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Renderer arguments for one document, placeholders substituted.
    ///
    /// Substitution is a single pass: placeholder text inside `output` or
    /// `input` is left as is.
    pub fn render_args(&self, output: &str, input: &str) -> Vec<String> {
        self.renderer_args
            .iter()
            .map(|arg| {
                PLACEHOLDER
                    .replace_all(arg, |caps: &Captures| {
                        if &caps[0] == OUTPUT_PLACEHOLDER {
                            output.to_string()
                        } else {
                            input.to_string()
                        }
                    })
                    .into_owned()
            })
            .collect()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn renderer(mut self, program: impl Into<String>) -> Self {
        self.config.renderer = program.into();
        self
    }

    pub fn renderer_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.renderer_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn renderer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.renderer_timeout_secs = secs;
        self
    }

    pub fn document_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.document_extension = trim_dot(ext.into());
        self
    }

    pub fn autosave_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.autosave_suffix = suffix.into();
        self
    }

    pub fn reference_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.reference_extension = trim_dot(ext.into());
        self
    }

    pub fn output_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.output_extension = trim_dot(ext.into());
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn skip_repair(mut self, v: bool) -> Self {
        self.config.skip_repair = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Xopp2PdfError> {
        let c = &self.config;
        for (name, ext) in [
            ("document extension", &c.document_extension),
            ("reference extension", &c.reference_extension),
            ("output extension", &c.output_extension),
        ] {
            if ext.is_empty() {
                return Err(Xopp2PdfError::InvalidConfig(format!("{name} must not be empty")));
            }
            if ext.contains('/') || ext.contains('\\') {
                return Err(Xopp2PdfError::InvalidConfig(format!(
                    "{name} must not contain a path separator, got '{ext}'"
                )));
            }
        }
        if c.renderer.trim().is_empty() {
            return Err(Xopp2PdfError::InvalidConfig(
                "Renderer program must not be empty".into(),
            ));
        }
        if !c.renderer_args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            return Err(Xopp2PdfError::InvalidConfig(format!(
                "Renderer arguments must contain {INPUT_PLACEHOLDER}"
            )));
        }
        if !c.renderer_args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(Xopp2PdfError::InvalidConfig(format!(
                "Renderer arguments must contain {OUTPUT_PLACEHOLDER}"
            )));
        }
        if c.renderer_timeout_secs == 0 {
            return Err(Xopp2PdfError::InvalidConfig(
                "Renderer timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

fn trim_dot(ext: String) -> String {
    ext.trim_start_matches('.').to_string()
}
