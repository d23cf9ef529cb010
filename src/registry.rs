//! Parser registry: maps format identifiers, file extensions and MIME types
//! to parser factories.
//!
//! The registry is an explicit object rather than process-global state.
//! Each parser module contributes itself through its `register` hook, and
//! [`ParserRegistry::with_builtin`] wires up every bundled dialect.

use ahash::AHashMap;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::parser::{self, ParseOutcome, ParserOptions, RuleParser};

type ParserFactory = Arc<dyn Fn() -> Box<dyn RuleParser> + Send + Sync>;

/// How the registry should pick a parser for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint<'a> {
    /// Format identifier or alias (`"yaml"`, `"yml"`, `"json"`, ...)
    Format(&'a str),
    /// File extension, with or without the leading dot
    Extension(&'a str),
    /// MIME type; parameters such as `charset` are ignored
    MimeType(&'a str),
    /// Content sniffing through each parser's `can_parse`
    Sniff,
}

/// Registry of rule list parsers.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    /// Format identifier and aliases -> factory
    factories: AHashMap<String, ParserFactory>,
    /// Canonical format identifiers in registration order
    formats: Vec<&'static str>,
    extensions: AHashMap<String, &'static str>,
    mime_types: AHashMap<String, &'static str>,
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every bundled dialect.
    ///
    /// Registration order is also the sniffing order.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        parser::json::register(&mut registry);
        parser::hosts::register(&mut registry);
        parser::yaml::register(&mut registry);
        parser::plain::register(&mut registry);
        registry
    }

    /// Register a parser factory under `aliases`.
    ///
    /// The parser's own format identifier, extensions and MIME types are
    /// indexed as well. Later registrations replace earlier ones.
    pub fn register<F>(&mut self, aliases: &[&str], factory: F)
    where
        F: Fn() -> Box<dyn RuleParser> + Send + Sync + 'static,
    {
        let probe = factory();
        let format = probe.format_identifier();
        let factory: ParserFactory = Arc::new(factory);

        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
        for alias in aliases.iter().copied().chain(std::iter::once(format)) {
            self.factories
                .insert(alias.to_ascii_lowercase(), Arc::clone(&factory));
        }
        for ext in probe.supported_extensions() {
            self.extensions.insert(ext.to_ascii_lowercase(), format);
        }
        for mime in probe.supported_mime_types() {
            self.mime_types.insert(mime.to_ascii_lowercase(), format);
        }

        log::debug!("registered parser {} (aliases {:?})", format, aliases);
    }

    /// Parser for a format identifier or alias, case-insensitive.
    pub fn parser_for_format(&self, format: &str) -> Option<Box<dyn RuleParser>> {
        self.factories
            .get(&format.trim().to_ascii_lowercase())
            .map(|factory| factory())
    }

    /// Parser for a file extension (`"yml"` or `".yml"`).
    pub fn parser_for_extension(&self, ext: &str) -> Option<Box<dyn RuleParser>> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        self.extensions
            .get(&ext)
            .and_then(|format| self.parser_for_format(format))
    }

    /// Parser for a MIME type such as `application/json; charset=utf-8`.
    pub fn parser_for_mime_type(&self, mime: &str) -> Option<Box<dyn RuleParser>> {
        let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
        self.mime_types
            .get(&essence)
            .and_then(|format| self.parser_for_format(format))
    }

    /// First registered parser whose `can_parse` accepts the data.
    pub fn parser_for_data(&self, data: &[u8]) -> Option<Box<dyn RuleParser>> {
        self.formats
            .iter()
            .filter_map(|format| self.parser_for_format(format))
            .find(|parser| parser.can_parse(data))
    }

    /// Canonical identifiers of every registered format.
    pub fn registered_formats(&self) -> &[&'static str] {
        &self.formats
    }

    /// Check if a format identifier or alias is registered.
    pub fn is_format_supported(&self, format: &str) -> bool {
        self.factories.contains_key(&format.trim().to_ascii_lowercase())
    }

    /// Resolve a parser for a hint.
    pub fn resolve(&self, hint: FormatHint<'_>, data: &[u8]) -> Result<Box<dyn RuleParser>> {
        let found = match hint {
            FormatHint::Format(format) => self.parser_for_format(format),
            FormatHint::Extension(ext) => self.parser_for_extension(ext),
            FormatHint::MimeType(mime) => self.parser_for_mime_type(mime),
            FormatHint::Sniff => self.parser_for_data(data),
        };
        found.ok_or_else(|| Error::UnsupportedFormat(describe(hint)))
    }

    /// Parse a document, decompressing gzip input first.
    pub fn parse(
        &self,
        data: &[u8],
        hint: FormatHint<'_>,
        options: &ParserOptions,
    ) -> Result<ParseOutcome> {
        self.parse_with_progress(data, hint, options, &mut |_: f64| {})
    }

    /// Parse a document with progress reporting.
    pub fn parse_with_progress(
        &self,
        data: &[u8],
        hint: FormatHint<'_>,
        options: &ParserOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<ParseOutcome> {
        let inflated;
        let data = if is_gzip(data) {
            inflated = gunzip(data)?;
            log::debug!("decompressed {} -> {} bytes", data.len(), inflated.len());
            &inflated[..]
        } else {
            data
        };

        let parser = self.resolve(hint, data)?;
        parser.parse_with_progress(data, options, progress)
    }

    /// Read and parse a file, choosing the parser from its extension.
    ///
    /// A `.gz` suffix is looked through (`rules.yaml.gz` parses as YAML).
    /// Files without a known extension are sniffed.
    pub fn parse_file(&self, path: &Path, options: &ParserOptions) -> Result<ParseOutcome> {
        let data = std::fs::read(path)?;

        let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if let Some(stripped) = name.strip_suffix(".gz") {
            name = stripped;
        }
        let ext = Path::new(name).extension().and_then(|e| e.to_str());

        let hint = match ext {
            Some(ext) if self.extensions.contains_key(&ext.to_ascii_lowercase()) => {
                FormatHint::Extension(ext)
            }
            _ => FormatHint::Sniff,
        };
        log::debug!("parsing {:?} with {:?}", path, hint);
        self.parse(&data, hint, options)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.formats)
            .finish()
    }
}

fn describe(hint: FormatHint<'_>) -> String {
    match hint {
        FormatHint::Format(f) => format!("format {:?}", f),
        FormatHint::Extension(e) => format!("extension {:?}", e),
        FormatHint::MimeType(m) => format!("MIME type {:?}", m),
        FormatHint::Sniff => "content not recognized by any parser".to_string(),
    }
}

fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
