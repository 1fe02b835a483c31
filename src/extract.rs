//! Metadata extraction from uploaded files.
//!
//! [`extract_metadata`] turns a file name and its bytes into an
//! [`AssetDraft`]: a title from the name, a summary from the first
//! paragraph of text, and one artifact describing the file. Text comes from
//! PDF, Office Open XML (docx, pptx, xlsx), or plain UTF-8 files. Any
//! extraction failure degrades to a name-only draft.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use gitkb_core::models::{Artifact, AssetCategory, AssetDraft, AssetType};

use crate::config::Config;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TEXT: &str = "text/plain";

const MAX_SHEETS: usize = 100;
const MAX_CELLS_PER_SHEET: usize = 100_000;
/// Upper bound on one decompressed ZIP entry.
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const TEXT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc", "csv", "html"];
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "go", "java", "kt", "ts", "tsx", "js", "jsx", "rb", "sh", "ps1", "tf", "hcl",
    "yaml", "yml", "toml", "json", "sql", "c", "h", "cpp", "cs", "swift", "j2",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
}

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// MIME type the extractor uses for `filename`, if it can read it.
pub fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = extension(filename);
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        "xlsx" => Some(MIME_XLSX),
        e if TEXT_EXTENSIONS.contains(&e) || SOURCE_EXTENSIONS.contains(&e) => Some(MIME_TEXT),
        _ => None,
    }
}

/// Artifact kind for a file: `deck`, `doc`, `sheet`, `video`, `code`, or
/// `other`.
pub fn artifact_kind(filename: &str) -> &'static str {
    let ext = extension(filename);
    match ext.as_str() {
        "ppt" | "pptx" | "key" | "odp" => "deck",
        "pdf" | "doc" | "docx" | "odt" | "rtf" | "md" | "markdown" | "txt" | "rst" | "adoc"
        | "html" => "doc",
        "xls" | "xlsx" | "ods" | "csv" => "sheet",
        "mp4" | "mov" | "webm" | "avi" | "mkv" => "video",
        e if SOURCE_EXTENSIONS.contains(&e) => "code",
        _ => "other",
    }
}

/// Runs a pdf-extract call, turning both its errors and its panics into
/// [`ExtractError::Pdf`]. The library panics on some malformed documents.
fn pdf_guarded<F>(extract: F) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<String, pdf_extract::OutputError> + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(extract) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(ExtractError::Pdf(format!("parser panicked: {}", reason)))
        }
    }
}

/// Plain text from `bytes` interpreted as `content_type`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => pdf_guarded(|| pdf_extract::extract_text_from_mem(bytes)),
        MIME_DOCX => extract_docx(bytes),
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_TEXT => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ExtractError::NotUtf8),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

/// Builds a draft for `filename`. Never fails: unreadable content only
/// costs the summary.
pub fn extract_metadata(filename: &str, bytes: &[u8], max_summary_chars: usize) -> AssetDraft {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    let text = match content_type_for(&name) {
        Some(ct) => match extract_text(bytes, ct) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "text extraction failed");
                None
            }
        },
        None => None,
    };

    let summary = text
        .as_deref()
        .and_then(|t| first_paragraph(t, max_summary_chars))
        .unwrap_or_else(|| format!("Automatically extracted content from {}", name));

    let kind = artifact_kind(&name);
    let asset_type = if kind == "code" {
        AssetType::CodeRef
    } else {
        AssetType::Template
    };

    AssetDraft {
        title: Some(title_from_filename(&name)),
        summary: Some(summary),
        asset_type: Some(asset_type),
        category: Some(AssetCategory::Technical),
        artifacts: Some(vec![Artifact {
            name: name.clone(),
            kind: kind.to_string(),
            uri: name,
        }]),
        ..Default::default()
    }
}

/// `sow-template_v2.docx` → `sow template v2`.
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let title = stem.replace(['-', '_'], " ");
    let title = title.trim();
    if title.is_empty() {
        filename.to_string()
    } else {
        title.to_string()
    }
}

/// First paragraph of prose, whitespace-collapsed and cut to `max_chars`.
/// Markdown headings are skipped.
fn first_paragraph(text: &str, max_chars: usize) -> Option<String> {
    let para = text
        .split("\n\n")
        .map(|p| {
            p.lines()
                .map(str::trim)
                .filter(|l| !l.starts_with('#'))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|p| !p.is_empty())?;

    if para.chars().count() <= max_chars {
        return Some(para);
    }
    let mut cut: String = para.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    Some(cut)
}

/// CLI entry point for `gitkb extract`: prints the draft as JSON.
pub fn run_extract(config: &Config, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.to_string_lossy();
    let draft = extract_metadata(&name, &bytes, config.import.max_summary_chars);
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

// ============ Office Open XML ============

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!("{} exceeds size limit", name)));
    }
    Ok(out)
}

/// Entries named `<prefix><n>.xml`, in numeric order.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|n| {
        n[prefix.len()..n.len() - ".xml".len()]
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Concatenates the text of every `<t>` element, inserting `para_break`
/// after each `<p>` element closes.
fn text_runs(xml: &[u8], para_break: &str) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_t = true,
            Ok(Event::Text(t)) if in_t => {
                out.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" if !out.is_empty() && !out.ends_with(para_break) => out.push_str(para_break),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    text_runs(&xml, "\n\n")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_entry(&mut archive, &name)?;
        let text = text_runs(&xml, "\n")?;
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };
    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(MAX_SHEETS)
    {
        let xml = read_entry(&mut archive, &name)?;
        let cells = sheet_strings(&xml, &shared)?;
        if !cells.is_empty() {
            sheets.push(cells.join(" "));
        }
    }
    Ok(sheets.join("\n\n"))
}

fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Shared-string and inline-string cell values of one worksheet.
fn sheet_strings(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut cells = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut shared_cell = false;
    let mut in_value = false;
    while cells.len() < MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                let raw = t.unescape().unwrap_or_default();
                let raw = raw.trim();
                if shared_cell {
                    if let Some(s) = raw.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                        cells.push(s.clone());
                    }
                } else if !raw.is_empty() && raw.parse::<f64>().is_err() {
                    cells.push(raw.to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => shared_cell = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_title_replaces_dashes_and_underscores() {
        assert_eq!(title_from_filename("sow-template_v2.docx"), "sow template v2");
        assert_eq!(title_from_filename("/tmp/Exec-Deck.pptx"), "Exec Deck");
    }

    #[test]
    fn test_artifact_kinds() {
        assert_eq!(artifact_kind("deck.PPTX"), "deck");
        assert_eq!(artifact_kind("notes.md"), "doc");
        assert_eq!(artifact_kind("pricing.xlsx"), "sheet");
        assert_eq!(artifact_kind("demo.mp4"), "video");
        assert_eq!(artifact_kind("main.tf"), "code");
        assert_eq!(artifact_kind("archive.tar"), "other");
    }

    #[test]
    fn test_markdown_summary_skips_heading() {
        let draft = extract_metadata(
            "alpha-notes.md",
            b"# Alpha\n\nMigrated 420 hosts\nwith zero P1s.\n\nSecond paragraph.",
            280,
        );
        assert_eq!(draft.title.as_deref(), Some("alpha notes"));
        assert_eq!(
            draft.summary.as_deref(),
            Some("Migrated 420 hosts with zero P1s.")
        );
        assert_eq!(draft.asset_type, Some(AssetType::Template));
        assert_eq!(draft.category, Some(AssetCategory::Technical));
    }

    #[test]
    fn test_summary_is_truncated() {
        let body = "word ".repeat(100);
        let draft = extract_metadata("long.txt", body.as_bytes(), 20);
        let summary = draft.summary.unwrap();
        assert_eq!(summary.chars().count(), 20);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_unreadable_file_falls_back_to_name() {
        let draft = extract_metadata("Exec-Deck.pptx", b"not a zip", 280);
        assert_eq!(
            draft.summary.as_deref(),
            Some("Automatically extracted content from Exec-Deck.pptx")
        );
        let artifacts = draft.artifacts.unwrap();
        assert_eq!(artifacts[0].kind, "deck");
        assert_eq!(artifacts[0].name, "Exec-Deck.pptx");
    }

    #[test]
    fn test_source_files_become_code_refs() {
        let draft = extract_metadata("eks_module.tf", b"module \"eks\" {}\n", 280);
        assert_eq!(draft.asset_type, Some(AssetType::CodeRef));
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = "<?xml version=\"1.0\"?><w:document xmlns:w=\"w\"><w:body>\
            <w:p><w:r><w:t>First para</w:t></w:r><w:r><w:t xml:space=\"preserve\"> continues</w:t></w:r></w:p>\
            <w:p><w:r><w:t>Second para</w:t></w:r></w:p></w:body></w:document>";
        let bytes = zip_with(&[("word/document.xml", xml)]);
        let text = extract_text(&bytes, MIME_DOCX).unwrap();
        assert_eq!(text, "First para continues\n\nSecond para");
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |s: &str| {
            format!(
                "<p:sld xmlns:p=\"p\" xmlns:a=\"a\"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>",
                s
            )
        };
        let (s2, s10) = (slide("two"), slide("ten"));
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
        ]);
        assert_eq!(extract_text(&bytes, MIME_PPTX).unwrap(), "two\n\nten");
    }

    #[test]
    fn test_xlsx_shared_strings() {
        let shared = "<sst><si><t>Region</t></si><si><t>EMEA</t></si></sst>";
        let sheet = "<worksheet><sheetData><row>\
            <c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>1</v></c><c r=\"C1\"><v>42</v></c>\
            </row></sheetData></worksheet>";
        let bytes = zip_with(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "Region EMEA");
    }

    /// A one-page PDF with correct cross-references whose font lacks `/Subtype`.
    fn pdf_with_broken_font() -> Vec<u8> {
        let content = "BT /F1 12 Tf (Hi) Tj ET";
        let stream = format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            stream,
            "<< /Type /Font /BaseFont /Helvetica >>".to_string(),
        ];
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_malformed_pdf_degrades_to_name() {
        let bytes = pdf_with_broken_font();
        assert!(matches!(
            extract_text(&bytes, MIME_PDF),
            Err(ExtractError::Pdf(_))
        ));
        let draft = extract_metadata("Broken-Deck.pdf", &bytes, 280);
        assert_eq!(
            draft.summary.as_deref(),
            Some("Automatically extracted content from Broken-Deck.pdf")
        );
    }

    #[test]
    fn test_pdf_panics_become_errors() {
        let err = pdf_guarded(|| panic!("deref")).unwrap_err();
        assert!(err.to_string().contains("panicked: deref"));

        let err = pdf_guarded(|| -> Result<String, pdf_extract::OutputError> {
            panic!("{} glyphs", 3)
        })
        .unwrap_err();
        assert!(err.to_string().contains("3 glyphs"));

        assert_eq!(pdf_guarded(|| Ok("text".to_string())).unwrap(), "text");
    }

    #[test]
    fn test_errors_by_kind() {
        assert!(matches!(
            extract_text(b"%PDF-broken", MIME_PDF),
            Err(ExtractError::Pdf(_))
        ));
        assert!(matches!(
            extract_text(b"nope", MIME_DOCX),
            Err(ExtractError::Ooxml(_))
        ));
        assert!(matches!(
            extract_text(&[0xff, 0xfe], MIME_TEXT),
            Err(ExtractError::NotUtf8)
        ));
        assert!(matches!(
            extract_text(b"", "application/octet-stream"),
            Err(ExtractError::Unsupported(_))
        ));
    }
}
