//! Declarative registry of the operations offered by PDF Nova
//!
//! Each [`ToolDescriptor`] names an operation, the endpoint that runs it and
//! the form it needs. The server serves the registry as JSON and the front
//! end renders its forms from it, so field names here are the names the
//! handlers read.

use crate::upload::extension_of;
use serde::Serialize;

/// Optional external program a tool depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Ocr,
    Video,
    Office,
    Raster,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Url,
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    Select {
        options: &'static [SelectOption],
    },
    Checkbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    /// Initial value in string form; checkboxes use `"true"`/`"false"`
    pub default: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileInput {
    /// Multipart field name
    pub name: &'static str,
    /// Lowercase extensions with their dot
    pub accept: &'static [&'static str],
    pub multiple: bool,
    pub min_files: usize,
}

impl FileInput {
    pub fn accepts(&self, file_name: &str) -> bool {
        let ext = extension_of(file_name);
        self.accept.iter().any(|a| *a == ext)
    }

    /// Value for an HTML `accept` attribute
    pub fn accept_attr(&self) -> String {
        self.accept.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub endpoint: &'static str,
    pub file_input: Option<FileInput>,
    pub fields: &'static [FormField],
    pub requires: Option<Capability>,
}

impl ToolDescriptor {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub const PDF_EXTENSIONS: &[&str] = &[".pdf"];

pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".webp", ".bmp", ".tif", ".tiff", ".gif",
];

pub const OFFICE_EXTENSIONS: &[&str] = &[".docx", ".xlsx", ".pptx"];

const PDF_AND_IMAGES: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".webp", ".bmp", ".tif", ".tiff", ".gif",
];

const CONVERTIBLE: &[&str] = &[
    ".pdf", ".docx", ".xlsx", ".pptx", ".png", ".jpg", ".jpeg", ".webp", ".bmp", ".tif", ".tiff",
];

const fn single(accept: &'static [&'static str]) -> Option<FileInput> {
    Some(FileInput {
        name: "file",
        accept,
        multiple: false,
        min_files: 1,
    })
}

const fn many(accept: &'static [&'static str], min_files: usize) -> Option<FileInput> {
    Some(FileInput {
        name: "files",
        accept,
        multiple: true,
        min_files,
    })
}

const fn number(min: Option<f64>, max: Option<f64>, step: Option<f64>) -> FieldKind {
    FieldKind::Number { min, max, step }
}

const ANGLES: &[SelectOption] = &[
    SelectOption { value: "90", label: "90° clockwise" },
    SelectOption { value: "180", label: "180°" },
    SelectOption { value: "270", label: "90° counter-clockwise" },
];

const LEVELS: &[SelectOption] = &[
    SelectOption { value: "light", label: "Light" },
    SelectOption { value: "balanced", label: "Balanced" },
    SelectOption { value: "aggressive", label: "Aggressive" },
];

const SOURCES: &[SelectOption] = &[
    SelectOption { value: "tiktok", label: "TikTok" },
    SelectOption { value: "instagram", label: "Instagram" },
    SelectOption { value: "facebook", label: "Facebook" },
    SelectOption { value: "youtube", label: "YouTube" },
    SelectOption { value: "x", label: "X / Twitter" },
    SelectOption { value: "other", label: "Other" },
];

const MODES: &[SelectOption] = &[
    SelectOption { value: "pdf_to_docx", label: "PDF → Word (DOCX)" },
    SelectOption { value: "pdf_to_excel", label: "PDF → Excel (XLSX)" },
    SelectOption { value: "pdf_to_images", label: "PDF → PNG images (ZIP)" },
    SelectOption { value: "office_to_pdf", label: "Word/Excel/PowerPoint → PDF" },
    SelectOption { value: "image_to_pdf", label: "Image → PDF" },
];

static REGISTRY: &[ToolDescriptor] = &[
    ToolDescriptor {
        id: "merge",
        title: "Merge PDFs",
        description: "Combine several PDFs into one, in the order they were added.",
        endpoint: "/api/merge",
        file_input: many(PDF_EXTENSIONS, 2),
        fields: &[],
        requires: None,
    },
    ToolDescriptor {
        id: "split",
        title: "Split PDF",
        description: "Cut a PDF into parts of N pages, delivered as a ZIP.",
        endpoint: "/api/split",
        file_input: single(PDF_EXTENSIONS),
        fields: &[FormField {
            name: "chunk_size",
            label: "Pages per part",
            kind: number(Some(1.0), None, Some(1.0)),
            required: true,
            default: "1",
            placeholder: None,
        }],
        requires: None,
    },
    ToolDescriptor {
        id: "extract",
        title: "Extract pages",
        description: "Keep only the pages you list.",
        endpoint: "/api/extract",
        file_input: single(PDF_EXTENSIONS),
        fields: &[FormField {
            name: "pages",
            label: "Pages",
            kind: FieldKind::Text,
            required: true,
            default: "",
            placeholder: Some("1-3,5"),
        }],
        requires: None,
    },
    ToolDescriptor {
        id: "rotate",
        title: "Rotate pages",
        description: "Rotate every page, or only the pages you list.",
        endpoint: "/api/rotate",
        file_input: single(PDF_EXTENSIONS),
        fields: &[
            FormField {
                name: "angle",
                label: "Angle",
                kind: FieldKind::Select { options: ANGLES },
                required: true,
                default: "90",
                placeholder: None,
            },
            FormField {
                name: "pages",
                label: "Pages (empty = all)",
                kind: FieldKind::Text,
                required: false,
                default: "",
                placeholder: Some("1,3-4"),
            },
        ],
        requires: None,
    },
    ToolDescriptor {
        id: "watermark",
        title: "Watermark",
        description: "Stamp a diagonal text across every page.",
        endpoint: "/api/watermark",
        file_input: single(PDF_EXTENSIONS),
        fields: &[
            FormField {
                name: "text",
                label: "Text",
                kind: FieldKind::Text,
                required: true,
                default: "",
                placeholder: Some("CONFIDENTIAL"),
            },
            FormField {
                name: "opacity",
                label: "Opacity",
                kind: number(Some(0.01), Some(1.0), Some(0.01)),
                required: true,
                default: "0.15",
                placeholder: None,
            },
        ],
        requires: None,
    },
    ToolDescriptor {
        id: "images-to-pdf",
        title: "Images to PDF",
        description: "One page per image, in the order they were added.",
        endpoint: "/api/images-to-pdf",
        file_input: many(IMAGE_EXTENSIONS, 1),
        fields: &[],
        requires: None,
    },
    ToolDescriptor {
        id: "compress",
        title: "Compress PDF",
        description: "Recompress streams and drop unused objects.",
        endpoint: "/api/compress",
        file_input: single(PDF_EXTENSIONS),
        fields: &[FormField {
            name: "level",
            label: "Level",
            kind: FieldKind::Select { options: LEVELS },
            required: true,
            default: "balanced",
            placeholder: None,
        }],
        requires: None,
    },
    ToolDescriptor {
        id: "remove-blank",
        title: "Remove blank pages",
        description: "Drop pages without text, images or annotations.",
        endpoint: "/api/remove-blank",
        file_input: single(PDF_EXTENSIONS),
        fields: &[FormField {
            name: "content_threshold",
            label: "Content threshold (bytes)",
            kind: number(Some(0.0), None, Some(1.0)),
            required: true,
            default: "80",
            placeholder: None,
        }],
        requires: None,
    },
    ToolDescriptor {
        id: "ocr-text",
        title: "OCR to text",
        description: "Read the text of a scanned PDF or an image.",
        endpoint: "/api/ocr-text",
        file_input: single(PDF_AND_IMAGES),
        fields: &[
            FormField {
                name: "lang",
                label: "Languages",
                kind: FieldKind::Text,
                required: true,
                default: "fra+eng",
                placeholder: Some("fra+eng"),
            },
            FormField {
                name: "min_chars",
                label: "Use the text layer above (chars)",
                kind: number(Some(0.0), None, Some(1.0)),
                required: true,
                default: "40",
                placeholder: None,
            },
        ],
        requires: Some(Capability::Ocr),
    },
    ToolDescriptor {
        id: "video-extract",
        title: "Social video to MP4",
        description: "Download a video you own the rights to as MP4.",
        endpoint: "/api/video-extract",
        file_input: None,
        fields: &[
            FormField {
                name: "video_url",
                label: "Video link",
                kind: FieldKind::Url,
                required: true,
                default: "",
                placeholder: Some("https://..."),
            },
            FormField {
                name: "source",
                label: "Platform",
                kind: FieldKind::Select { options: SOURCES },
                required: false,
                default: "tiktok",
                placeholder: None,
            },
            FormField {
                name: "owns_rights",
                label: "I own the rights to this video",
                kind: FieldKind::Checkbox,
                required: true,
                default: "false",
                placeholder: None,
            },
        ],
        requires: Some(Capability::Video),
    },
    ToolDescriptor {
        id: "convert",
        title: "Convert",
        description: "PDF to Word, Excel or images; Office documents or images to PDF.",
        endpoint: "/api/convert",
        file_input: single(CONVERTIBLE),
        fields: &[FormField {
            name: "mode",
            label: "Conversion",
            kind: FieldKind::Select { options: MODES },
            required: true,
            default: "pdf_to_docx",
            placeholder: None,
        }],
        requires: None,
    },
];

/// All tools in display order
pub fn registry() -> &'static [ToolDescriptor] {
    REGISTRY
}

pub fn find(id: &str) -> Option<&'static ToolDescriptor> {
    REGISTRY.iter().find(|t| t.id == id)
}
