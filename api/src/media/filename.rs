use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};

use super::variant::VariantKind;

const MAX_STEM_CHARS: usize = 150;

/// File name offered to the client for a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentName {
    name: String,
    ascii_name: String,
}

impl AttachmentName {
    /// Falls back to `video_id` when nothing of the title survives sanitizing.
    pub fn new(title: &str, video_id: &str, ext: &str) -> Self {
        let ext = sanitize_ext(ext);
        let stem = non_empty_or(sanitize_stem(title), video_id);
        let ascii_stem = non_empty_or(
            sanitize_stem(&stem.chars().filter(char::is_ascii).collect::<String>()),
            video_id,
        );

        Self {
            name: format!("{stem}.{ext}"),
            ascii_name: format!("{ascii_stem}.{ext}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_disposition(&self) -> ContentDisposition {
        let mut parameters = vec![DispositionParam::Filename(self.ascii_name.clone())];
        if self.name != self.ascii_name {
            parameters.push(DispositionParam::FilenameExt(ExtendedValue {
                charset: Charset::Ext("UTF-8".to_owned()),
                language_tag: None,
                value: self.name.as_bytes().to_vec(),
            }));
        }

        ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters,
        }
    }
}

/// Keeps letters, digits, `-` and `_`; whitespace runs collapse into one space.
pub fn sanitize_stem(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some(' '),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_STEM_CHARS)
        .collect::<String>()
        .trim_end()
        .to_owned()
}

fn sanitize_ext(ext: &str) -> String {
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if ext.is_empty() {
        "bin".to_owned()
    } else {
        ext
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_owned()
    } else {
        value
    }
}

pub fn content_type(ext: &str, kind: VariantKind) -> &'static str {
    let audio = kind == VariantKind::AudioOnly;

    match ext.to_ascii_lowercase().as_str() {
        "mp4" if audio => "audio/mp4",
        "mp4" => "video/mp4",
        "m4a" => "audio/mp4",
        "webm" if audio => "audio/webm",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "3gp" => "video/3gpp",
        "flv" => "video/x-flv",
        "mp3" => "audio/mpeg",
        "opus" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
