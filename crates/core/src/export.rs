//! Markdown rendering and on-disk export of a generated blog post.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::article::{split_title, GeneratedArtifact};

const FALLBACK_STEM: &str = "blog";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to prepare output directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write `{path}`: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Image bytes fetched for the post, plus the file extension to store them
/// under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Paths written by [`BlogDocument::write_to`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFiles {
    pub document: PathBuf,
    pub image: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlogDocument {
    pub heading: String,
    pub title: String,
    pub image_url: Option<String>,
    pub body: String,
}

impl BlogDocument {
    pub fn from_artifact(artifact: &GeneratedArtifact) -> Self {
        let (title, body) = split_title(&artifact.text);
        Self {
            heading: artifact.topic.clone(),
            title: title.trim().to_string(),
            image_url: artifact.image_url.clone(),
            body: body.to_string(),
        }
    }

    pub fn file_stem(&self) -> String {
        file_stem(&self.heading)
    }

    /// Renders the document. `image_ref` replaces the remote URL, used when
    /// the image was saved next to the document.
    pub fn to_markdown(&self, image_ref: Option<&str>) -> String {
        let mut out = format!("# {}\n\n", self.heading.trim());
        if !self.title.is_empty() {
            out.push_str(&format!("**{}**\n\n", self.title));
        }
        if let Some(image) = image_ref.or(self.image_url.as_deref()) {
            out.push_str(&format!("![{}]({})\n\n", self.heading.trim(), image));
        }
        let body = self.body.trim();
        if !body.is_empty() {
            out.push_str(body);
            out.push('\n');
        }
        out
    }

    /// Writes `<stem>.md` into `dir`, plus `<stem>.<ext>` when image bytes
    /// are supplied. Existing files are overwritten.
    pub fn write_to(
        &self,
        dir: &Path,
        image: Option<&ImageAttachment>,
    ) -> Result<ExportedFiles, ExportError> {
        fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let stem = self.file_stem();
        let image_path = match image {
            Some(attachment) => {
                let path = dir.join(format!(
                    "{stem}.{}",
                    attachment.extension.trim_start_matches('.')
                ));
                fs::write(&path, &attachment.bytes).map_err(|source| ExportError::WriteFile {
                    path: path.clone(),
                    source,
                })?;
                Some(path)
            }
            None => None,
        };

        let image_ref = image_path
            .as_ref()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str());
        let document = dir.join(format!("{stem}.md"));
        fs::write(&document, self.to_markdown(image_ref)).map_err(|source| {
            ExportError::WriteFile {
                path: document.clone(),
                source,
            }
        })?;

        Ok(ExportedFiles {
            document,
            image: image_path,
        })
    }
}

/// File-system-safe stem derived from a topic. Path separators, reserved
/// punctuation and control characters become `_`.
pub fn file_stem(topic: &str) -> String {
    let stem: String = topic
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let stem = stem.trim_matches('.').trim();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// Extension for a downloaded image, taken from its URL path.
pub fn image_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> BlogDocument {
        let artifact = GeneratedArtifact::new("AI/ML in 2025", "The Road Ahead\nFirst para.\n\nSecond para.")
            .with_image_url("https://replicate.delivery/out-0.png");
        BlogDocument::from_artifact(&artifact)
    }

    #[test]
    fn stems_replace_path_hostile_characters() {
        assert_eq!(file_stem("AI/ML in 2025"), "AI_ML in 2025");
        assert_eq!(file_stem("what? why: how*"), "what_ why_ how_");
        assert_eq!(file_stem("  ..  "), "blog");
    }

    #[test]
    fn markdown_has_heading_title_image_and_body() {
        let markdown = sample().to_markdown(None);
        assert_eq!(
            markdown,
            "# AI/ML in 2025\n\n**The Road Ahead**\n\n![AI/ML in 2025](https://replicate.delivery/out-0.png)\n\nFirst para.\n\nSecond para.\n"
        );
    }

    #[test]
    fn write_to_saves_document_and_image() {
        let temp = tempdir().unwrap();
        let attachment = ImageAttachment {
            bytes: vec![0x89, b'P', b'N', b'G'],
            extension: "png".into(),
        };

        let files = sample().write_to(temp.path(), Some(&attachment)).unwrap();
        assert_eq!(files.document, temp.path().join("AI_ML in 2025.md"));
        assert_eq!(files.image, Some(temp.path().join("AI_ML in 2025.png")));

        let written = fs::read_to_string(&files.document).unwrap();
        assert!(written.contains("![AI/ML in 2025](AI_ML in 2025.png)"));
        assert_eq!(fs::read(files.image.unwrap()).unwrap(), attachment.bytes);
    }

    #[test]
    fn image_extension_falls_back_to_png() {
        assert_eq!(image_extension("https://x.test/out-0.webp?token=1"), "webp");
        assert_eq!(image_extension("https://x.test/download"), "png");
    }
}
