use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Model reasoning that must be sent back unchanged, signature included, on the next turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingContent {
    pub thinking: String,
    pub signature: String,
}

/// Reasoning the vendor returned encrypted. Only `data` is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedThinkingContent {
    pub data: String,
}

/// An image supplied by the caller.
///
/// `data` may be a `data:` URI, a remote `http(s)` URL, or bare base64 in which case
/// `mime_type` names the encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub data: String,
    pub mime_type: String,
}

/// Where the bytes of an image live, as far as a vendor is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Inline { mime_type: String, data: String },
    Remote { url: String },
}

impl Image {
    pub fn new<D: Into<String>, M: Into<String>>(data: D, mime_type: M) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build an image from a URL or data URI, taking the MIME type from the data URI when present
    pub fn from_url<S: Into<String>>(url: S) -> Self {
        let data = url.into();
        let mime_type = parse_data_uri(&data)
            .map(|(mime, _)| mime.to_string())
            .unwrap_or_else(|| mime_from_extension(&data));
        Self { data, mime_type }
    }

    /// Resolve the image to an inline payload or a remote reference by its prefix
    pub fn source(&self) -> ImageSource {
        if self.data.starts_with("http://") || self.data.starts_with("https://") {
            return ImageSource::Remote {
                url: self.data.clone(),
            };
        }

        match parse_data_uri(&self.data) {
            Some((mime_type, data)) => ImageSource::Inline {
                mime_type: if mime_type.is_empty() {
                    self.mime_type.clone()
                } else {
                    mime_type.to_string()
                },
                data: data.to_string(),
            },
            None => ImageSource::Inline {
                mime_type: self.mime_type.clone(),
                data: self.data.clone(),
            },
        }
    }

    /// The image as a URL: remote images verbatim, inline images as a data URI
    pub fn as_url(&self) -> String {
        match self.source() {
            ImageSource::Remote { url } => url,
            ImageSource::Inline { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, data)
            }
        }
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload
fn parse_data_uri(data: &str) -> Option<(&str, &str)> {
    let rest = data.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.split(';').next().unwrap_or_default();
    Some((mime_type, payload))
}

fn mime_from_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

/// A file previously uploaded to a provider.
///
/// `id` is whatever the provider assigned: a file id for openai, anthropic and xai, a
/// file URI for google. Files are owned by the caller and never reused across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl File {
    pub fn new<I: Into<String>, M: Into<String>>(id: I, mime_type: M) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
            name: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}
