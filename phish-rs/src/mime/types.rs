use serde::{Deserialize, Serialize};

/// A single `name: value` header as the provider returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a message part. `data` is base64url text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

/// Provider JSON payload node, as returned with `format=full`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MessagePartBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    fn body_data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

/// Decoded view of a message payload tree.
///
/// A node with inline body data is a leaf. A node with both inline data and
/// children becomes a container whose first child is that data as a leaf, so
/// the data is still tried first.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Leaf {
        headers: Vec<Header>,
        data: Option<String>,
    },
    Container {
        headers: Vec<Header>,
        parts: Vec<Payload>,
    },
}

impl Payload {
    pub fn headers(&self) -> &[Header] {
        match self {
            Payload::Leaf { headers, .. } | Payload::Container { headers, .. } => headers,
        }
    }
}

impl From<&MessagePart> for Payload {
    fn from(part: &MessagePart) -> Self {
        let data = part.body_data().map(str::to_string);

        if part.parts.is_empty() {
            return Payload::Leaf {
                headers: part.headers.clone(),
                data,
            };
        }

        let mut parts = Vec::with_capacity(part.parts.len() + 1);
        if let Some(data) = data {
            parts.push(Payload::Leaf {
                headers: Vec::new(),
                data: Some(data),
            });
        }
        parts.extend(part.parts.iter().map(Payload::from));

        Payload::Container {
            headers: part.headers.clone(),
            parts,
        }
    }
}

impl From<MessagePart> for Payload {
    fn from(part: MessagePart) -> Self {
        Payload::from(&part)
    }
}
