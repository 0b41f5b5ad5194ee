/// An immutable, binary-safe byte view with a couple of advisory hints.
///
/// `len` is deliberately not a stored field: it used to be a separately
/// tracked integer in the original C `gw_msg_t` and could desync from the
/// buffer it described. Here it's just `data.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    data: Vec<u8>,
    pub is_text: bool,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Payload {
            data: data.into(),
            is_text: false,
            content_type: None,
        }
    }

    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Payload {
            data: data.into(),
            is_text: true,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
