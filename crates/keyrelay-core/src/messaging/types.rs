/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_documents: bool,
    pub max_message_len: usize,
}

/// In-memory file sent alongside a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}
