/// One normalized unit of a streamed reply.
///
/// The transport turns every event it receives into a fragment.  Only `Text` fragments
/// contribute to the assistant's reply; the rest are skipped in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// A non-empty piece of reply text.
    Text(String),

    /// A well-formed event that carried no text (role announcement, finish marker, usage).
    Empty,

    /// An event that parsed but did not have the shape of a completion chunk.
    Malformed(String),
}

impl StreamFragment {
    /// The text carried by this fragment, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamFragment::Text(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}
