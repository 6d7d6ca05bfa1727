//! Parsing of the forwarded-port file contents

/// What a single read of the port source contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortReading {
    /// A usable port number (1..=65535)
    Port(u16),
    /// Nothing but whitespace
    Empty,
    /// Something that is not a usable port; carries the trimmed text
    Invalid(String),
}

/// Interpret the raw contents of a port source
///
/// Zero, negative numbers, values above 65535 and non-numeric text are all
/// reported as [`PortReading::Invalid`].
pub fn parse_port(raw: &str) -> PortReading {
    let text = raw.trim();
    if text.is_empty() {
        return PortReading::Empty;
    }

    match text.parse::<u16>() {
        Ok(0) | Err(_) => PortReading::Invalid(text.to_string()),
        Ok(port) => PortReading::Port(port),
    }
}
