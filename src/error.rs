pub type InfobarResult<T> = Result<T, InfobarError>;

#[derive(thiserror::Error, Debug)]
pub enum InfobarError {
    #[error("config error: {0}")]
    Config(String),

    #[error("payload error: {0}")]
    Payload(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InfobarError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Display/window/GPU setup failures are fatal and get their own exit status.
    pub fn is_display(&self) -> bool {
        matches!(self, Self::Display(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            InfobarError::config("x")
                .to_string()
                .contains("config error:")
        );
        assert!(
            InfobarError::payload("x")
                .to_string()
                .contains("payload error:")
        );
        assert!(
            InfobarError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            InfobarError::transport("x")
                .to_string()
                .contains("transport error:")
        );
        assert!(
            InfobarError::display("x")
                .to_string()
                .contains("display error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = InfobarError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn only_display_errors_are_display() {
        assert!(InfobarError::display("no monitor").is_display());
        assert!(!InfobarError::render("no font").is_display());
        assert!(!InfobarError::from(std::io::Error::other("x")).is_display());
    }
}
