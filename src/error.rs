pub type TidemarkResult<T> = Result<T, TidemarkError>;

#[derive(thiserror::Error, Debug)]
pub enum TidemarkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("packaging error: {0}")]
    Packaging(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TidemarkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn packaging(msg: impl Into<String>) -> Self {
        Self::Packaging(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            TidemarkError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(TidemarkError::asset("x").to_string().contains("asset error:"));
        assert!(
            TidemarkError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            TidemarkError::packaging("x")
                .to_string()
                .contains("packaging error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = TidemarkError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
