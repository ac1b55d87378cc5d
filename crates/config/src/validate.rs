//! Startup validation of the extractor configuration.

use tracing::{trace, warn};

use crate::{ConfigError, ExtractConfig};

impl ExtractConfig {
    /// Check values that would make every pass misbehave.
    ///
    /// An empty delimiter would make every chain split degenerate, and a
    /// wildcard token containing a path separator would escape the output
    /// layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }

        if self.wildcard_token.is_empty()
            || self.wildcard_token.contains(['/', '\\'])
            || self.wildcard_token.contains('*')
        {
            return Err(ConfigError::InvalidWildcardToken(
                self.wildcard_token.clone(),
            ));
        }

        if self.acme_file.is_empty()
            || self.acme_file.contains(['/', '\\'])
            || self.acme_file == "."
            || self.acme_file == ".."
        {
            return Err(ConfigError::InvalidAcmeFile(self.acme_file.clone()));
        }

        if !self.chain_delimiter.starts_with("-----") {
            warn!(
                delimiter = %self.chain_delimiter,
                "Chain delimiter does not look like a PEM boundary"
            );
        }

        trace!(
            acme_path = %self.acme_path().display(),
            certs_dir = %self.certs_dir.display(),
            allow_list = self.domain_allow_list.len(),
            "Configuration validated"
        );

        Ok(())
    }
}
