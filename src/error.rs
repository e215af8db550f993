use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Failure to compute the digest of a watched file.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("Failed to hash {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Hashing task for {} did not complete", path.display())]
    Task { path: PathBuf },
}

/// Failure to build a TLS context from the keystore.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to read keystore {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse keystore {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No certificates found in keystore {}", path.display())]
    NoCertificates { path: PathBuf },

    #[error("No private key found in keystore {}", path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("Keystore {} holds an encrypted key but no password was given", path.display())]
    PasswordRequired { path: PathBuf },

    #[error("Wrong password for the private key in keystore {}", path.display())]
    WrongPassword { path: PathBuf },

    #[error("Malformed encrypted private key in keystore {}: {source}", path.display())]
    EncryptedKey {
        path: PathBuf,
        #[source]
        source: pkcs8::Error,
    },

    #[error("Failed to initialize TLS context: {0}")]
    Context(#[from] rustls::Error),
}

/// Failure to resolve or bind a listening address.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("No addresses found for {0}")]
    NoAddress(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Error returned by route handlers. Any error type converts into it with `?`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Server construction and lifecycle error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to watch keystore: {0}")]
    Hashing(#[from] HashError),

    #[error("Failed to load TLS configuration: {0}")]
    Tls(#[from] TlsError),

    #[error("Failed to bind server: {0}")]
    Bind(#[from] BindError),

    #[error("No keystore configured")]
    MissingKeystore,

    #[error("Invalid server setting: {0}")]
    InvalidSetting(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_wraps_tls_error() {
        let err: ServerError = TlsError::NoPrivateKey {
            path: PathBuf::from("/tmp/keystore.pem"),
        }
        .into();
        assert!(matches!(err, ServerError::Tls(TlsError::NoPrivateKey { .. })));
        assert!(err.to_string().contains("/tmp/keystore.pem"));
    }

    #[test]
    fn test_wrong_password_names_keystore() {
        let err = TlsError::WrongPassword {
            path: PathBuf::from("/etc/hotcert/keystore.pem"),
        };
        assert_eq!(
            err.to_string(),
            "Wrong password for the private key in keystore /etc/hotcert/keystore.pem"
        );
    }

    #[test]
    fn test_hash_error_display_includes_path() {
        let err = HashError::Io {
            path: PathBuf::from("/missing/file"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().starts_with("Failed to hash /missing/file"));
    }

    #[test]
    fn test_handler_error_from_any_error() {
        fn fails() -> Result<(), HandlerError> {
            "not a number".parse::<u32>()?;
            Ok(())
        }
        assert!(fails().is_err());
    }
}
