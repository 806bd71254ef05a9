//! Mapping of filesystem failures to user-facing messages.
//!
//! Every per-item failure in the engines ends here. The functions are total:
//! any error value yields a message, and nothing in this module panics.

use std::error::Error;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{error, info, warn};

/// Stable failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorClass {
    PermissionDenied,
    NotFound,
    AlreadyExists,
    OutOfSpace,
    NameTooLong,
    DirectoryNotEmpty,
    IsADirectory,
    NotADirectory,
    /// Any other operating system error.
    GenericOs,
    /// Not an I/O failure at all.
    Unexpected,
}

/// Log level a classified failure is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classified {
    pub class: ErrorClass,
    /// Human-readable message, qualified with the path when one was given.
    pub message: String,
    pub severity: Severity,
}

/// Raw OS codes for "file name too long". Everything else is covered by
/// `io::ErrorKind`.
#[cfg(target_os = "linux")]
const NAME_TOO_LONG_CODES: &[i32] = &[36];
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const NAME_TOO_LONG_CODES: &[i32] = &[63];
#[cfg(windows)]
const NAME_TOO_LONG_CODES: &[i32] = &[206];
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
const NAME_TOO_LONG_CODES: &[i32] = &[];

fn path_suffix(path: Option<&Path>) -> String {
    match path {
        Some(path) if !path.as_os_str().is_empty() => format!(" ({})", path.display()),
        _ => String::new(),
    }
}

/// Classify an I/O error.
pub fn classify_io(err: &io::Error, path: Option<&Path>) -> Classified {
    let suffix = path_suffix(path);
    let name_too_long = err
        .raw_os_error()
        .is_some_and(|code| NAME_TOO_LONG_CODES.contains(&code));

    let (class, label) = match err.kind() {
        io::ErrorKind::PermissionDenied => (ErrorClass::PermissionDenied, "Permission denied"),
        io::ErrorKind::NotFound => (ErrorClass::NotFound, "File or folder not found"),
        io::ErrorKind::AlreadyExists => (ErrorClass::AlreadyExists, "File already exists"),
        io::ErrorKind::StorageFull => (ErrorClass::OutOfSpace, "Not enough disk space"),
        _ if name_too_long => (ErrorClass::NameTooLong, "File name too long"),
        io::ErrorKind::DirectoryNotEmpty => (ErrorClass::DirectoryNotEmpty, "Directory not empty"),
        io::ErrorKind::IsADirectory => (ErrorClass::IsADirectory, "Target is a directory"),
        io::ErrorKind::NotADirectory => {
            (ErrorClass::NotADirectory, "Path component is not a directory")
        }
        _ => {
            return Classified {
                class: ErrorClass::GenericOs,
                message: format!("System error: {err}{suffix}"),
                severity: Severity::Error,
            };
        }
    };

    Classified {
        class,
        message: format!("{label}{suffix}"),
        severity: Severity::Error,
    }
}

/// Classify any error.
///
/// The error and its `source()` chain are searched for an `io::Error`; the
/// first one found decides the class. Anything else is reported as
/// unexpected, naming the error type.
pub fn classify<E>(err: &E, path: Option<&Path>) -> Classified
where
    E: Error + 'static,
{
    let mut current: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(candidate) = current {
        if let Some(io_err) = candidate.downcast_ref::<io::Error>() {
            return classify_io(io_err, path);
        }
        current = candidate.source();
    }

    let type_name = std::any::type_name::<E>()
        .rsplit("::")
        .next()
        .unwrap_or("Error");

    Classified {
        class: ErrorClass::Unexpected,
        message: format!("Unexpected error: {type_name}: {err}{}", path_suffix(path)),
        severity: Severity::Error,
    }
}

/// Classify an error, log it at its severity and return the message.
pub fn log_error<E>(err: &E, path: Option<&Path>) -> String
where
    E: Error + 'static,
{
    let Classified {
        message, severity, ..
    } = classify(err, path);

    match severity {
        Severity::Error => error!("{message}"),
        Severity::Warning => warn!("{message}"),
        Severity::Info => info!("{message}"),
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapped")
        }
    }

    impl Error for Wrapper {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[derive(Debug)]
    struct Opaque;

    impl std::fmt::Display for Opaque {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "something odd")
        }
    }

    impl Error for Opaque {}

    #[test]
    fn test_permission_denied_with_path() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let classified = classify_io(&err, Some(Path::new("/a/b")));
        assert_eq!(classified.class, ErrorClass::PermissionDenied);
        assert_eq!(classified.message, "Permission denied (/a/b)");
        assert_eq!(classified.severity, Severity::Error);
    }

    #[test]
    fn test_kinds_map_to_taxonomy() {
        let cases = [
            (io::ErrorKind::NotFound, ErrorClass::NotFound),
            (io::ErrorKind::AlreadyExists, ErrorClass::AlreadyExists),
            (io::ErrorKind::StorageFull, ErrorClass::OutOfSpace),
            (io::ErrorKind::DirectoryNotEmpty, ErrorClass::DirectoryNotEmpty),
            (io::ErrorKind::IsADirectory, ErrorClass::IsADirectory),
            (io::ErrorKind::NotADirectory, ErrorClass::NotADirectory),
            (io::ErrorKind::Other, ErrorClass::GenericOs),
        ];
        for (kind, class) in cases {
            let err = io::Error::new(kind, "x");
            assert_eq!(classify_io(&err, None).class, class, "{kind:?}");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_raw_os_codes() {
        let full = io::Error::from_raw_os_error(28);
        assert_eq!(classify_io(&full, None).message, "Not enough disk space");

        let long = io::Error::from_raw_os_error(36);
        assert_eq!(
            classify_io(&long, Some(Path::new("/x"))).message,
            "File name too long (/x)"
        );

        let not_empty = io::Error::from_raw_os_error(39);
        assert_eq!(classify_io(&not_empty, None).class, ErrorClass::DirectoryNotEmpty);
    }

    #[test]
    fn test_generic_os_error_keeps_details() {
        let err = io::Error::other("disk on fire");
        let classified = classify_io(&err, Some(Path::new("/d")));
        assert_eq!(classified.message, "System error: disk on fire (/d)");
    }

    #[test]
    fn test_source_chain_is_searched() {
        let err = Wrapper(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let classified = classify(&err, Some(Path::new("/gone")));
        assert_eq!(classified.class, ErrorClass::NotFound);
        assert_eq!(classified.message, "File or folder not found (/gone)");
    }

    #[test]
    fn test_unexpected_names_type() {
        let classified = classify(&Opaque, Some(Path::new("/p")));
        assert_eq!(classified.class, ErrorClass::Unexpected);
        assert_eq!(classified.message, "Unexpected error: Opaque: something odd (/p)");
    }

    #[test]
    fn test_empty_path_is_not_appended() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            classify_io(&err, Some(Path::new(""))).message,
            "File or folder not found"
        );
        assert_eq!(log_error(&err, None), "File or folder not found");
    }
}
