use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Image parsing errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the data boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// These never leave [`crate::metadata::module::CilModule::read`] on their own. The reader
/// folds them into [`Error::BadImage`] together with the path of the offending file, which is
/// the only variant the resolver recovers from.
///
/// ## Rewrite errors
/// - [`Error::Resolution`] - A referenced assembly could not be found in any search directory
/// - [`Error::BadImage`] - A file exists but is not a valid .NET module
/// - [`Error::Structural`] - Metadata holds a value outside the closed accessibility domain
/// - [`Error::Layout`] - Replaced method bodies could not be placed in the output image
/// - [`Error::FileError`] - Filesystem I/O errors, surfaced verbatim
///
/// # Examples
///
/// ```rust,no_run
/// use publicizer::{metadata::module::CilModule, resolver::ResolutionSession, Error};
/// use std::path::Path;
///
/// let session = ResolutionSession::new();
/// match CilModule::read(Path::new("Foo.dll"), &session, Default::default()) {
///     Ok(module) => println!("{} types", module.types().len()),
///     Err(Error::Resolution { name }) => eprintln!("missing dependency {name}"),
///     Err(Error::BadImage { path, message }) => {
///         eprintln!("{} is not a .NET module: {message}", path.display())
///     }
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors such as a missing source file, permission issues or a
    /// target directory that cannot be created.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A file exists but is not a valid .NET module.
    ///
    /// Produced at the read boundary for every parsing failure, so callers can tell a broken
    /// image apart from I/O and resolution failures.
    #[error("Bad image '{}': {message}", path.display())]
    BadImage {
        /// The file that failed to parse
        path: PathBuf,
        /// Description of the underlying parse failure
        message: String,
    },

    /// An assembly reference could not be resolved in any of the search directories.
    #[error("Failed to resolve assembly: '{name}'")]
    Resolution {
        /// The logical name of the unresolved reference
        name: String,
    },

    /// Metadata holds a value outside the closed accessibility domain.
    #[error("Structural error - {0}")]
    Structural(String),

    /// Replaced method bodies could not be placed into the output image.
    #[error("Layout error - {0}")]
    Layout(String),
}

impl Error {
    /// Returns `true` for the errors which describe a broken or unsupported image, as opposed
    /// to I/O, resolution or structural failures.
    #[must_use]
    pub fn is_bad_image(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. }
                | Error::OutOfBounds { .. }
                | Error::NotSupported
                | Error::Empty
                | Error::GoblinErr(_)
                | Error::BadImage { .. }
        )
    }

    /// Folds image parsing errors into [`Error::BadImage`] for `path`; every other error is
    /// returned unchanged.
    #[must_use]
    pub fn into_bad_image(self, path: &std::path::Path) -> Error {
        match self {
            Error::BadImage { .. } => self,
            other if other.is_bad_image() => Error::BadImage {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
            other => other,
        }
    }
}
